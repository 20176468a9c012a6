//! The seven-strategy tap parameter decoder.
//!
//! Strategies are tried in a fixed priority order, each guarded by
//! required-field presence; the first full match wins and later strategies
//! are not attempted. The ordering is load-bearing: some tap URLs satisfy
//! more than one strategy's field set (an identity-handle URL that also
//! carries a chip field, for instance) and must keep resolving the way the
//! historical handler resolved them.

use base64::{engine::general_purpose::STANDARD, Engine};

use super::params::TapParams;
use super::types::{CredentialRecord, DecodeNote, DecodedTap, TapFormat};

/// Long-name identity handle field.
const FIELD_DID: &str = "did";
/// Long-name signature field.
const FIELD_SIGNATURE: &str = "signature";
/// Long-name public key field.
const FIELD_PUBLIC_KEY: &str = "publicKey";
/// Preferred chip id field.
const FIELD_CHIP_ID: &str = "chipId";
/// Legacy chip id field, less specific; `chipId` wins if both are present.
const FIELD_UID: &str = "uid";
/// Device-local registry key field.
const FIELD_DEVICE_ID: &str = "deviceId";
/// Optional explicit challenge field.
const FIELD_CHALLENGE: &str = "challenge";
/// Compressed chip id field.
const FIELD_C: &str = "c";
/// Compressed signature field (shared with ultra-compressed).
const FIELD_S: &str = "s";
/// Compressed public key field.
const FIELD_P: &str = "p";
/// Ultra-compressed chip id field.
const FIELD_U: &str = "u";
/// Ultra-compressed public key field.
const FIELD_K: &str = "k";

/// Minimum unpadded signature length in hex characters.
const MIN_SIGNATURE_HEX: usize = 128;
/// Minimum unpadded public key length in hex characters.
const MIN_PUBLIC_KEY_HEX: usize = 64;

/// Decodes an arbitrary set of tap-URL query parameters into a canonical
/// credential record plus the format that produced it.
///
/// Never fails: a query no strategy matches produces an empty record with
/// [`TapFormat::None`]. `now_ms` feeds the device-local challenge timestamp;
/// pass `None` to use the system clock.
#[uniffi::export]
#[must_use]
pub fn decode_tap(params: &TapParams, now_ms: Option<u64>) -> DecodedTap {
    let now_ms = now_ms.unwrap_or_else(crate::time::unix_millis);
    let mut notes = Vec::new();

    let strategies: [fn(&TapParams, u64, &mut Vec<DecodeNote>) -> Option<(CredentialRecord, TapFormat)>;
        7] = [
        decode_identity_handle,
        decode_chip_only,
        decode_device_local,
        decode_signature_full,
        decode_compressed_safe,
        decode_compressed_legacy,
        decode_ultra_compressed,
    ];

    for strategy in strategies {
        if let Some((record, format)) = strategy(params, now_ms, &mut notes) {
            notes.push(DecodeNote::Matched {
                strategy: format.as_ref().to_string(),
                chip_id: record.chip_id.clone(),
            });
            return DecodedTap {
                record,
                format,
                notes,
            };
        }
    }

    notes.push(DecodeNote::NoMatch);
    DecodedTap {
        record: CredentialRecord::default(),
        format: TapFormat::None,
        notes,
    }
}

/// Strategy 1: a self-certifying identity string with no signature material.
fn decode_identity_handle(
    params: &TapParams,
    _now_ms: u64,
    _notes: &mut Vec<DecodeNote>,
) -> Option<(CredentialRecord, TapFormat)> {
    if !params.has(FIELD_DID) || has_signature_material(params) {
        return None;
    }
    let chip_id = chip_field(params).map(normalize_chip_id).unwrap_or_default();
    let record = CredentialRecord {
        challenge: Some(default_challenge(&chip_id)),
        identity_uri: params.value(FIELD_DID).map(str::to_string),
        chip_id,
        ..CredentialRecord::default()
    };
    Some((record, TapFormat::IdentityHandle))
}

/// Strategy 2: only a chip identifier, with no signature, public key or
/// device fields. Verification goes through the chip-keyed local-identity
/// path, so the record carries the identity-handle format with no handle.
fn decode_chip_only(
    params: &TapParams,
    _now_ms: u64,
    _notes: &mut Vec<DecodeNote>,
) -> Option<(CredentialRecord, TapFormat)> {
    if params.has(FIELD_DID)
        || params.has(FIELD_DEVICE_ID)
        || has_signature_material(params)
    {
        return None;
    }
    let chip_id = normalize_chip_id(chip_field(params)?);
    let record = CredentialRecord {
        challenge: Some(default_challenge(&chip_id)),
        chip_id,
        ..CredentialRecord::default()
    };
    Some((record, TapFormat::IdentityHandle))
}

/// Strategy 3: a device identifier together with a chip identifier.
fn decode_device_local(
    params: &TapParams,
    now_ms: u64,
    _notes: &mut Vec<DecodeNote>,
) -> Option<(CredentialRecord, TapFormat)> {
    let device_id = params.value(FIELD_DEVICE_ID)?;
    let chip_id = normalize_chip_id(chip_field(params)?);
    let record = CredentialRecord {
        challenge: Some(format!("MELD-Local-{device_id}-{now_ms}")),
        device_id: Some(device_id.to_string()),
        chip_id,
        ..CredentialRecord::default()
    };
    Some((record, TapFormat::DeviceLocal))
}

/// Strategy 4: identity handle, signature, public key and chip identifier
/// under their long field names.
fn decode_signature_full(
    params: &TapParams,
    _now_ms: u64,
    notes: &mut Vec<DecodeNote>,
) -> Option<(CredentialRecord, TapFormat)> {
    let did = params.value(FIELD_DID)?;
    let signature_hex = params.value(FIELD_SIGNATURE)?;
    let public_key_hex = params.value(FIELD_PUBLIC_KEY)?;
    let chip_id = normalize_chip_id(chip_field(params)?);

    let Ok(signature) = hex::decode(signature_hex) else {
        notes.push(DecodeNote::Rejected {
            strategy: TapFormat::SignatureFull.as_ref().to_string(),
            reason: "signature is not valid hex".to_string(),
        });
        return None;
    };
    let Ok(public_key) = hex::decode(public_key_hex) else {
        notes.push(DecodeNote::Rejected {
            strategy: TapFormat::SignatureFull.as_ref().to_string(),
            reason: "public key is not valid hex".to_string(),
        });
        return None;
    };

    let challenge = params
        .value(FIELD_CHALLENGE)
        .map_or_else(|| default_challenge(&chip_id), str::to_string);
    let record = CredentialRecord {
        identity_uri: Some(did.to_string()),
        signature: Some(signature),
        public_key: Some(public_key),
        challenge: Some(challenge),
        chip_id,
        ..CredentialRecord::default()
    };
    Some((record, TapFormat::SignatureFull))
}

/// Strategy 5: short field names carrying full-length, unpadded hex.
///
/// Undersized inputs are rejected here, not padded; the legacy strategy
/// below catches them. Rejecting preserves cryptographic integrity for tags
/// written by modern encoders.
fn decode_compressed_safe(
    params: &TapParams,
    _now_ms: u64,
    notes: &mut Vec<DecodeNote>,
) -> Option<(CredentialRecord, TapFormat)> {
    let chip_raw = params.value(FIELD_C)?;
    let signature_hex = params.value(FIELD_S)?;
    let public_key_hex = params.value(FIELD_P)?;

    let reject = |reason: &str, notes: &mut Vec<DecodeNote>| {
        notes.push(DecodeNote::Rejected {
            strategy: TapFormat::SignatureCompressedSafe.as_ref().to_string(),
            reason: reason.to_string(),
        });
    };
    if !is_hex(signature_hex) || !is_hex(public_key_hex) {
        reject("signature or public key is not pure hex", notes);
        return None;
    }
    if signature_hex.len() < MIN_SIGNATURE_HEX {
        reject("signature below minimum safe length", notes);
        return None;
    }
    if public_key_hex.len() < MIN_PUBLIC_KEY_HEX {
        reject("public key below minimum safe length", notes);
        return None;
    }
    if signature_hex.len() % 2 != 0 || public_key_hex.len() % 2 != 0 {
        reject("odd-length hex material", notes);
        return None;
    }

    let chip_id = normalize_chip_id(chip_raw);
    let record = signature_record(
        chip_id,
        hex::decode(signature_hex).ok()?,
        public_key_hex,
        hex::decode(public_key_hex).ok()?,
        notes,
    );
    Some((record, TapFormat::SignatureCompressedSafe))
}

/// Strategy 6: same short field names, but undersized material is
/// right-padded with `'0'` to the minimum length. Known-lossy.
fn decode_compressed_legacy(
    params: &TapParams,
    _now_ms: u64,
    notes: &mut Vec<DecodeNote>,
) -> Option<(CredentialRecord, TapFormat)> {
    let chip_raw = params.value(FIELD_C)?;
    let signature_hex = params.value(FIELD_S)?;
    let public_key_hex = params.value(FIELD_P)?;

    if !is_hex(signature_hex) || !is_hex(public_key_hex) {
        notes.push(DecodeNote::Rejected {
            strategy: TapFormat::SignatureCompressedLegacy.as_ref().to_string(),
            reason: "signature or public key is not pure hex".to_string(),
        });
        return None;
    }

    let signature_hex = pad_hex(FIELD_S, signature_hex, MIN_SIGNATURE_HEX, notes);
    let public_key_hex = pad_hex(FIELD_P, public_key_hex, MIN_PUBLIC_KEY_HEX, notes);

    let chip_id = normalize_chip_id(chip_raw);
    let record = signature_record(
        chip_id,
        hex::decode(&signature_hex).ok()?,
        &public_key_hex,
        hex::decode(&public_key_hex).ok()?,
        notes,
    );
    Some((record, TapFormat::SignatureCompressedLegacy))
}

/// Strategy 7: shortest field names; values may be base64 and are expanded
/// to hex, falling back to legacy-style padding when they are not.
fn decode_ultra_compressed(
    params: &TapParams,
    _now_ms: u64,
    notes: &mut Vec<DecodeNote>,
) -> Option<(CredentialRecord, TapFormat)> {
    let chip_raw = params.value(FIELD_U)?;
    let signature_raw = params.value(FIELD_S)?;
    let public_key_raw = params.value(FIELD_K)?;

    let signature_hex =
        expand_compact_value(FIELD_S, signature_raw, MIN_SIGNATURE_HEX, notes)?;
    let public_key_hex =
        expand_compact_value(FIELD_K, public_key_raw, MIN_PUBLIC_KEY_HEX, notes)?;

    let chip_id = normalize_chip_id(chip_raw);
    let record = signature_record(
        chip_id,
        hex::decode(&signature_hex).ok()?,
        &public_key_hex,
        hex::decode(&public_key_hex).ok()?,
        notes,
    );
    Some((record, TapFormat::SignatureUltraCompressed))
}

/// Expands an ultra-compressed value to hex: base64 when it plausibly is
/// base64, otherwise treated as hex and right-padded to `min_hex`.
fn expand_compact_value(
    field: &str,
    raw: &str,
    min_hex: usize,
    notes: &mut Vec<DecodeNote>,
) -> Option<String> {
    if looks_like_base64(raw) {
        if let Ok(bytes) = STANDARD.decode(raw) {
            notes.push(DecodeNote::Base64Expanded {
                field: field.to_string(),
            });
            return Some(hex::encode(bytes));
        }
    }
    if !is_hex(raw) {
        notes.push(DecodeNote::Rejected {
            strategy: TapFormat::SignatureUltraCompressed.as_ref().to_string(),
            reason: format!("{field} is neither base64 nor hex"),
        });
        return None;
    }
    Some(pad_hex(field, raw, min_hex, notes))
}

/// Builds the common signature-format record, deriving an identity handle
/// from the public key hex since the compressed formats carry none.
fn signature_record(
    chip_id: String,
    signature: Vec<u8>,
    public_key_hex: &str,
    public_key: Vec<u8>,
    notes: &mut Vec<DecodeNote>,
) -> CredentialRecord {
    let identity_uri = derive_identity_handle(public_key_hex);
    notes.push(DecodeNote::DerivedIdentity {
        identity_uri: identity_uri.clone(),
    });
    CredentialRecord {
        challenge: Some(default_challenge(&chip_id)),
        identity_uri: Some(identity_uri),
        signature: Some(signature),
        public_key: Some(public_key),
        chip_id,
        ..CredentialRecord::default()
    }
}

/// Right-pads `value` with `'0'` to `min_hex` characters (and to an even
/// length so it stays decodable), recording the lossy padding.
fn pad_hex(
    field: &str,
    value: &str,
    min_hex: usize,
    notes: &mut Vec<DecodeNote>,
) -> String {
    let mut padded = value.to_string();
    let target = min_hex.max(value.len() + value.len() % 2);
    if padded.len() < target {
        let from = padded.len();
        padded.extend(std::iter::repeat_n('0', target - padded.len()));
        notes.push(DecodeNote::LegacyPadding {
            field: field.to_string(),
            padded_from: u32::try_from(from).unwrap_or(u32::MAX),
            padded_to: u32::try_from(padded.len()).unwrap_or(u32::MAX),
        });
    }
    padded
}

/// The deterministic default challenge for a chip.
pub(crate) fn default_challenge(chip_id: &str) -> String {
    format!("MELD_Challenge_{chip_id}")
}

/// Derives a display/lookup identity handle from a public key hex string:
/// `did:key:z` plus the first 32 characters, zero-padding shorter keys.
/// Not a cryptographic commitment.
fn derive_identity_handle(public_key_hex: &str) -> String {
    let mut material = public_key_hex.to_string();
    if material.len() < 32 {
        material.extend(std::iter::repeat_n('0', 32 - material.len()));
    }
    format!("did:key:z{}", &material[..32])
}

/// Normalizes a raw chip token: tokens already colon-delimited are kept
/// as-is; anything else is uppercased, split into 2-character groups and
/// colon-joined behind the `04` vendor byte.
fn normalize_chip_id(raw: &str) -> String {
    if raw.contains(':') {
        return raw.to_string();
    }
    let upper = raw.to_ascii_uppercase();
    let groups: Vec<String> = upper
        .as_bytes()
        .chunks(2)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect();
    format!("04:{}", groups.join(":"))
}

/// The chip identifier under either legacy name, preferring the specific one.
fn chip_field(params: &TapParams) -> Option<&str> {
    params.value(FIELD_CHIP_ID).or_else(|| params.value(FIELD_UID))
}

fn has_signature_material(params: &TapParams) -> bool {
    params.has(FIELD_SIGNATURE)
        || params.has(FIELD_PUBLIC_KEY)
        || params.has(FIELD_S)
        || params.has(FIELD_P)
        || params.has(FIELD_K)
}

fn is_hex(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Whether a value plausibly is base64 rather than hex: 4-aligned length,
/// base64 alphabet, and at least one character outside the hex alphabet so
/// that hex material is never mangled by a base64 round-trip.
fn looks_like_base64(value: &str) -> bool {
    value.len() >= 4
        && value.len() % 4 == 0
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
        && !value.bytes().all(|b| b.is_ascii_hexdigit())
}
