/// Canonical, format-independent output of decoding one tap.
///
/// A record is only ever constructed by the decoder from exactly one detected
/// format; it never mixes fields that the matching strategy does not define
/// (`device_id` is never set together with `signature`, and so on).
#[derive(Debug, Clone, Default, PartialEq, Eq, uniffi::Record)]
pub struct CredentialRecord {
    /// Tag hardware identifier in colon-hex normalized form (`04:NN:NN:...`).
    pub chip_id: String,
    /// Self-certifying identity handle (`scheme:method:material`), when the
    /// format carries or derives one.
    pub identity_uri: Option<String>,
    /// Raw signature bytes, present only for signature-based formats.
    pub signature: Option<Vec<u8>>,
    /// Raw public key bytes, present only for signature-based formats.
    pub public_key: Option<Vec<u8>>,
    /// Message that was (or will be) signed. When a format does not carry
    /// one, the decoder synthesizes `MELD_Challenge_<chip_id>`.
    pub challenge: Option<String>,
    /// Local device registry key, present only for the device-local format.
    pub device_id: Option<String>,
}

/// Which decode strategy produced a [`CredentialRecord`].
///
/// The variant is immutable evidence of the strategy that matched, and
/// therefore of the verification path the authentication engine must take:
/// the two are matched exhaustively and can never diverge.
///
/// Chip-only taps decode to [`TapFormat::IdentityHandle`] with no
/// `identity_uri`: verification for both is keyed by chip id against the
/// local device registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum TapFormat {
    /// A self-certifying identity string, with no signature material.
    IdentityHandle,
    /// A device id plus chip id pair resolved through the local registry.
    DeviceLocal,
    /// Long-name fields: identity handle, signature, public key, chip id.
    SignatureFull,
    /// Short-name fields carrying full-length unpadded hex material.
    SignatureCompressedSafe,
    /// Short-name fields with undersized hex material, right-padded with
    /// `'0'`. Known-lossy: verification may fail because of the padding.
    SignatureCompressedLegacy,
    /// Shortest field names; values may be base64 and are expanded to hex.
    SignatureUltraCompressed,
    /// No strategy matched.
    None,
}

/// A note emitted by the decoder alongside the credential record.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum DecodeNote {
    /// A strategy matched and produced the record.
    Matched {
        /// Strategy name, snake_case.
        strategy: String,
        /// Normalized chip id carried by the record.
        chip_id: String,
    },
    /// A strategy's field guard matched but its payload was rejected.
    Rejected {
        /// Strategy name, snake_case.
        strategy: String,
        /// Why the payload was rejected.
        reason: String,
    },
    /// A value was right-padded with `'0'` to reach the minimum hex length.
    ///
    /// This is a warning even on apparent success: padding changes the bytes
    /// and will not match a real signature unless the original signer padded
    /// identically, so a later `invalid_signature` may actually be caused
    /// here.
    LegacyPadding {
        /// Query field that was padded (`s`, `p` or `k`).
        field: String,
        /// Hex length before padding.
        padded_from: u32,
        /// Hex length after padding.
        padded_to: u32,
    },
    /// A base64 value was expanded to hex.
    Base64Expanded {
        /// Which field was expanded.
        field: String,
    },
    /// An identity handle was derived from the public key for display and
    /// lookup. The derivation is not a cryptographic commitment.
    DerivedIdentity {
        /// The derived handle.
        identity_uri: String,
    },
    /// No strategy matched the query.
    NoMatch,
}

/// Everything the decoder produced for one tap.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct DecodedTap {
    /// The canonical credential record.
    pub record: CredentialRecord,
    /// The strategy that produced it.
    pub format: TapFormat,
    /// Decoder notes, in emission order.
    pub notes: Vec<DecodeNote>,
}
