use std::collections::HashMap;

/// Query parameters from a tap URL.
///
/// Keys are matched case-sensitively; repeated keys keep the last value,
/// matching how the legacy tap handler read its query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, uniffi::Object)]
pub struct TapParams {
    entries: HashMap<String, String>,
}

#[uniffi::export]
impl TapParams {
    /// Parses a raw query string (`a=1&b=2`, with or without a leading `?`).
    ///
    /// Percent-escapes and `+` are decoded. Malformed escapes are kept
    /// verbatim rather than rejected: tap URLs come from NFC tag writers of
    /// very uneven quality and decoding must never fail.
    #[uniffi::constructor]
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut entries = HashMap::new();
        for pair in query.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            entries.insert(percent_decode(key), percent_decode(value));
        }
        Self { entries }
    }

    /// Builds params from an already-decoded key/value map.
    #[uniffi::constructor]
    #[must_use]
    pub fn from_pairs(pairs: HashMap<String, String>) -> Self {
        Self { entries: pairs }
    }
}

impl TapParams {
    /// Returns the trimmed value for `key`, treating empty values as absent.
    pub(crate) fn value(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Whether `key` is present with a non-empty value.
    pub(crate) fn has(&self, key: &str) -> bool {
        self.value(key).is_some()
    }
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                if let (Some(hi), Some(lo)) = (
                    bytes.get(i + 1).copied().and_then(hex_val),
                    bytes.get(i + 2).copied().and_then(hex_val),
                ) {
                    out.push(hi << 4 | lo);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

const fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
