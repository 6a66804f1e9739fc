use hex::ToHex;
use serde::{Deserialize, Serialize};
use sha2::Digest as _;

use crate::FieldValue;

/// Canonical text of an absent or empty value. Never hashed.
pub const EMPTY_MARKER: &str = "";

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    hasher.finalize().encode_hex::<String>()
}

pub fn is_sha256_hex(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 64 {
        return false;
    }
    bytes.iter().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalValue(String);

impl CanonicalValue {
    pub fn empty() -> Self {
        CanonicalValue(EMPTY_MARKER.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0 == EMPTY_MARKER
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `None` for the empty marker: empty values contribute no ground truth.
    pub fn digest(&self) -> Option<Digest> {
        (!self.is_empty()).then(|| digest(&self.0))
    }
}

/// Lowercase hex SHA-256 of a canonical value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    pub fn parse(s: &str) -> Option<Self> {
        is_sha256_hex(s).then(|| Digest(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Digest {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_sha256_hex(&value) {
            Ok(Digest(value))
        } else {
            Err(format!("`{}` is not a lowercase sha256 hex digest", value))
        }
    }
}

impl From<Digest> for String {
    fn from(value: Digest) -> Self {
        value.0
    }
}

pub fn digest(text: &str) -> Digest {
    Digest(sha256_hex(text.as_bytes()))
}

/// Numbers use the shortest text that round-trips to the same `f64`, independent of
/// locale. Text is kept byte for byte.
pub fn canonicalize(value: &FieldValue) -> CanonicalValue {
    match value {
        FieldValue::Number(v) => CanonicalValue(v.to_string()),
        FieldValue::Integer(v) => CanonicalValue(v.to_string()),
        FieldValue::Text(v) => CanonicalValue(v.clone()),
        FieldValue::ReferenceId(v) => CanonicalValue(v.to_string()),
        FieldValue::None => CanonicalValue::empty(),
    }
}

pub fn digest_value(value: &FieldValue) -> Option<Digest> {
    canonicalize(value).digest()
}
