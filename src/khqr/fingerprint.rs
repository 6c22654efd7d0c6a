//! Payload fingerprint: the MD5 digest Bakong indexes transactions by.

use crate::error::{KhqrError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

const FINGERPRINT_LEN: usize = 32;

/// 32-character lowercase hex MD5 of a payload string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest a payload.
    pub fn of(payload: &str) -> Self {
        Self(format!("{:x}", md5::compute(payload.as_bytes())))
    }

    /// Accept a fingerprint produced elsewhere (settlement API responses,
    /// audit logs). Surrounding whitespace is ignored and hex digits are
    /// normalised to lowercase.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.len() != FINGERPRINT_LEN || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(KhqrError::validation(
                "fingerprint",
                format!("'{trimmed}' is not a {FINGERPRINT_LEN}-character hex digest"),
            ));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = KhqrError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}
