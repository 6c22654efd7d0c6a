//! Tag-length-value primitives.
//!
//! A field renders as `tag + two-digit character count + value`. Nested
//! templates (merchant account, additional data, timestamp) reuse [`wrap`]:
//! encode the sub-fields, concatenate them, and wrap the result as the value
//! of the outer tag.

use crate::error::{KhqrError, Result};
use crate::khqr::tags::MAX_TLV_VALUE;
use std::fmt;

/// One encoded TLV field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    tag: &'static str,
    value: String,
}

impl Field {
    /// Build a field, rejecting values the two-digit length cannot describe.
    pub fn new(tag: &'static str, value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let len = value.chars().count();
        if len > MAX_TLV_VALUE {
            return Err(KhqrError::validation(
                "tlv",
                format!("tag {tag} value is {len} characters (max {MAX_TLV_VALUE})"),
            ));
        }
        Ok(Self { tag, value })
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Character count of the value (not bytes: merchant names may be Khmer).
    pub fn len(&self) -> usize {
        self.value.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Append the encoded field to `out`.
    pub fn write_to(&self, out: &mut String) {
        out.push_str(self.tag);
        out.push_str(&format!("{:02}", self.len()));
        out.push_str(&self.value);
    }

    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.value.len() + 4);
        self.write_to(&mut out);
        out
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}{}", self.tag, self.len(), self.value)
    }
}

/// Concatenate already-encoded fields.
pub fn concat(fields: &[Field]) -> String {
    let mut out = String::new();
    for field in fields {
        field.write_to(&mut out);
    }
    out
}

/// Encode `inner` fields and wrap them as the value of `tag`.
///
/// Returns `None` when there is nothing to wrap, so empty templates drop out
/// of the payload entirely instead of rendering as `tag + "00"`.
pub fn wrap(tag: &'static str, inner: &[Field]) -> Result<Option<Field>> {
    if inner.is_empty() {
        return Ok(None);
    }
    Field::new(tag, concat(inner)).map(Some)
}
