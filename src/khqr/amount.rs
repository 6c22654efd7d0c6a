//! Transaction amount canonicalisation (tag 54).
//!
//! Amounts are plain decimals with a dot separator, exactly two fractional
//! digits (truncated, never rounded up), no grouping and no zero padding.

use crate::error::{KhqrError, Result};
use crate::khqr::tags::MAX_AMOUNT;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::str::FromStr;

/// A validated, canonical transaction amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(Decimal);

impl Amount {
    /// Canonicalise a decimal value.
    pub fn new(value: Decimal) -> Result<Self> {
        if value < Decimal::ZERO {
            return Err(KhqrError::validation(
                "amount",
                format!("{value} is negative"),
            ));
        }

        let mut canonical = value.round_dp_with_strategy(2, RoundingStrategy::ToZero);
        canonical.rescale(2);
        canonical.set_sign_positive(true);

        let rendered = canonical.to_string();
        if rendered.len() > MAX_AMOUNT {
            return Err(KhqrError::validation(
                "amount",
                format!(
                    "{rendered} is {} characters (max {MAX_AMOUNT})",
                    rendered.len()
                ),
            ));
        }
        Ok(Self(canonical))
    }

    /// Parse a user-supplied amount such as `"12.5"` or `"0.01"`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let well_formed = !trimmed.is_empty()
            && trimmed.chars().any(|c| c.is_ascii_digit())
            && trimmed.chars().all(|c| c.is_ascii_digit() || c == '.')
            && trimmed.matches('.').count() <= 1;
        if !well_formed {
            return Err(KhqrError::validation(
                "amount",
                format!("'{trimmed}' is not a non-negative decimal"),
            ));
        }
        // Cut extra fractional digits as text: `Decimal::from_str` rounds
        // anything beyond its 28-digit scale.
        let truncated = match trimmed.split_once('.') {
            Some((int, frac)) => format!("{int}.{}", &frac[..frac.len().min(2)]),
            None => trimmed.to_string(),
        };
        let value = Decimal::from_str(&truncated).map_err(|e| {
            KhqrError::validation("amount", format!("'{trimmed}' is not representable: {e}"))
        })?;
        Self::new(value)
    }

    /// Convert a float via its shortest decimal rendering, so `0.1` stays
    /// `0.1` instead of picking up binary noise.
    pub fn from_f64(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(KhqrError::validation("amount", format!("{value} is not finite")));
        }
        if value < 0.0 {
            return Err(KhqrError::validation("amount", format!("{value} is negative")));
        }
        Self::parse(&value.to_string())
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Canonical string as it appears in the payload.
    pub fn as_payload_value(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = KhqrError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(raw: &str) -> String {
        Amount::parse(raw).unwrap().as_payload_value()
    }

    #[test]
    fn test_pads_to_two_decimals() {
        assert_eq!(canon("0.1"), "0.10");
        assert_eq!(canon("5"), "5.00");
        assert_eq!(canon("0.01"), "0.01");
        assert_eq!(canon("12500"), "12500.00");
    }

    #[test]
    fn test_truncates_instead_of_rounding() {
        assert_eq!(canon("1.999"), "1.99");
        assert_eq!(canon("0.009"), "0.00");
        assert_eq!(canon("29.995"), "29.99");
        assert_eq!(canon("1.99999999999999999999999999999"), "1.99");
        assert_eq!(canon("0.0099999999999999999999999999999999"), "0.00");
    }

    #[test]
    fn test_strips_redundant_leading_zeros() {
        assert_eq!(canon("007.5"), "7.50");
        assert_eq!(canon("0"), "0.00");
        assert_eq!(canon(" 3.2 "), "3.20");
    }

    #[test]
    fn test_from_f64() {
        assert_eq!(Amount::from_f64(0.1).unwrap().to_string(), "0.10");
        assert_eq!(Amount::from_f64(5.0).unwrap().to_string(), "5.00");
        assert_eq!(Amount::from_f64(1.999).unwrap().to_string(), "1.99");
        assert!(Amount::from_f64(f64::NAN).is_err());
        assert!(Amount::from_f64(-1.0).is_err());
    }

    #[test]
    fn test_rejects_malformed_input() {
        for raw in ["", "abc", "-1", "1,000", "1.2.3", "1e5", ".", "+5"] {
            let err = Amount::parse(raw).unwrap_err();
            assert!(
                matches!(err, KhqrError::Validation { field: "amount", .. }),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_negative_decimal() {
        assert!(Amount::new(Decimal::new(-1, 2)).is_err());
    }

    #[test]
    fn test_length_limit() {
        // 10 integer digits + ".00" = 13 characters
        assert_eq!(canon("9999999999"), "9999999999.00");
        let err = Amount::parse("99999999999").unwrap_err();
        assert!(matches!(err, KhqrError::Validation { field: "amount", .. }));
    }
}
