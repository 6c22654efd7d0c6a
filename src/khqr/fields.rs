//! Field encoders: one pure function per KHQR field.
//!
//! Each encoder trims and validates its input and returns a ready-to-concat
//! [`Field`]. Nothing here touches shared state.

use crate::error::{KhqrError, Result};
use crate::khqr::amount::Amount;
use crate::khqr::tags;
use crate::khqr::tlv::{self, Field};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Enumerated values
// ---------------------------------------------------------------------------

/// Point of initiation: reusable (static) or single-transaction (dynamic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QrKind {
    Static,
    #[default]
    Dynamic,
}

impl QrKind {
    pub fn code(self) -> &'static str {
        match self {
            QrKind::Static => tags::STATIC_QR,
            QrKind::Dynamic => tags::DYNAMIC_QR,
        }
    }
}

/// Transaction currency, rendered as its ISO 4217 numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    #[default]
    Usd,
    Khr,
}

impl Currency {
    pub fn numeric_code(self) -> &'static str {
        match self {
            Currency::Usd => "840",
            Currency::Khr => "116",
        }
    }

    pub fn alpha_code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Khr => "KHR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alpha_code())
    }
}

impl FromStr for Currency {
    type Err = KhqrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" | "840" => Ok(Currency::Usd),
            "KHR" | "116" => Ok(Currency::Khr),
            other => Err(KhqrError::validation(
                "currency",
                format!("unsupported currency '{other}' (expected USD or KHR)"),
            )),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = KhqrError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.alpha_code().to_string()
    }
}

/// Optional sub-fields of the additional data template (tag 62).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdditionalData {
    pub bill_number: Option<String>,
    pub mobile_number: Option<String>,
    pub store_label: Option<String>,
    pub terminal_label: Option<String>,
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

fn required(field: &'static str, value: &str, max: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(KhqrError::validation(field, "is required"));
    }
    check_length(field, trimmed, max)?;
    Ok(trimmed.to_string())
}

fn optional(field: &'static str, value: Option<&str>, max: usize) -> Result<Option<String>> {
    let trimmed = value.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Ok(None);
    }
    check_length(field, trimmed, max)?;
    Ok(Some(trimmed.to_string()))
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len > max {
        return Err(KhqrError::validation(
            field,
            format!("is {len} characters (max {max})"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------------------

pub fn payload_format_indicator() -> Result<Field> {
    Field::new(tags::PAYLOAD_FORMAT_INDICATOR, tags::PAYLOAD_FORMAT_VERSION)
}

pub fn point_of_initiation(kind: QrKind) -> Result<Field> {
    Field::new(tags::POINT_OF_INITIATION, kind.code())
}

/// Individual merchant account template: `29 LL 00 LL <bakong id>`.
pub fn merchant_account(bakong_account_id: &str) -> Result<Field> {
    let account = required("bank_account", bakong_account_id, tags::MAX_BAKONG_ACCOUNT)?;
    let inner = [Field::new(tags::BAKONG_ACCOUNT_ID, account)?];
    tlv::wrap(tags::MERCHANT_ACCOUNT_INDIVIDUAL, &inner)?
        .ok_or_else(|| KhqrError::validation("bank_account", "is required"))
}

pub fn merchant_name(name: &str) -> Result<Field> {
    let name = required("merchant_name", name, tags::MAX_MERCHANT_NAME)?;
    Field::new(tags::MERCHANT_NAME, name)
}

pub fn merchant_city(city: &str) -> Result<Field> {
    let city = required("merchant_city", city, tags::MAX_MERCHANT_CITY)?;
    Field::new(tags::MERCHANT_CITY, city)
}

/// Merchant category code; defaults to 5999 (miscellaneous retail).
pub fn merchant_category_code(mcc: Option<&str>) -> Result<Field> {
    let mcc = optional("merchant_category_code", mcc, 4)?
        .unwrap_or_else(|| tags::DEFAULT_MERCHANT_CATEGORY_CODE.to_string());
    if mcc.len() != 4 || !mcc.chars().all(|c| c.is_ascii_digit()) {
        return Err(KhqrError::validation(
            "merchant_category_code",
            format!("'{mcc}' must be exactly 4 digits"),
        ));
    }
    Field::new(tags::MERCHANT_CATEGORY_CODE, mcc)
}

pub fn transaction_currency(currency: Currency) -> Result<Field> {
    Field::new(tags::TRANSACTION_CURRENCY, currency.numeric_code())
}

/// Transaction amount. Optional for static payloads; a dynamic payload
/// identifies one specific transaction and must carry its amount.
pub fn transaction_amount(amount: Option<&str>, kind: QrKind) -> Result<Option<Field>> {
    let raw = amount.map(str::trim).filter(|s| !s.is_empty());
    match (raw, kind) {
        (None, QrKind::Static) => Ok(None),
        (None, QrKind::Dynamic) => Err(KhqrError::validation(
            "amount",
            "is required for a dynamic payload",
        )),
        (Some(raw), _) => {
            let amount = Amount::parse(raw)?;
            Field::new(tags::TRANSACTION_AMOUNT, amount.as_payload_value()).map(Some)
        }
    }
}

pub fn country_code() -> Result<Field> {
    Field::new(tags::COUNTRY_CODE, tags::COUNTRY_CAMBODIA)
}

/// Additional data template. Sub-fields are emitted in ascending tag order;
/// empty ones are skipped, and an all-empty template yields `None`.
pub fn additional_data(data: &AdditionalData) -> Result<Option<Field>> {
    let entries = [
        (
            tags::BILL_NUMBER,
            optional("bill_number", data.bill_number.as_deref(), tags::MAX_BILL_NUMBER)?,
        ),
        (
            tags::MOBILE_NUMBER,
            optional(
                "mobile_number",
                data.mobile_number.as_deref(),
                tags::MAX_MOBILE_NUMBER,
            )?,
        ),
        (
            tags::STORE_LABEL,
            optional("store_label", data.store_label.as_deref(), tags::MAX_STORE_LABEL)?,
        ),
        (
            tags::TERMINAL_LABEL,
            optional(
                "terminal_label",
                data.terminal_label.as_deref(),
                tags::MAX_TERMINAL_LABEL,
            )?,
        ),
    ];

    let mut inner = Vec::with_capacity(entries.len());
    for (tag, value) in entries {
        if let Some(value) = value {
            inner.push(Field::new(tag, value)?);
        }
    }
    tlv::wrap(tags::ADDITIONAL_DATA, &inner)
}

/// Creation timestamp template: `99 LL 00 LL <epoch millis>`.
pub fn timestamp(at: DateTime<Utc>) -> Result<Field> {
    let millis = at.timestamp_millis();
    if millis < 0 {
        return Err(KhqrError::validation(
            "timestamp",
            format!("{at} predates the Unix epoch"),
        ));
    }
    let inner = [Field::new(tags::CREATION_TIMESTAMP, millis.to_string())?];
    tlv::wrap(tags::TIMESTAMP, &inner)?
        .ok_or_else(|| KhqrError::validation("timestamp", "is required"))
}
