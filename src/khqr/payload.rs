//! Payload assembly.
//!
//! Fields are emitted in the fixed KHQR order, concatenated, and sealed with
//! the CRC field. Assembly is all-or-nothing: the first encoder error is
//! returned and no partial payload escapes.

use crate::error::{KhqrError, Result};
use crate::khqr::crc;
use crate::khqr::fields::{self, AdditionalData, Currency, QrKind};
use crate::khqr::tlv::{self, Field};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Merchant and transaction attributes for one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentRequest {
    /// Bakong account id, e.g. `merchant@bank`.
    pub bank_account: String,
    pub merchant_name: String,
    pub merchant_city: String,
    /// Four-digit MCC; `5999` when absent.
    pub merchant_category_code: Option<String>,
    /// Decimal amount as entered (`"0.01"`, `"12500"`); canonicalised on build.
    #[serde(deserialize_with = "amount_from_string_or_number")]
    pub amount: Option<String>,
    pub currency: Currency,
    #[serde(flatten)]
    pub additional: AdditionalData,
}

impl PaymentRequest {
    pub fn new(
        bank_account: impl Into<String>,
        merchant_name: impl Into<String>,
        merchant_city: impl Into<String>,
    ) -> Self {
        Self {
            bank_account: bank_account.into(),
            merchant_name: merchant_name.into(),
            merchant_city: merchant_city.into(),
            ..Default::default()
        }
    }

    pub fn with_amount(mut self, amount: impl Into<String>, currency: Currency) -> Self {
        self.amount = Some(amount.into());
        self.currency = currency;
        self
    }

    pub fn with_additional(mut self, additional: AdditionalData) -> Self {
        self.additional = additional;
        self
    }
}

fn amount_from_string_or_number<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "amount must be a string or number, got {other}"
        ))),
    }
}

/// Build a payload stamped with the current time.
pub fn build_payload(request: &PaymentRequest, kind: QrKind) -> Result<String> {
    build_payload_at(request, kind, Utc::now())
}

/// Build a payload with an explicit creation timestamp. Identical inputs
/// produce byte-identical payloads.
pub fn build_payload_at(
    request: &PaymentRequest,
    kind: QrKind,
    created_at: DateTime<Utc>,
) -> Result<String> {
    let fields = encode_fields(request, kind, created_at)?;
    let payload = crc::seal(&tlv::concat(&fields));

    // Self-check: a mismatch here means the sealing logic itself is broken.
    crc::verify(&payload).map_err(|e| match e {
        KhqrError::Checksum { .. } => e,
        other => KhqrError::Checksum {
            expected: "valid checksum".into(),
            actual: other.to_string(),
        },
    })?;

    debug!(
        kind = ?kind,
        length = payload.chars().count(),
        "KHQR payload assembled"
    );
    Ok(payload)
}

/// Run every encoder in canonical order. Optional fields that encode to
/// nothing are skipped.
fn encode_fields(
    request: &PaymentRequest,
    kind: QrKind,
    created_at: DateTime<Utc>,
) -> Result<Vec<Field>> {
    let mut out = vec![
        fields::payload_format_indicator()?,
        fields::point_of_initiation(kind)?,
        fields::merchant_account(&request.bank_account)?,
        fields::merchant_name(&request.merchant_name)?,
        fields::merchant_city(&request.merchant_city)?,
        fields::merchant_category_code(request.merchant_category_code.as_deref())?,
        fields::transaction_currency(request.currency)?,
    ];
    out.extend(fields::transaction_amount(request.amount.as_deref(), kind)?);
    out.push(fields::country_code()?);
    out.extend(fields::additional_data(&request.additional)?);
    out.push(fields::timestamp(created_at)?);
    Ok(out)
}
