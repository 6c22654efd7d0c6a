//! Settlement status lookups.
//!
//! Defines the [`SettlementClient`] trait the poller talks to, plus the pure
//! functions that turn Bakong response envelopes into typed results. The
//! HTTP transport lives in [`bakong`].

pub mod bakong;

use crate::credentials::BearerToken;
use crate::error::{KhqrError, Result};
use crate::khqr::Fingerprint;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub use bakong::BakongClient;

/// Bakong accepts at most this many fingerprints per bulk lookup.
pub const MAX_BULK_FINGERPRINTS: usize = 50;

/// Application error codes meaning "no such transaction yet".
const NOT_FOUND_ERROR_CODES: [i64; 2] = [11, 12];

const AFFIRMATIVE_STATUSES: [&str; 2] = ["SUCCESS", "PAID"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Outcome of a single lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    Paid,
    Unpaid,
}

/// Transaction record returned for a settled payment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentDetail {
    pub hash: Option<String>,
    pub from_account_id: Option<String>,
    pub to_account_id: Option<String>,
    pub currency: Option<String>,
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub created_date_ms: Option<i64>,
    pub acknowledged_date_ms: Option<i64>,
    pub external_ref: Option<String>,
    /// Fields not modelled above, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

/// Remote payment-status authority. Implementations hold no per-session
/// state; every call carries its own credential.
#[async_trait]
pub trait SettlementClient: Send + Sync {
    /// Look up one fingerprint.
    async fn check_status(
        &self,
        fingerprint: &Fingerprint,
        token: &BearerToken,
    ) -> Result<SettlementStatus>;

    /// Look up up to [`MAX_BULK_FINGERPRINTS`] fingerprints and return the
    /// ones confirmed paid. The default issues one single lookup per entry.
    async fn check_bulk(
        &self,
        fingerprints: &[Fingerprint],
        token: &BearerToken,
    ) -> Result<Vec<Fingerprint>> {
        validate_bulk(fingerprints)?;
        let mut paid = Vec::new();
        for fingerprint in fingerprints {
            if self.check_status(fingerprint, token).await? == SettlementStatus::Paid {
                paid.push(fingerprint.clone());
            }
        }
        Ok(paid)
    }

    /// Full transaction record, when the payment exists.
    async fn payment_detail(
        &self,
        fingerprint: &Fingerprint,
        token: &BearerToken,
    ) -> Result<Option<PaymentDetail>>;
}

/// Enforce the bulk size limit before anything goes over the wire.
pub fn validate_bulk(fingerprints: &[Fingerprint]) -> Result<()> {
    if fingerprints.len() > MAX_BULK_FINGERPRINTS {
        return Err(KhqrError::validation(
            "fingerprints",
            format!(
                "{} fingerprints requested (max {MAX_BULK_FINGERPRINTS} per lookup)",
                fingerprints.len()
            ),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Response interpretation
// ---------------------------------------------------------------------------

/// Case-insensitive match against the statuses Bakong uses for settled
/// transactions. Anything else counts as not paid.
pub fn is_affirmative(status: &str) -> bool {
    let status = status.trim();
    AFFIRMATIVE_STATUSES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(status))
}

fn protocol(detail: impl Into<String>) -> KhqrError {
    KhqrError::Protocol {
        status: None,
        detail: detail.into(),
    }
}

fn response_code(body: &Value) -> Result<i64> {
    let envelope = body
        .as_object()
        .ok_or_else(|| protocol(format!("expected a JSON object, got {body}")))?;
    envelope
        .get("responseCode")
        .and_then(Value::as_i64)
        .ok_or_else(|| protocol("responseCode is missing or not an integer"))
}

fn error_code(body: &Value) -> Option<i64> {
    body.get("errorCode").and_then(Value::as_i64)
}

/// Interpret a `check_transaction_by_md5` envelope.
pub fn interpret_status_response(body: &Value) -> Result<SettlementStatus> {
    let code = response_code(body)?;
    if code != 0 {
        match error_code(body) {
            Some(c) if NOT_FOUND_ERROR_CODES.contains(&c) => {
                debug!(error_code = c, "transaction not found yet");
            }
            other => {
                debug!(response_code = code, error_code = ?other, "lookup returned application error");
            }
        }
        return Ok(SettlementStatus::Unpaid);
    }

    match body.get("data") {
        None | Some(Value::Null) => Ok(SettlementStatus::Unpaid),
        Some(Value::Object(data)) => match data.get("status") {
            Some(Value::String(status)) if is_affirmative(status) => Ok(SettlementStatus::Paid),
            Some(Value::String(_)) => Ok(SettlementStatus::Unpaid),
            // The transaction record itself is the evidence of settlement.
            None | Some(Value::Null) => Ok(SettlementStatus::Paid),
            Some(other) => Err(protocol(format!("data.status is not a string: {other}"))),
        },
        Some(other) => Err(protocol(format!("data is not an object: {other}"))),
    }
}

/// Interpret a `check_transaction_by_md5_list` envelope, returning the
/// fingerprints reported paid.
pub fn interpret_bulk_response(body: &Value) -> Result<Vec<Fingerprint>> {
    if response_code(body)? != 0 {
        return Ok(Vec::new());
    }

    let items = match body.get("data") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => return Err(protocol(format!("data is not an array: {other}"))),
    };

    let mut paid = Vec::new();
    for item in items {
        let status = item.get("status").and_then(Value::as_str);
        let md5 = item.get("md5").and_then(Value::as_str);
        if let (Some(status), Some(md5)) = (status, md5) {
            if !is_affirmative(status) {
                continue;
            }
            match Fingerprint::parse(md5) {
                Ok(fp) => paid.push(fp),
                Err(e) => warn!(md5, error = %e, "skipping malformed md5 in bulk response"),
            }
        }
    }
    Ok(paid)
}

/// Interpret a detail lookup: `Some` only when the record exists.
pub fn interpret_detail_response(body: &Value) -> Result<Option<PaymentDetail>> {
    if response_code(body)? != 0 {
        return Ok(None);
    }
    match body.get("data") {
        None | Some(Value::Null) => Ok(None),
        Some(data @ Value::Object(_)) => serde_json::from_value(data.clone())
            .map(Some)
            .map_err(|e| protocol(format!("transaction record: {e}"))),
        Some(other) => Err(protocol(format!("data is not an object: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FP_A: &str = "472f60def7c1fca889a1bbc4b57c4096";
    const FP_B: &str = "ef3d5f32039d460ead21470cb32a059b";

    #[test]
    fn test_affirmative_statuses() {
        assert!(is_affirmative("SUCCESS"));
        assert!(is_affirmative("paid"));
        assert!(is_affirmative(" Success "));
        assert!(!is_affirmative("PENDING"));
        assert!(!is_affirmative("SUCCESSFUL"));
        assert!(!is_affirmative(""));
    }

    #[test]
    fn test_status_success_envelope() {
        let body = json!({ "responseCode": 0, "data": { "status": "success" } });
        assert_eq!(interpret_status_response(&body).unwrap(), SettlementStatus::Paid);
        let body = json!({ "responseCode": 0, "data": { "status": "PENDING" } });
        assert_eq!(interpret_status_response(&body).unwrap(), SettlementStatus::Unpaid);
    }

    #[test]
    fn test_status_record_without_status_field_is_paid() {
        let body = json!({
            "responseCode": 0,
            "responseMessage": "Getting transaction successfully.",
            "data": { "hash": "abc", "amount": 0.01, "currency": "USD" }
        });
        assert_eq!(interpret_status_response(&body).unwrap(), SettlementStatus::Paid);
    }

    #[test]
    fn test_status_not_found_is_unpaid() {
        for code in [11, 12] {
            let body = json!({ "responseCode": 1, "errorCode": code, "data": null });
            assert_eq!(interpret_status_response(&body).unwrap(), SettlementStatus::Unpaid);
        }
        let body = json!({ "responseCode": 1, "errorCode": 99 });
        assert_eq!(interpret_status_response(&body).unwrap(), SettlementStatus::Unpaid);
        let body = json!({ "responseCode": 0, "data": null });
        assert_eq!(interpret_status_response(&body).unwrap(), SettlementStatus::Unpaid);
    }

    #[test]
    fn test_status_malformed_envelopes() {
        for body in [
            json!([]),
            json!("ok"),
            json!({ "data": { "status": "PAID" } }),
            json!({ "responseCode": "0" }),
            json!({ "responseCode": 0, "data": "PAID" }),
            json!({ "responseCode": 0, "data": { "status": 1 } }),
        ] {
            let err = interpret_status_response(&body).unwrap_err();
            assert!(matches!(err, KhqrError::Protocol { .. }), "{body}");
        }
    }

    #[test]
    fn test_bulk_returns_only_paid() {
        let body = json!({
            "responseCode": 0,
            "data": [
                { "md5": FP_A, "status": "SUCCESS" },
                { "md5": FP_B, "status": "PENDING" },
                { "md5": "not-a-hash", "status": "PAID" },
                { "status": "PAID" }
            ]
        });
        let paid = interpret_bulk_response(&body).unwrap();
        assert_eq!(paid, vec![Fingerprint::parse(FP_A).unwrap()]);
    }

    #[test]
    fn test_bulk_application_error_is_empty() {
        let body = json!({ "responseCode": 1, "errorCode": 5 });
        assert!(interpret_bulk_response(&body).unwrap().is_empty());
        let body = json!({ "responseCode": 0, "data": { "md5": FP_A } });
        assert!(interpret_bulk_response(&body).is_err());
    }

    #[test]
    fn test_detail_response() {
        let body = json!({
            "responseCode": 0,
            "data": {
                "hash": "8a6d...",
                "fromAccountId": "payer@abaa",
                "toAccountId": "shop@abaa",
                "currency": "USD",
                "amount": 0.01,
                "createdDateMs": 1_700_000_000_000_i64,
                "trackingStatus": null
            }
        });
        let detail = interpret_detail_response(&body).unwrap().unwrap();
        assert_eq!(detail.to_account_id.as_deref(), Some("shop@abaa"));
        assert_eq!(detail.amount, Some(0.01));
        assert_eq!(detail.created_date_ms, Some(1_700_000_000_000));
        assert!(detail.extra.contains_key("trackingStatus"));

        let body = json!({ "responseCode": 1, "errorCode": 11 });
        assert_eq!(interpret_detail_response(&body).unwrap(), None);
    }

    struct CountingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SettlementClient for CountingClient {
        async fn check_status(
            &self,
            fingerprint: &Fingerprint,
            _token: &BearerToken,
        ) -> Result<SettlementStatus> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if fingerprint.as_str() == FP_A {
                Ok(SettlementStatus::Paid)
            } else {
                Ok(SettlementStatus::Unpaid)
            }
        }

        async fn payment_detail(
            &self,
            _fingerprint: &Fingerprint,
            _token: &BearerToken,
        ) -> Result<Option<PaymentDetail>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_default_bulk_limits() {
        let client = CountingClient {
            calls: AtomicUsize::new(0),
        };
        let token = BearerToken::new("t");

        let too_many = vec![Fingerprint::parse(FP_B).unwrap(); MAX_BULK_FINGERPRINTS + 1];
        let err = client.check_bulk(&too_many, &token).await.unwrap_err();
        assert!(matches!(err, KhqrError::Validation { field: "fingerprints", .. }));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);

        assert!(client.check_bulk(&[], &token).await.unwrap().is_empty());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);

        let batch = vec![
            Fingerprint::parse(FP_A).unwrap(),
            Fingerprint::parse(FP_B).unwrap(),
        ];
        let paid = client.check_bulk(&batch, &token).await.unwrap();
        assert_eq!(paid, vec![Fingerprint::parse(FP_A).unwrap()]);
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }
}
