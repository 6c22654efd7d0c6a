//! Runtime configuration.
//!
//! Everything the crate needs is passed in explicitly as a [`KhqrConfig`]
//! value. It can be built in code, deserialised from a `serde_json::Value`,
//! or loaded from a JSON file; every key is optional and falls back to the
//! defaults below.

use crate::error::{KhqrError, Result};
use crate::khqr::{PaymentRequest, QrKind};
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_API_BASE: &str = "https://api-bakong.nbc.gov.kh/v1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Settlement API endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettlementConfig {
    pub api_base: String,
    #[serde(with = "duration_ms", rename = "requestTimeoutMs")]
    pub request_timeout: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl SettlementConfig {
    /// Base URL with scheme and without trailing slashes.
    pub fn normalized_api_base(&self) -> String {
        normalize_api_base(&self.api_base)
    }
}

/// Polling cadence and QR lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollingConfig {
    #[serde(with = "duration_ms", rename = "pollIntervalMs")]
    pub poll_interval: Duration,
    #[serde(with = "duration_secs", rename = "validitySecs")]
    pub validity: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            validity: DEFAULT_VALIDITY,
        }
    }
}

impl PollingConfig {
    pub fn new(validity: Duration, poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            validity,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(KhqrError::validation("poll_interval", "must be greater than zero"));
        }
        if self.validity.is_zero() {
            return Err(KhqrError::validation("validity", "must be greater than zero"));
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KhqrConfig {
    pub settlement: SettlementConfig,
    pub polling: PollingConfig,
    pub merchant: PaymentRequest,
    pub qr_kind: QrKind,
    pub log: LogConfig,
    /// Bakong bearer token. Prefer the OS credential store over putting it
    /// here; it is never written back out.
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl KhqrConfig {
    /// Deserialise from a JSON value, applying defaults for missing keys.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value.clone())
            .map_err(|e| KhqrError::Config(format!("invalid configuration: {e}")))?;
        config.polling.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| KhqrError::Config(format!("cannot read {}: {e}", path.display())))?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| KhqrError::Config(format!("{} is not valid JSON: {e}", path.display())))?;
        let config = Self::from_value(&value)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the settlement API base URL:
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
pub fn normalize_api_base(url: &str) -> String {
    let mut url = url.trim().to_string();
    if url.is_empty() {
        return DEFAULT_API_BASE.to_string();
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }
    url
}

// ---------------------------------------------------------------------------
// Duration (de)serialisation helpers
// ---------------------------------------------------------------------------

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::khqr::Currency;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = KhqrConfig::from_value(&json!({})).unwrap();
        assert_eq!(config.settlement.api_base, DEFAULT_API_BASE);
        assert_eq!(config.settlement.request_timeout, Duration::from_secs(30));
        assert_eq!(config.polling.poll_interval, Duration::from_secs(3));
        assert_eq!(config.polling.validity, Duration::from_secs(120));
        assert_eq!(config.qr_kind, QrKind::Dynamic);
        assert!(config.token.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = KhqrConfig::from_value(&json!({
            "settlement": { "apiBase": "sit-api-bakong.nbc.gov.kh/v1/", "requestTimeoutMs": 5000 },
            "polling": { "pollIntervalMs": 1500, "validitySecs": 60 },
            "merchant": {
                "bankAccount": "shop@abaa",
                "merchantName": "Coffee Corner",
                "merchantCity": "Siem Reap",
                "amount": "12500",
                "currency": "KHR"
            },
            "qrKind": "static",
            "token": "abc"
        }))
        .unwrap();
        assert_eq!(
            config.settlement.normalized_api_base(),
            "https://sit-api-bakong.nbc.gov.kh/v1"
        );
        assert_eq!(config.settlement.request_timeout, Duration::from_millis(5000));
        assert_eq!(config.polling.poll_interval, Duration::from_millis(1500));
        assert_eq!(config.polling.validity, Duration::from_secs(60));
        assert_eq!(config.merchant.currency, Currency::Khr);
        assert_eq!(config.merchant.amount.as_deref(), Some("12500"));
        assert_eq!(config.qr_kind, QrKind::Static);
        assert_eq!(config.token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_token_is_not_serialised() {
        let config = KhqrConfig {
            token: Some("secret".into()),
            ..Default::default()
        };
        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = KhqrConfig::from_value(&json!({ "polling": { "pollIntervalMs": 0 } }))
            .unwrap_err();
        assert!(matches!(err, KhqrError::Validation { field: "poll_interval", .. }));
    }

    #[test]
    fn test_rejects_wrong_types() {
        let err = KhqrConfig::from_value(&json!({ "polling": { "validitySecs": "soon" } }))
            .unwrap_err();
        assert!(matches!(err, KhqrError::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = KhqrConfig::load(Path::new("/nonexistent/khqr.json")).unwrap_err();
        assert!(matches!(err, KhqrError::Config(_)));
    }

    #[test]
    fn test_normalize_api_base() {
        assert_eq!(normalize_api_base(""), DEFAULT_API_BASE);
        assert_eq!(
            normalize_api_base("localhost:8080//"),
            "http://localhost:8080"
        );
        assert_eq!(
            normalize_api_base(" https://api-bakong.nbc.gov.kh/v1/ "),
            "https://api-bakong.nbc.gov.kh/v1"
        );
    }
}
