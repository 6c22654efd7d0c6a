//! KHQR payment core.
//!
//! Builds Bakong KHQR payment payloads (EMV-style TLV sealed with CRC-16),
//! derives their MD5 fingerprints, and polls the Bakong Open API until a
//! payment is confirmed or the QR expires.

pub mod config;
pub mod credentials;
pub mod error;
pub mod khqr;
pub mod logging;
pub mod polling;
pub mod settlement;

pub use config::{KhqrConfig, PollingConfig, SettlementConfig};
pub use credentials::BearerToken;
pub use error::{KhqrError, Result};
pub use khqr::{
    build_payload, build_payload_at, AdditionalData, Amount, Currency, Fingerprint,
    PaymentRequest, QrKind,
};
pub use polling::{start_polling, PaymentSession, PaymentStatus, SessionDiagnostics, SessionOutcome};
pub use settlement::{BakongClient, PaymentDetail, SettlementClient, SettlementStatus};

/// Crate version plus the commit it was built from.
pub fn build_info() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "buildTimestamp": env!("BUILD_TIMESTAMP"),
        "gitSha": env!("BUILD_GIT_SHA"),
    })
}
