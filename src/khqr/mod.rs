//! KHQR payload construction.
//!
//! Encodes a merchant payment request into the EMV-derived KHQR
//! tag-length-value string, seals it with a CRC-16 checksum, and derives the
//! MD5 fingerprint used to look the transaction up on Bakong.

pub mod amount;
pub mod crc;
pub mod fields;
pub mod fingerprint;
pub mod payload;
pub mod tags;
pub mod tlv;

pub use amount::Amount;
pub use fields::{AdditionalData, Currency, QrKind};
pub use fingerprint::Fingerprint;
pub use payload::{build_payload, build_payload_at, PaymentRequest};
