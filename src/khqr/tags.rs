//! KHQR tag identifiers, fixed values, and per-field length limits.

// ---------------------------------------------------------------------------
// Top-level tags
// ---------------------------------------------------------------------------

pub const PAYLOAD_FORMAT_INDICATOR: &str = "00";
pub const POINT_OF_INITIATION: &str = "01";
pub const MERCHANT_ACCOUNT_INDIVIDUAL: &str = "29";
pub const MERCHANT_CATEGORY_CODE: &str = "52";
pub const TRANSACTION_CURRENCY: &str = "53";
pub const TRANSACTION_AMOUNT: &str = "54";
pub const COUNTRY_CODE: &str = "58";
pub const MERCHANT_NAME: &str = "59";
pub const MERCHANT_CITY: &str = "60";
pub const ADDITIONAL_DATA: &str = "62";
pub const CRC: &str = "63";
pub const TIMESTAMP: &str = "99";

// ---------------------------------------------------------------------------
// Nested sub-tags
// ---------------------------------------------------------------------------

/// Bakong account id inside the merchant account template (tag 29).
pub const BAKONG_ACCOUNT_ID: &str = "00";

pub const BILL_NUMBER: &str = "01";
pub const MOBILE_NUMBER: &str = "02";
pub const STORE_LABEL: &str = "03";
pub const TERMINAL_LABEL: &str = "07";

/// Creation time inside the timestamp template (tag 99).
pub const CREATION_TIMESTAMP: &str = "00";

// ---------------------------------------------------------------------------
// Fixed values
// ---------------------------------------------------------------------------

pub const PAYLOAD_FORMAT_VERSION: &str = "01";
pub const STATIC_QR: &str = "11";
pub const DYNAMIC_QR: &str = "12";
pub const DEFAULT_MERCHANT_CATEGORY_CODE: &str = "5999";
pub const COUNTRY_CAMBODIA: &str = "KH";
/// Checksum values are always four hex characters.
pub const CRC_LENGTH: &str = "04";

// ---------------------------------------------------------------------------
// Maximum value lengths (characters)
// ---------------------------------------------------------------------------

pub const MAX_BAKONG_ACCOUNT: usize = 32;
pub const MAX_MERCHANT_NAME: usize = 25;
pub const MAX_MERCHANT_CITY: usize = 15;
pub const MAX_AMOUNT: usize = 13;
pub const MAX_BILL_NUMBER: usize = 25;
pub const MAX_MOBILE_NUMBER: usize = 25;
pub const MAX_STORE_LABEL: usize = 25;
pub const MAX_TERMINAL_LABEL: usize = 25;
/// Upper bound imposed by the two-digit length prefix.
pub const MAX_TLV_VALUE: usize = 99;
