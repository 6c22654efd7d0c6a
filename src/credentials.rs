//! Bakong API credential handling.
//!
//! The bearer token is wrapped so it is wiped from memory on drop and never
//! shows up in `Debug` output or logs. Long-lived tokens can be kept in the
//! OS credential store (DPAPI on Windows, Keychain on macOS, Secret Service
//! on Linux) instead of plain-text config files.

use crate::error::{KhqrError, Result};
use keyring::Entry;
use std::fmt;
use tracing::{info, warn};
use zeroize::Zeroizing;

const SERVICE_NAME: &str = "khqr-pay";
const KEY_BAKONG_TOKEN: &str = "bakong_token";

// ---------------------------------------------------------------------------
// Token wrapper
// ---------------------------------------------------------------------------

/// Bearer token for the Bakong Open API.
#[derive(Clone)]
pub struct BearerToken(Zeroizing<String>);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into().trim().to_string()))
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    /// Token for the `Authorization` header. Blank tokens are rejected before
    /// any request leaves the process.
    pub fn expose(&self) -> Result<&str> {
        if self.is_blank() {
            return Err(KhqrError::Auth {
                status: None,
                message: "Bakong token is missing".into(),
            });
        }
        Ok(self.0.as_str())
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_blank() {
            f.write_str("BearerToken(<blank>)")
        } else {
            f.write_str("BearerToken(<redacted>)")
        }
    }
}

impl From<String> for BearerToken {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for BearerToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ---------------------------------------------------------------------------
// OS credential store
// ---------------------------------------------------------------------------

fn store_error(action: &str, err: keyring::Error) -> KhqrError {
    KhqrError::Auth {
        status: None,
        message: format!("credential store {action} failed: {err}"),
    }
}

/// Read the stored token. Returns `None` when nothing is stored or the
/// platform store is unavailable.
pub fn load_token() -> Option<BearerToken> {
    let entry = match Entry::new(SERVICE_NAME, KEY_BAKONG_TOKEN) {
        Ok(e) => e,
        Err(e) => {
            warn!(error = %e, "keyring: failed to create entry");
            return None;
        }
    };
    match entry.get_password() {
        Ok(token) => {
            let token = BearerToken::new(token);
            (!token.is_blank()).then_some(token)
        }
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(error = %e, "keyring: failed to read Bakong token");
            None
        }
    }
}

/// Persist the token in the OS credential store.
pub fn store_token(token: &BearerToken) -> Result<()> {
    let value = token.expose()?;
    let entry =
        Entry::new(SERVICE_NAME, KEY_BAKONG_TOKEN).map_err(|e| store_error("open", e))?;
    entry
        .set_password(value)
        .map_err(|e| store_error("write", e))?;
    info!("Bakong token stored in credential store");
    Ok(())
}

/// Remove the stored token. Succeeds when nothing was stored.
pub fn clear_token() -> Result<()> {
    let entry =
        Entry::new(SERVICE_NAME, KEY_BAKONG_TOKEN).map_err(|e| store_error("open", e))?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(store_error("delete", e)),
    }
}
