//! Bakong Open API client.
//!
//! Authenticated JSON POSTs against the settlement API, with transport and
//! HTTP failures mapped onto [`KhqrError`] variants.

use super::{
    interpret_bulk_response, interpret_detail_response, interpret_status_response, validate_bulk,
    PaymentDetail, SettlementClient, SettlementStatus,
};
use crate::config::SettlementConfig;
use crate::credentials::BearerToken;
use crate::error::{KhqrError, Result};
use crate::khqr::Fingerprint;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("khqr-pay/", env!("CARGO_PKG_VERSION"));

const CHECK_BY_MD5: &str = "check_transaction_by_md5";
const CHECK_BY_MD5_LIST: &str = "check_transaction_by_md5_list";

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a transport error.
fn transport_error(base: &str, err: &reqwest::Error) -> KhqrError {
    let message = if err.is_connect() {
        format!("cannot reach Bakong API at {base}")
    } else if err.is_timeout() {
        format!("request to {base} timed out")
    } else if err.is_builder() {
        format!("invalid Bakong API URL: {base}")
    } else {
        format!("network error communicating with {base}: {err}")
    };
    KhqrError::Transport {
        message,
        timeout: err.is_timeout(),
    }
}

fn response_message(body_text: &str) -> Option<String> {
    let json = serde_json::from_str::<Value>(body_text).ok()?;
    json.get("responseMessage")
        .or_else(|| json.get("message"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Map a non-success HTTP status onto the error taxonomy.
pub fn classify_http_status(status: StatusCode, body_text: &str) -> KhqrError {
    let code = status.as_u16();
    let detail = response_message(body_text);
    match code {
        401 => KhqrError::Auth {
            status: Some(code),
            message: detail.unwrap_or_else(|| "token invalid or expired".into()),
        },
        403 => KhqrError::Auth {
            status: Some(code),
            message: detail.unwrap_or_else(|| {
                "Bakong API is accessible only from approved IP ranges".into()
            }),
        },
        429 => KhqrError::RateLimited { status: code },
        500..=599 => KhqrError::Upstream {
            status: code,
            error_code: serde_json::from_str::<Value>(body_text)
                .ok()
                .and_then(|v| v.get("errorCode").and_then(Value::as_i64)),
        },
        400 => KhqrError::Protocol {
            status: Some(code),
            detail: detail.unwrap_or_else(|| "request rejected; check the payload".into()),
        },
        404 => KhqrError::Protocol {
            status: Some(code),
            detail: detail.unwrap_or_else(|| "endpoint not found".into()),
        },
        _ => KhqrError::Protocol {
            status: Some(code),
            detail: detail.unwrap_or_else(|| "unexpected response".into()),
        },
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Stateless Bakong client; cheap to clone and share across sessions.
#[derive(Debug, Clone)]
pub struct BakongClient {
    http: Client,
    base_url: String,
}

impl BakongClient {
    pub fn new(config: &SettlementConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| KhqrError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.normalized_api_base(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON body to `endpoint` and return the parsed envelope.
    async fn post(&self, endpoint: &str, body: &Value, token: &BearerToken) -> Result<Value> {
        let bearer = token.expose()?;
        let url = format!("{}/{endpoint}", self.base_url);
        let start = Instant::now();

        let resp = self
            .http
            .post(&url)
            .bearer_auth(bearer)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(&self.base_url, &e))?;

        let status = resp.status();
        let body_text = resp
            .text()
            .await
            .map_err(|e| transport_error(&self.base_url, &e))?;
        let latency_ms = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            let err = classify_http_status(status, &body_text);
            warn!(endpoint, status = status.as_u16(), latency_ms, error = %err, "Bakong request failed");
            return Err(err);
        }

        debug!(endpoint, latency_ms, "Bakong request completed");
        serde_json::from_str(&body_text).map_err(|e| KhqrError::Protocol {
            status: Some(status.as_u16()),
            detail: format!("invalid JSON from Bakong API: {e}"),
        })
    }
}

#[async_trait]
impl SettlementClient for BakongClient {
    async fn check_status(
        &self,
        fingerprint: &Fingerprint,
        token: &BearerToken,
    ) -> Result<SettlementStatus> {
        let body = self
            .post(CHECK_BY_MD5, &json!({ "md5": fingerprint.as_str() }), token)
            .await?;
        let status = interpret_status_response(&body)?;
        debug!(fingerprint = %fingerprint, status = ?status, "status lookup");
        Ok(status)
    }

    async fn check_bulk(
        &self,
        fingerprints: &[Fingerprint],
        token: &BearerToken,
    ) -> Result<Vec<Fingerprint>> {
        validate_bulk(fingerprints)?;
        if fingerprints.is_empty() {
            return Ok(Vec::new());
        }

        let hashes: Vec<&str> = fingerprints.iter().map(Fingerprint::as_str).collect();
        let body = self.post(CHECK_BY_MD5_LIST, &json!(hashes), token).await?;
        let paid = interpret_bulk_response(&body)?;
        info!(
            requested = fingerprints.len(),
            paid = paid.len(),
            "bulk status lookup"
        );
        Ok(paid)
    }

    async fn payment_detail(
        &self,
        fingerprint: &Fingerprint,
        token: &BearerToken,
    ) -> Result<Option<PaymentDetail>> {
        let body = self
            .post(CHECK_BY_MD5, &json!({ "md5": fingerprint.as_str() }), token)
            .await?;
        interpret_detail_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Nothing listens on the discard port; any request that does go out
    /// fails with a transport error.
    fn offline_client() -> BakongClient {
        BakongClient::new(&SettlementConfig {
            api_base: "http://127.0.0.1:9/v1/".into(),
            request_timeout: Duration::from_millis(500),
        })
        .unwrap()
    }

    fn fp(n: usize) -> Fingerprint {
        Fingerprint::of(&format!("payload-{n}"))
    }

    #[test]
    fn test_base_url_normalised() {
        assert_eq!(offline_client().base_url(), "http://127.0.0.1:9/v1");
    }

    #[test]
    fn test_classify_auth_statuses() {
        let err = classify_http_status(StatusCode::UNAUTHORIZED, "");
        assert_eq!(
            err,
            KhqrError::Auth {
                status: Some(401),
                message: "token invalid or expired".into()
            }
        );
        let err = classify_http_status(
            StatusCode::FORBIDDEN,
            r#"{"responseMessage":"IP not whitelisted"}"#,
        );
        assert_eq!(
            err,
            KhqrError::Auth {
                status: Some(403),
                message: "IP not whitelisted".into()
            }
        );
    }

    #[test]
    fn test_classify_retryable_statuses() {
        let err = classify_http_status(StatusCode::TOO_MANY_REQUESTS, "");
        assert_eq!(err, KhqrError::RateLimited { status: 429 });
        assert!(err.is_retryable());

        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::GATEWAY_TIMEOUT,
        ] {
            let err = classify_http_status(status, r#"{"errorCode": 3}"#);
            assert_eq!(
                err,
                KhqrError::Upstream {
                    status: status.as_u16(),
                    error_code: Some(3)
                }
            );
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn test_classify_other_statuses_as_protocol() {
        let err = classify_http_status(StatusCode::NOT_FOUND, "<html>");
        assert_eq!(
            err,
            KhqrError::Protocol {
                status: Some(404),
                detail: "endpoint not found".into()
            }
        );
        let err = classify_http_status(StatusCode::BAD_REQUEST, "");
        assert!(matches!(err, KhqrError::Protocol { status: Some(400), .. }));
    }

    #[tokio::test]
    async fn test_blank_token_rejected_before_request() {
        let client = offline_client();
        let err = client
            .check_status(&fp(1), &BearerToken::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, KhqrError::Auth { status: None, .. }));
    }

    #[tokio::test]
    async fn test_bulk_over_limit_makes_no_request() {
        let client = offline_client();
        let batch: Vec<Fingerprint> = (0..51).map(fp).collect();
        let err = client
            .check_bulk(&batch, &BearerToken::new("token"))
            .await
            .unwrap_err();
        assert!(matches!(err, KhqrError::Validation { field: "fingerprints", .. }));
    }

    #[tokio::test]
    async fn test_bulk_empty_makes_no_request() {
        let client = offline_client();
        let paid = client
            .check_bulk(&[], &BearerToken::new("token"))
            .await
            .unwrap();
        assert!(paid.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let client = offline_client();
        let err = client
            .check_status(&fp(2), &BearerToken::new("token"))
            .await
            .unwrap_err();
        assert!(matches!(err, KhqrError::Transport { .. }), "{err:?}");
        assert!(err.is_retryable());
    }
}
