//! Raw adapter failures.
//!
//! Adapters never decide whether a failure is retryable. They report what the
//! upstream said (status, error code, `Retry-After`) and leave the decision to
//! [`crate::classify::ErrorClassifier`].

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        /// Provider error code (`code`, `status`, or `type` in the error body).
        code: Option<String>,
        message: String,
        retry_after: Option<Duration>,
    },

    /// The request never produced a response (connect failure, timeout, ...).
    #[error("transport error: {message}")]
    Transport { message: String, timed_out: bool },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The provider answered successfully but with no text.
    #[error("response contained no text")]
    EmptyResponse,
}

impl ProviderError {
    /// Build an [`ProviderError::Http`] from a failed response.
    pub fn from_response(status: u16, headers: &HeaderMap, body: &str) -> Self {
        let (code, message) = parse_error_body(body);
        ProviderError::Http {
            status,
            code,
            message,
            retry_after: parse_retry_after(headers),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Transport { timed_out: true, .. })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return ProviderError::Decode(e.to_string());
        }
        ProviderError::Transport {
            message: e.to_string(),
            timed_out: e.is_timeout(),
        }
    }
}

/// Pull the error code and message out of an upstream error body.
///
/// Understands the OpenAI shape (`{"error": {"message", "type", "code"}}`) and
/// the Google shape (`{"error": {"code": 429, "message", "status"}}`). Anything
/// else is returned verbatim as the message.
fn parse_error_body(body: &str) -> (Option<String>, String) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return (None, body.trim().to_string());
    };
    let Some(error) = value.get("error") else {
        return (None, body.trim().to_string());
    };

    // Some providers send `{"error": "text"}`.
    if let Some(text) = error.as_str() {
        return (None, text.to_string());
    }

    let code = ["code", "status", "type"]
        .iter()
        .find_map(|field| error.get(*field).and_then(|v| v.as_str()))
        .map(String::from);
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .map(String::from)
        .unwrap_or_else(|| body.trim().to_string());

    (code, message)
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    let secs: f64 = raw.parse().ok()?;
    if secs.is_finite() && secs > 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}
