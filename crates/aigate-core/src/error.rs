//! Gateway error taxonomy.
//!
//! Only [`GatewayError::Exhausted`] and [`GatewayError::UnsafeResource`] are
//! ever shown to callers, and only through [`GatewayError::user_message`].
//! Everything else drives retry/advance decisions and is logged server-side.

use std::time::Duration;

use thiserror::Error;

/// Message returned when every provider/model/credential combination failed.
pub const EXHAUSTED_MESSAGE: &str =
    "The AI service is experiencing high demand right now. Please try again in a moment.";

/// Message returned when a caller-supplied URL is rejected.
pub const UNSAFE_RESOURCE_MESSAGE: &str = "The provided image URL is not allowed.";

/// Message returned when a caller-supplied image could not be retrieved.
pub const FETCH_FAILED_MESSAGE: &str = "The image could not be retrieved.";

/// Message returned when the caller went away before a reply was produced.
pub const CANCELLED_MESSAGE: &str = "The request was cancelled.";

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transient, credential-scoped; retried with another credential.
    #[error("rate limited by {provider}/{model}: {message}")]
    RateLimited {
        provider: String,
        model: String,
        message: String,
        retry_after: Option<Duration>,
    },

    /// Persistent for this model; the chain advances.
    #[error("model {model} unavailable on {provider}: {message}")]
    ModelUnavailable {
        provider: String,
        model: String,
        message: String,
    },

    /// Opaque provider-side failure (including transport errors and timeouts).
    #[error("upstream error from {provider}/{model}: {message}")]
    Upstream {
        provider: String,
        model: String,
        message: String,
    },

    /// No credentials at all for a provider. An expected deployment state.
    #[error("no credentials configured for {provider}")]
    ConfigurationMissing { provider: String },

    /// SSRF gate rejection; the fetch is never attempted.
    #[error("unsafe resource: {0}")]
    UnsafeResource(String),

    /// A gated fetch was allowed but failed.
    #[error("resource fetch failed: {0}")]
    FetchFailed(String),

    /// Every chain link failed.
    #[error("all providers exhausted")]
    Exhausted,

    /// The caller cancelled before a reply was produced.
    #[error("request cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Text that is safe to hand to an end user.
    ///
    /// Never includes provider identity, upstream payloads, or account details.
    pub fn user_message(&self) -> &'static str {
        match self {
            GatewayError::UnsafeResource(_) => UNSAFE_RESOURCE_MESSAGE,
            GatewayError::FetchFailed(_) => FETCH_FAILED_MESSAGE,
            GatewayError::Cancelled => CANCELLED_MESSAGE,
            _ => EXHAUSTED_MESSAGE,
        }
    }

    /// Whether this error ends the caller's request rather than driving a retry.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GatewayError::Exhausted
                | GatewayError::UnsafeResource(_)
                | GatewayError::FetchFailed(_)
                | GatewayError::Cancelled
        )
    }
}
