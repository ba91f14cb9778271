//! Failure classification.
//!
//! Structured signals win: HTTP status and provider error codes are checked
//! first. Only when those say nothing does the error text go through the
//! configurable substring table. Transport and decode failures are never
//! text-matched; a timeout message that happens to contain "limit" is still an
//! upstream failure.

use std::time::Duration;

use aigate_core::config::schema::ClassifierConfig;

use crate::error::ProviderError;

/// Error codes that mean "this credential is throttled".
const RATE_LIMIT_CODES: &[&str] = &[
    "rate_limit_exceeded",
    "rate_limit_error",
    "resource_exhausted",
    "too_many_requests",
    "insufficient_quota",
];

/// Error codes that mean "this model cannot serve the request".
const MODEL_UNAVAILABLE_CODES: &[&str] = &["model_not_found", "model_decommissioned"];

/// What the executor should do after a failed attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureClass {
    /// Cool the credential down and try the next one on the same model.
    RateLimited { retry_after: Option<Duration> },
    /// Abandon this model; credentials are not consumed.
    ModelUnavailable,
    /// Abandon this model.
    Other,
}

#[derive(Clone, Debug)]
pub struct ErrorClassifier {
    rate_limit_terms: Vec<String>,
    model_unavailable_terms: Vec<Vec<String>>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::from_config(&ClassifierConfig::default())
    }
}

impl ErrorClassifier {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        ErrorClassifier {
            rate_limit_terms: config
                .rate_limit_terms
                .iter()
                .map(|t| t.to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            model_unavailable_terms: config
                .model_unavailable_terms
                .iter()
                .map(|group| group.iter().map(|t| t.to_lowercase()).collect::<Vec<_>>())
                .filter(|group| !group.is_empty())
                .collect(),
        }
    }

    pub fn classify(&self, error: &ProviderError) -> FailureClass {
        match error {
            ProviderError::Http {
                status,
                code,
                message,
                retry_after,
            } => {
                let code = code.as_deref().map(str::to_lowercase);
                let code = code.as_deref();

                if *status == 429 || code.is_some_and(|c| RATE_LIMIT_CODES.contains(&c)) {
                    return FailureClass::RateLimited {
                        retry_after: *retry_after,
                    };
                }
                if code.is_some_and(|c| MODEL_UNAVAILABLE_CODES.contains(&c)) {
                    return FailureClass::ModelUnavailable;
                }

                match self.classify_text(message) {
                    FailureClass::RateLimited { .. } => FailureClass::RateLimited {
                        retry_after: *retry_after,
                    },
                    other => other,
                }
            }
            ProviderError::Transport { .. }
            | ProviderError::Decode(_)
            | ProviderError::EmptyResponse => FailureClass::Other,
        }
    }

    /// Look `text` up in the substring table (case-insensitive).
    pub fn classify_text(&self, text: &str) -> FailureClass {
        let text = text.to_lowercase();

        if self.rate_limit_terms.iter().any(|t| text.contains(t.as_str())) {
            return FailureClass::RateLimited { retry_after: None };
        }
        if self
            .model_unavailable_terms
            .iter()
            .any(|group| group.iter().all(|t| text.contains(t.as_str())))
        {
            return FailureClass::ModelUnavailable;
        }
        FailureClass::Other
    }
}
