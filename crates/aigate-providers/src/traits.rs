//! Provider adapter trait: the seam between the executor and each backend.
//!
//! Adapters translate one request into one upstream call. They never retry,
//! never fall back, and never touch rotation state.

use std::time::Duration;

use async_trait::async_trait;

use aigate_core::types::{trailing_window, Attachment, Completion, Turn};

use crate::credentials::Credential;
use crate::error::ProviderError;

/// Prior turns sent upstream per request (system turns are always kept).
pub const MAX_CONTEXT_TURNS: usize = 10;

/// Settings shared by every call an adapter makes.
#[derive(Clone, Debug)]
pub struct LlmRequestConfig {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
    /// Upper bound on one upstream call, connect to last byte.
    pub timeout: Duration,
}

impl Default for LlmRequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Trait that all provider backends implement.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Send one completion request.
    ///
    /// # Arguments
    /// * `model`     : Provider-native model identifier.
    /// * `turns`     : Conversation, system turns included. Adapters keep
    ///                  only the last [`MAX_CONTEXT_TURNS`].
    /// * `credential`: The credential chosen by the rotation tracker.
    /// * `attachment`: Optional image for the last user turn.
    async fn send(
        &self,
        model: &str,
        turns: &[Turn],
        credential: &Credential,
        attachment: Option<&Attachment>,
    ) -> Result<Completion, ProviderError>;

    /// Registry name (e.g. `"groq"`). Matches chain links and pool keys.
    fn provider(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}

/// The turns an adapter actually sends.
pub fn context_window(turns: &[Turn]) -> Vec<Turn> {
    trailing_window(turns, MAX_CONTEXT_TURNS)
}
