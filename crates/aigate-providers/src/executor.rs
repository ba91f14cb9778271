//! Fallback chain executor.
//!
//! Walks the chain for a request's task type, one (provider, model) link at a
//! time. Each link gets up to one attempt per credential in the provider's
//! pool:
//!
//! - success short-circuits the whole chain
//! - rate limited: cool the credential down, retry the same model with the
//!   next credential
//! - model unavailable or any other failure: move to the next link
//!
//! Providers with no credentials are skipped without spending an attempt.
//! Attempts are strictly sequential and nothing is spawned.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use aigate_core::error::GatewayError;
use aigate_core::types::{Completion, GatewayResult, RequestEnvelope, TaskType};

use crate::chain::{ChainLink, FallbackChains};
use crate::classify::{ErrorClassifier, FailureClass};
use crate::rotation::RotationTracker;
use crate::traits::ProviderAdapter;

pub struct FallbackExecutor {
    chains: FallbackChains,
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    tracker: Arc<RotationTracker>,
    classifier: ErrorClassifier,
}

impl FallbackExecutor {
    pub fn new(
        chains: FallbackChains,
        adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
        tracker: Arc<RotationTracker>,
        classifier: ErrorClassifier,
    ) -> Self {
        FallbackExecutor {
            chains,
            adapters,
            tracker,
            classifier,
        }
    }

    pub fn chains(&self) -> &FallbackChains {
        &self.chains
    }

    pub fn tracker(&self) -> &Arc<RotationTracker> {
        &self.tracker
    }

    /// Run the request through its chain.
    pub async fn execute(&self, envelope: &RequestEnvelope) -> GatewayResult {
        self.execute_with_cancel(envelope, &CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), but stops as soon as `cancel` fires.
    ///
    /// The in-flight attempt is dropped and no further links are tried.
    pub async fn execute_with_cancel(
        &self,
        envelope: &RequestEnvelope,
        cancel: &CancellationToken,
    ) -> GatewayResult {
        match self.run(envelope, cancel).await {
            Ok((completion, link)) => {
                info!(
                    provider = %link.provider,
                    model = %link.model,
                    tokens = completion.tokens,
                    "request served"
                );
                GatewayResult::success(completion, link.provider, link.model)
            }
            Err(err) => GatewayResult::failure(err.user_message()),
        }
    }

    async fn run(
        &self,
        envelope: &RequestEnvelope,
        cancel: &CancellationToken,
    ) -> Result<(Completion, ChainLink), GatewayError> {
        // An image can only go to image-capable models.
        let task = if envelope.attachment.is_some() {
            TaskType::Vision
        } else {
            envelope.task_type
        };
        let chain = self.chains.for_task(task);
        let turns = envelope.dispatch_turns();
        let attachment = envelope.attachment.as_ref();

        debug!(task = task.as_str(), links = chain.len(), "executing chain");

        let mut last_error: Option<GatewayError> = None;

        for link in chain.iter() {
            let attempts = self.tracker.pool_size(&link.provider);
            let adapter = match self.adapters.get(&link.provider) {
                Some(adapter) if attempts > 0 => adapter,
                _ => {
                    debug!(provider = %link.provider, "provider not configured, skipping");
                    if last_error.is_none() {
                        last_error = Some(GatewayError::ConfigurationMissing {
                            provider: link.provider.clone(),
                        });
                    }
                    continue;
                }
            };

            for attempt in 1..=attempts {
                if cancel.is_cancelled() {
                    return Err(GatewayError::Cancelled);
                }

                let Some(credential) = self.tracker.next_credential(&link.provider).await else {
                    debug!(provider = %link.provider, "no credential available");
                    break;
                };

                debug!(
                    provider = %link.provider,
                    model = %link.model,
                    credential = %credential.fingerprint(),
                    attempt,
                    "attempt"
                );

                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        warn!(provider = %link.provider, model = %link.model, "request cancelled mid-attempt");
                        return Err(GatewayError::Cancelled);
                    }
                    outcome = adapter.send(&link.model, &turns, &credential, attachment) => outcome,
                };

                let err = match outcome {
                    Ok(completion) => return Ok((completion, link.clone())),
                    Err(err) => err,
                };

                match self.classifier.classify(&err) {
                    FailureClass::RateLimited { retry_after } => {
                        self.tracker
                            .mark_rate_limited(&link.provider, &credential, retry_after)
                            .await;
                        last_error = Some(GatewayError::RateLimited {
                            provider: link.provider.clone(),
                            model: link.model.clone(),
                            message: err.to_string(),
                            retry_after,
                        });
                    }
                    FailureClass::ModelUnavailable => {
                        warn!(
                            provider = %link.provider,
                            model = %link.model,
                            error = %err,
                            "model unavailable, advancing"
                        );
                        last_error = Some(GatewayError::ModelUnavailable {
                            provider: link.provider.clone(),
                            model: link.model.clone(),
                            message: err.to_string(),
                        });
                        break;
                    }
                    FailureClass::Other => {
                        error!(
                            provider = %link.provider,
                            model = %link.model,
                            error = %err,
                            "upstream failure, advancing"
                        );
                        last_error = Some(GatewayError::Upstream {
                            provider: link.provider.clone(),
                            model: link.model.clone(),
                            message: err.to_string(),
                        });
                        break;
                    }
                }
            }
        }

        match &last_error {
            Some(cause) => error!(task = task.as_str(), cause = %cause, "all providers exhausted"),
            None => error!(task = task.as_str(), "all providers exhausted: chain is empty"),
        }
        Err(GatewayError::Exhausted)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
