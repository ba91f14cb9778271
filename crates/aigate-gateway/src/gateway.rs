//! The gateway facade: one "ask an AI" call for every feature.
//!
//! A call runs these steps in order:
//! 1. Resolve the image, if any. URLs go through the SSRF-guarded fetcher.
//! 2. Trim history to the last `limits.maxTurns` turns and put the caller's
//!    instruction in front.
//! 3. Build grounding context from the last user turn.
//! 4. Hand the envelope to the fallback executor.
//!
//! Failures at any step come back as a user-safe [`AskResponse`]. Nothing
//! here returns an error to the caller.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use aigate_core::config::schema::{Config, LimitsConfig};
use aigate_core::error::GatewayError;
use aigate_core::types::{
    trailing_window, Attachment, GatewayResult, RequestEnvelope, Role, TaskType, Turn,
};
use aigate_core::utils::expand_home;
use aigate_providers::{
    build_adapters, CredentialPools, ErrorClassifier, FallbackChains, FallbackExecutor,
    LlmRequestConfig, MemoryCooldownStore, RotationTracker,
};

use crate::context::GroundingAssembler;
use crate::guard::{image_mime, ResourceFetcher};
use crate::repository::{ContentRepository, FileContentRepository};
use crate::web::{BraveSearch, WebSearch};

// ─────────────────────────────────────────────
// Request / response
// ─────────────────────────────────────────────

/// Where a request's image comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSource {
    /// Raw bytes supplied by the caller.
    Bytes { data: Vec<u8>, mime_type: String },
    /// A remote image, fetched through the SSRF gate.
    Url(String),
}

#[derive(Clone, Debug)]
pub struct AskRequest {
    /// Conversation so far, oldest first, ending with the user's question.
    pub turns: Vec<Turn>,
    /// System instruction placed before the conversation.
    pub instruction: Option<String>,
    pub task_type: TaskType,
    pub image: Option<ImageSource>,
    /// Allow web search when internal content has nothing.
    pub web_grounding: bool,
    /// Look up grounding context at all.
    pub grounding: bool,
}

impl AskRequest {
    pub fn new(turns: Vec<Turn>) -> Self {
        AskRequest {
            turns,
            instruction: None,
            task_type: TaskType::Chat,
            image: None,
            web_grounding: false,
            grounding: true,
        }
    }

    /// A single-question request.
    pub fn question(text: impl Into<String>) -> Self {
        Self::new(vec![Turn::user(text)])
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn with_task(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_image(mut self, image: ImageSource) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_web_grounding(mut self, enabled: bool) -> Self {
        self.web_grounding = enabled;
        self
    }

    pub fn without_grounding(mut self) -> Self {
        self.grounding = false;
        self
    }

    /// Text of the last user turn, used as the grounding query.
    fn last_user_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct AskResponse {
    pub success: bool,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub tokens: u32,
}

impl AskResponse {
    fn failure(err: &GatewayError) -> Self {
        AskResponse {
            success: false,
            text: err.user_message().to_string(),
            ..Default::default()
        }
    }
}

impl From<GatewayResult> for AskResponse {
    fn from(result: GatewayResult) -> Self {
        AskResponse {
            success: result.success,
            text: result.text,
            provider: result.provider,
            model: result.model,
            tokens: result.tokens,
        }
    }
}

// ─────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────

pub struct Gateway {
    executor: FallbackExecutor,
    grounding: GroundingAssembler,
    fetcher: ResourceFetcher,
    max_turns: usize,
    max_image_bytes: usize,
}

impl Gateway {
    pub fn new(
        executor: FallbackExecutor,
        grounding: GroundingAssembler,
        fetcher: ResourceFetcher,
        limits: &LimitsConfig,
    ) -> Self {
        Gateway {
            executor,
            grounding,
            fetcher,
            max_turns: limits.max_turns,
            max_image_bytes: limits.max_image_bytes,
        }
    }

    /// Wire up a gateway from configuration.
    ///
    /// Rotation state lives in process memory. A missing content file or Brave
    /// key disables that grounding source; a content file that exists but
    /// cannot be read is an error.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let pools = CredentialPools::from_config(&config.providers);
        let tracker = Arc::new(RotationTracker::new(
            pools,
            Arc::new(MemoryCooldownStore::new()),
            &config.rate_limit,
        ));

        let request = LlmRequestConfig {
            timeout: std::time::Duration::from_secs(config.timeouts.text_secs),
            ..Default::default()
        };
        let adapters = build_adapters(&config.providers, &request)?;
        let executor = FallbackExecutor::new(
            FallbackChains::from_config(&config.chains),
            adapters,
            tracker,
            ErrorClassifier::from_config(&config.classifier),
        );

        let repository: Option<Arc<dyn ContentRepository>> =
            match config.grounding.content_file.as_deref() {
                Some(path) => Some(Arc::new(FileContentRepository::from_path(&expand_home(
                    path,
                ))?)),
                None => None,
            };

        let brave = BraveSearch::new(&config.tools.web.search, request.timeout)?;
        let web: Option<Arc<dyn WebSearch>> = if brave.is_configured() {
            Some(Arc::new(brave))
        } else {
            None
        };

        let grounding = GroundingAssembler::new(repository, web, &config.grounding);
        let fetcher = ResourceFetcher::new(
            std::time::Duration::from_secs(config.timeouts.fetch_secs),
            config.limits.max_image_bytes,
        )?;

        Ok(Self::new(executor, grounding, fetcher, &config.limits))
    }

    pub fn executor(&self) -> &FallbackExecutor {
        &self.executor
    }

    pub fn grounding(&self) -> &GroundingAssembler {
        &self.grounding
    }

    pub async fn ask(&self, request: AskRequest) -> AskResponse {
        self.ask_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Like [`ask`](Self::ask), but gives up as soon as `cancel` fires.
    pub async fn ask_with_cancel(
        &self,
        request: AskRequest,
        cancel: &CancellationToken,
    ) -> AskResponse {
        let attachment = match &request.image {
            None => None,
            Some(image) => {
                let resolved = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(GatewayError::Cancelled),
                    res = self.resolve_image(image) => res,
                };
                match resolved {
                    Ok(attachment) => Some(attachment),
                    Err(err) => {
                        warn!(error = %err, "image rejected, request not dispatched");
                        return AskResponse::failure(&err);
                    }
                }
            }
        };

        let mut turns = trailing_window(&request.turns, self.max_turns);
        if let Some(instruction) = request.instruction.as_deref() {
            if !instruction.trim().is_empty() {
                turns.insert(0, Turn::system(instruction));
            }
        }

        let context = match request.last_user_text() {
            Some(query) if request.grounding => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return AskResponse::failure(&GatewayError::Cancelled);
                    }
                    context = self.grounding.build_context(query, request.web_grounding) => context,
                }
            }
            _ => String::new(),
        };

        debug!(
            task = request.task_type.as_str(),
            turns = turns.len(),
            grounded = !context.is_empty(),
            image = attachment.is_some(),
            "dispatching"
        );

        let mut envelope = RequestEnvelope::new(turns, request.task_type).with_context(context);
        if let Some(attachment) = attachment {
            envelope = envelope.with_attachment(attachment);
        }

        let result = self.executor.execute_with_cancel(&envelope, cancel).await;
        if !result.success {
            info!(task = request.task_type.as_str(), "request failed");
        }
        result.into()
    }

    async fn resolve_image(&self, image: &ImageSource) -> Result<Attachment, GatewayError> {
        match image {
            ImageSource::Bytes { data, mime_type } => {
                if data.is_empty() {
                    return Err(GatewayError::FetchFailed("empty inline image".into()));
                }
                if data.len() > self.max_image_bytes {
                    return Err(GatewayError::FetchFailed(format!(
                        "inline image of {} bytes exceeds {}",
                        data.len(),
                        self.max_image_bytes
                    )));
                }
                let mime_type = image_mime(mime_type).ok_or_else(|| {
                    GatewayError::FetchFailed(format!("inline data is not an image ({mime_type})"))
                })?;
                Ok(Attachment::new(data.clone(), mime_type))
            }
            ImageSource::Url(url) => self.fetcher.fetch(url).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use aigate_core::config::schema::{ChainsConfig, GroundingConfig, RateLimitConfig};
    use aigate_core::error::{EXHAUSTED_MESSAGE, FETCH_FAILED_MESSAGE, UNSAFE_RESOURCE_MESSAGE};
    use aigate_core::types::Completion;
    use aigate_providers::{Credential, CredentialPool, ProviderAdapter, ProviderError};

    use crate::repository::{ContentCategory, StoredItem};

    #[derive(Debug, Clone)]
    struct Seen {
        model: String,
        turns: Vec<Turn>,
        image: Option<String>,
    }

    #[derive(Default)]
    struct RecordingAdapter {
        seen: Mutex<Vec<Seen>>,
    }

    #[async_trait]
    impl ProviderAdapter for RecordingAdapter {
        async fn send(
            &self,
            model: &str,
            turns: &[Turn],
            _credential: &Credential,
            attachment: Option<&Attachment>,
        ) -> Result<Completion, ProviderError> {
            self.seen.lock().unwrap().push(Seen {
                model: model.to_string(),
                turns: turns.to_vec(),
                image: attachment.map(|a| a.mime_type.clone()),
            });
            Ok(Completion {
                text: "answer".into(),
                tokens: 12,
            })
        }

        fn provider(&self) -> &str {
            "groq"
        }

        fn display_name(&self) -> &str {
            "Groq"
        }
    }

    fn gateway_with(
        adapter: Arc<RecordingAdapter>,
        repository: Option<Arc<dyn ContentRepository>>,
    ) -> Gateway {
        let mut pools = CredentialPools::new();
        pools.insert(CredentialPool::new("groq", &["k1".to_string()]));
        let tracker = Arc::new(RotationTracker::new(
            pools,
            Arc::new(MemoryCooldownStore::new()),
            &RateLimitConfig::default(),
        ));

        let mut adapters: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
        adapters.insert("groq".into(), adapter);

        let executor = FallbackExecutor::new(
            FallbackChains::from_config(&ChainsConfig::default()),
            adapters,
            tracker,
            ErrorClassifier::default(),
        );
        let grounding = GroundingAssembler::new(repository, None, &GroundingConfig::default());
        let fetcher = ResourceFetcher::new(Duration::from_secs(2), 1024).unwrap();
        let limits = LimitsConfig {
            max_turns: 4,
            max_image_bytes: 1024,
        };
        Gateway::new(executor, grounding, fetcher, &limits)
    }

    #[tokio::test]
    async fn test_plain_question_is_served() {
        let adapter = Arc::new(RecordingAdapter::default());
        let gateway = gateway_with(adapter.clone(), None);

        let response = gateway
            .ask(AskRequest::question("hello").with_instruction("Be brief."))
            .await;

        assert!(response.success);
        assert_eq!(response.text, "answer");
        assert_eq!(response.provider.as_deref(), Some("groq"));
        assert_eq!(response.model.as_deref(), Some("llama-3.3-70b-versatile"));
        assert_eq!(response.tokens, 12);

        let seen = adapter.seen.lock().unwrap();
        assert_eq!(seen[0].turns, vec![Turn::system("Be brief."), Turn::user("hello")]);
    }

    #[tokio::test]
    async fn test_unsafe_image_url_never_dispatched() {
        let adapter = Arc::new(RecordingAdapter::default());
        let gateway = gateway_with(adapter.clone(), None);

        let response = gateway
            .ask(
                AskRequest::question("what is this?")
                    .with_image(ImageSource::Url("http://169.254.169.254/latest".into())),
            )
            .await;

        assert!(!response.success);
        assert_eq!(response.text, UNSAFE_RESOURCE_MESSAGE);
        assert!(adapter.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inline_image_goes_to_vision_model() {
        let adapter = Arc::new(RecordingAdapter::default());
        let gateway = gateway_with(adapter.clone(), None);

        let response = gateway
            .ask(AskRequest::question("describe").with_image(ImageSource::Bytes {
                data: vec![1, 2, 3],
                mime_type: "image/png".into(),
            }))
            .await;

        assert!(response.success);
        let seen = adapter.seen.lock().unwrap();
        assert_eq!(seen[0].model, "meta-llama/llama-4-scout-17b-16e-instruct");
        assert_eq!(seen[0].image.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_oversized_inline_image_rejected() {
        let adapter = Arc::new(RecordingAdapter::default());
        let gateway = gateway_with(adapter.clone(), None);

        let response = gateway
            .ask(AskRequest::question("describe").with_image(ImageSource::Bytes {
                data: vec![0; 4096],
                mime_type: "image/png".into(),
            }))
            .await;

        assert!(!response.success);
        assert_eq!(response.text, FETCH_FAILED_MESSAGE);
        assert!(adapter.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inline_non_image_rejected() {
        let adapter = Arc::new(RecordingAdapter::default());
        let gateway = gateway_with(adapter.clone(), None);

        let response = gateway
            .ask(AskRequest::question("describe").with_image(ImageSource::Bytes {
                data: b"<html></html>".to_vec(),
                mime_type: "text/html".into(),
            }))
            .await;

        assert!(!response.success);
        assert_eq!(response.text, FETCH_FAILED_MESSAGE);
        assert!(adapter.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_trimmed_to_limit() {
        let adapter = Arc::new(RecordingAdapter::default());
        let gateway = gateway_with(adapter.clone(), None);

        let turns: Vec<Turn> = (0..9)
            .map(|i| {
                if i % 2 == 0 {
                    Turn::user(format!("q{i}"))
                } else {
                    Turn::assistant(format!("a{i}"))
                }
            })
            .collect();
        gateway
            .ask(AskRequest::new(turns).with_instruction("rules"))
            .await;

        let seen = adapter.seen.lock().unwrap();
        let sent = &seen[0].turns;
        assert_eq!(sent.len(), 5);
        assert_eq!(sent[0], Turn::system("rules"));
        assert_eq!(sent[1].text, "a5");
        assert_eq!(sent[4].text, "q8");
    }

    #[tokio::test]
    async fn test_grounding_merged_into_instruction() {
        let adapter = Arc::new(RecordingAdapter::default());
        let repository = FileContentRepository::from_items(vec![StoredItem {
            category: Some(ContentCategory::Archive),
            title: "Harbour charter".into(),
            description: "Granted in 1820".into(),
            path: Some("/archive/harbour".into()),
            approved: true,
            ..Default::default()
        }]);
        let gateway = gateway_with(adapter.clone(), Some(Arc::new(repository)));

        gateway
            .ask(AskRequest::question("when was the harbour built?").with_instruction("Cite sources."))
            .await;
        gateway
            .ask(AskRequest::question("when was the harbour built?").without_grounding())
            .await;

        let seen = adapter.seen.lock().unwrap();
        let system = &seen[0].turns[0];
        assert_eq!(system.role, Role::System);
        assert!(system.text.starts_with("Cite sources."));
        assert!(system.text.contains("Harbour charter"));
        assert!(system.text.contains("https://example.org/archive/harbour"));

        assert_eq!(seen[1].turns, vec![Turn::user("when was the harbour built?")]);
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let adapter = Arc::new(RecordingAdapter::default());
        let gateway = gateway_with(adapter.clone(), None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let response = gateway
            .ask_with_cancel(AskRequest::question("hi"), &cancel)
            .await;
        assert!(!response.success);
        assert!(adapter.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_from_config_without_credentials_exhausts() {
        let gateway = Gateway::from_config(&Config::default()).unwrap();
        assert!(!gateway.grounding().has_repository());
        assert!(!gateway.grounding().has_web());

        let response = gateway.ask(AskRequest::question("hi")).await;
        assert!(!response.success);
        assert_eq!(response.text, EXHAUSTED_MESSAGE);
    }

    #[test]
    fn test_from_config_missing_content_file_is_error() {
        let mut config = Config::default();
        config.grounding.content_file = Some("/nonexistent/aigate/content.json".into());
        assert!(Gateway::from_config(&config).is_err());
    }

    #[test]
    fn test_response_serialization_omits_missing_provider() {
        let json = serde_json::to_value(AskResponse::from(GatewayResult::failure("busy"))).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "text": "busy", "tokens": 0}));
    }
}
