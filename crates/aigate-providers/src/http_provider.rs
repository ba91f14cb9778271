//! Adapter for OpenAI-compatible `/chat/completions` APIs.
//!
//! Covers: Groq, OpenAI, OpenRouter, DeepSeek.

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

use aigate_core::config::schema::ProviderConfig;
use aigate_core::types::{
    Attachment, ChatCompletionRequest, ChatCompletionResponse, Completion, ContentPart, ImageUrl,
    Message, Role, Turn,
};

use crate::credentials::Credential;
use crate::error::ProviderError;
use crate::registry::ProviderSpec;
use crate::traits::{context_window, LlmRequestConfig, ProviderAdapter};

// ─────────────────────────────────────────────
// HttpProvider
// ─────────────────────────────────────────────

/// A provider adapter for any OpenAI-compatible HTTP API.
pub struct HttpProvider {
    /// HTTP client (shared, connection-pooled). Carries the request timeout.
    client: reqwest::Client,
    /// API base URL (e.g. `"https://api.groq.com/openai/v1"`).
    api_base: String,
    /// Extra headers to send with each request (e.g. OpenRouter `X-Title`).
    extra_headers: HeaderMap,
    request: LlmRequestConfig,
    spec: &'static ProviderSpec,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("api_base", &self.api_base)
            .field("provider", &self.spec.display_name)
            .finish()
    }
}

impl HttpProvider {
    /// Create an adapter from the provider's config section and registry spec.
    ///
    /// The API base resolves as: config > registry default.
    pub fn new(
        config: &ProviderConfig,
        spec: &'static ProviderSpec,
        request: LlmRequestConfig,
    ) -> anyhow::Result<Self> {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| spec.default_api_base.to_string());

        let client = reqwest::Client::builder()
            .timeout(request.timeout)
            .build()?;

        Ok(HttpProvider {
            client,
            api_base,
            extra_headers: build_extra_headers(config),
            request,
            spec,
        })
    }

    /// Build the full chat completions URL.
    fn completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }
}

/// Turn the configured header map into a `HeaderMap`, dropping invalid entries.
pub(crate) fn build_extra_headers(config: &ProviderConfig) -> HeaderMap {
    let mut extra_headers = HeaderMap::new();
    if let Some(ref headers) = config.extra_headers {
        for (key, value) in headers {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(val)) => {
                    extra_headers.insert(name, val);
                }
                _ => warn!(header = %key, "ignoring invalid extra header"),
            }
        }
    }
    extra_headers
}

/// Build the OpenAI message list, attaching the image to the last user turn.
///
/// When there is no user turn the image goes out as its own user message.
fn build_messages(turns: &[Turn], attachment: Option<&Attachment>) -> Vec<Message> {
    let mut messages: Vec<Message> = turns.iter().map(Message::from).collect();

    let Some(attachment) = attachment else {
        return messages;
    };

    let image = ContentPart::ImageUrl {
        image_url: ImageUrl {
            url: data_uri(attachment),
            detail: None,
        },
    };

    match turns.iter().rposition(|t| t.role == Role::User) {
        Some(idx) => {
            messages[idx] = Message::user_parts(vec![
                ContentPart::Text {
                    text: turns[idx].text.clone(),
                },
                image,
            ]);
        }
        None => messages.push(Message::user_parts(vec![image])),
    }
    messages
}

fn data_uri(attachment: &Attachment) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(&attachment.data);
    format!("data:{};base64,{}", attachment.mime_type, encoded)
}

#[async_trait]
impl ProviderAdapter for HttpProvider {
    async fn send(
        &self,
        model: &str,
        turns: &[Turn],
        credential: &Credential,
        attachment: Option<&Attachment>,
    ) -> Result<Completion, ProviderError> {
        let turns = context_window(turns);

        debug!(
            provider = self.spec.name,
            model,
            credential = %credential.fingerprint(),
            turns = turns.len(),
            image = attachment.is_some(),
            "calling provider"
        );

        let request_body = ChatCompletionRequest {
            model: model.to_string(),
            messages: build_messages(&turns, attachment),
            max_tokens: Some(self.request.max_tokens),
            temperature: Some(self.request.temperature),
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(credential.secret())
            .headers(self.extra_headers.clone())
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            debug!(
                provider = self.spec.name,
                model,
                status = status.as_u16(),
                "provider returned an error status"
            );
            return Err(ProviderError::from_response(status.as_u16(), &headers, &body));
        }

        let body: ChatCompletionResponse = response.json().await?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)?;

        Ok(Completion {
            text,
            tokens: body.usage.map_or(0, |u| u.total_tokens),
        })
    }

    fn provider(&self) -> &str {
        self.spec.name
    }

    fn display_name(&self) -> &str {
        self.spec.display_name
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::find_by_name;
    use aigate_core::types::MessageContent;
    use std::collections::HashMap;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_config(api_base: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            api_base: api_base.map(String::from),
            ..Default::default()
        }
    }

    fn provider(name: &str, api_base: Option<&str>) -> HttpProvider {
        let spec = find_by_name(name).unwrap();
        HttpProvider::new(&make_config(api_base), spec, LlmRequestConfig::default()).unwrap()
    }

    // ── Unit tests ──

    #[test]
    fn test_completions_url_trailing_slash() {
        let provider = provider("openai", Some("https://api.openai.com/v1/"));
        assert_eq!(
            provider.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_default_api_base() {
        let provider = provider("groq", None);
        assert_eq!(
            provider.completions_url(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_extra_headers() {
        let mut headers = HashMap::new();
        headers.insert("X-Title".to_string(), "aigate".to_string());
        headers.insert("bad header".to_string(), "x".to_string());
        let config = ProviderConfig {
            extra_headers: Some(headers),
            ..Default::default()
        };
        let built = build_extra_headers(&config);
        assert!(built.contains_key("x-title"));
        assert_eq!(built.len(), 1);
    }

    #[test]
    fn test_image_attached_to_last_user_turn() {
        let turns = vec![
            Turn::system("be brief"),
            Turn::user("first"),
            Turn::assistant("ok"),
            Turn::user("what is this?"),
        ];
        let attachment = Attachment::new(vec![1, 2, 3], "image/png");
        let messages = build_messages(&turns, Some(&attachment));

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1], Message::user("first"));
        match &messages[3] {
            Message::User {
                content: MessageContent::Parts(parts),
            } => {
                assert_eq!(
                    parts[0],
                    ContentPart::Text {
                        text: "what is this?".into()
                    }
                );
                match &parts[1] {
                    ContentPart::ImageUrl { image_url } => {
                        assert_eq!(image_url.url, "data:image/png;base64,AQID");
                    }
                    other => panic!("expected image part, got {other:?}"),
                }
            }
            other => panic!("expected multipart user message, got {other:?}"),
        }
    }

    #[test]
    fn test_image_without_user_turn() {
        let attachment = Attachment::new(vec![0xff], "image/jpeg");
        let messages = build_messages(&[Turn::system("describe")], Some(&attachment));
        assert_eq!(messages.len(), 2);
        assert!(matches!(
            &messages[1],
            Message::User {
                content: MessageContent::Parts(_)
            }
        ));
    }

    // ── Integration tests with mock server ──

    #[tokio::test]
    async fn test_send_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer gsk-test-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-test",
                "choices": [{
                    "message": { "content": "The treaty was signed in 1648." },
                    "finish_reason": "stop"
                }],
                "usage": {
                    "prompt_tokens": 10,
                    "completion_tokens": 5,
                    "total_tokens": 15
                }
            })))
            .mount(&mock_server)
            .await;

        let provider = provider("groq", Some(&mock_server.uri()));
        let completion = provider
            .send(
                "llama-3.3-70b-versatile",
                &[Turn::user("When was Westphalia signed?")],
                &Credential::new("gsk-test-1"),
                None,
            )
            .await
            .unwrap();

        assert_eq!(completion.text, "The treaty was signed in 1648.");
        assert_eq!(completion.tokens, 15);
    }

    #[tokio::test]
    async fn test_send_sends_trimmed_history() {
        let mock_server = MockServer::start().await;

        let expected: Vec<serde_json::Value> = (5..15)
            .map(|i| serde_json::json!({ "role": "user", "content": format!("q{i}") }))
            .collect();

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": expected,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "ok" } }]
            })))
            .mount(&mock_server)
            .await;

        let provider = provider("openai", Some(&mock_server.uri()));
        let turns: Vec<Turn> = (0..15).map(|i| Turn::user(format!("q{i}"))).collect();
        let completion = provider
            .send("gpt-4o-mini", &turns, &Credential::new("k"), None)
            .await
            .unwrap();

        // If the body matcher fails, wiremock returns 404 → we'd get an error
        assert_eq!(completion.text, "ok");
        assert_eq!(completion.tokens, 0);
    }

    #[tokio::test]
    async fn test_send_rate_limited() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "12")
                    .set_body_json(serde_json::json!({
                        "error": {
                            "message": "Rate limit reached",
                            "type": "requests",
                            "code": "rate_limit_exceeded"
                        }
                    })),
            )
            .mount(&mock_server)
            .await;

        let provider = provider("groq", Some(&mock_server.uri()));
        let err = provider
            .send("llama", &[Turn::user("hi")], &Credential::new("k"), None)
            .await
            .unwrap_err();

        match err {
            ProviderError::Http {
                status,
                code,
                retry_after,
                ..
            } => {
                assert_eq!(status, 429);
                assert_eq!(code.as_deref(), Some("rate_limit_exceeded"));
                assert_eq!(retry_after, Some(Duration::from_secs(12)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_network_error() {
        // Point to a port that's not listening
        let provider = provider("openai", Some("http://127.0.0.1:1"));
        let err = provider
            .send("gpt-4o", &[Turn::user("hi")], &Credential::new("k"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_send_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(serde_json::json!({
                        "choices": [{ "message": { "content": "late" } }]
                    })),
            )
            .mount(&mock_server)
            .await;

        let spec = find_by_name("openai").unwrap();
        let request = LlmRequestConfig {
            timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let provider =
            HttpProvider::new(&make_config(Some(&mock_server.uri())), spec, request).unwrap();

        let err = provider
            .send("gpt-4o", &[Turn::user("hi")], &Credential::new("k"), None)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_send_empty_content() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": null } }]
            })))
            .mount(&mock_server)
            .await;

        let provider = provider("deepseek", Some(&mock_server.uri()));
        let err = provider
            .send("deepseek-chat", &[Turn::user("hi")], &Credential::new("k"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_send_malformed_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let provider = provider("openrouter", Some(&mock_server.uri()));
        let err = provider
            .send("some/model", &[Turn::user("hi")], &Credential::new("k"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }
}
