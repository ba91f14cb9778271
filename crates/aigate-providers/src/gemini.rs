//! Native Gemini adapter (`models/{model}:generateContent`).
//!
//! System turns become `systemInstruction`; assistant turns use role `model`;
//! an image attachment rides on the last user turn as `inlineData`.

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use aigate_core::config::schema::ProviderConfig;
use aigate_core::types::{Attachment, Completion, Role, Turn};

use crate::credentials::Credential;
use crate::error::ProviderError;
use crate::http_provider::build_extra_headers;
use crate::registry::ProviderSpec;
use crate::traits::{context_window, LlmRequestConfig, ProviderAdapter};

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: u32,
}

fn text_part(text: impl Into<String>) -> Part {
    Part {
        text: Some(text.into()),
        inline_data: None,
    }
}

// ─────────────────────────────────────────────
// GeminiProvider
// ─────────────────────────────────────────────

pub struct GeminiProvider {
    client: reqwest::Client,
    api_base: String,
    extra_headers: HeaderMap,
    request: LlmRequestConfig,
    spec: &'static ProviderSpec,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GeminiProvider {
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

        Ok(GeminiProvider {
            client,
            api_base,
            extra_headers: build_extra_headers(config),
            request,
            spec,
        })
    }

    fn generate_url(&self, model: &str) -> String {
        let base = self.api_base.trim_end_matches('/');
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{base}/models/{model}:generateContent")
    }

    fn build_request(
        &self,
        turns: &[Turn],
        attachment: Option<&Attachment>,
    ) -> GenerateContentRequest {
        let system: Vec<&str> = turns
            .iter()
            .filter(|t| t.role == Role::System)
            .map(|t| t.text.as_str())
            .collect();
        let system_instruction = (!system.is_empty()).then(|| Content {
            role: None,
            parts: vec![text_part(system.join("\n\n"))],
        });

        let mut contents: Vec<Content> = turns
            .iter()
            .filter(|t| t.role != Role::System)
            .map(|t| {
                let role = match t.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                Content {
                    role: Some(role.to_string()),
                    parts: vec![text_part(&t.text)],
                }
            })
            .collect();

        if let Some(attachment) = attachment {
            let image = Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: attachment.mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(&attachment.data),
                }),
            };
            match contents
                .iter_mut()
                .rev()
                .find(|c| c.role.as_deref() == Some("user"))
            {
                Some(last_user) => last_user.parts.push(image),
                None => contents.push(Content {
                    role: Some("user".into()),
                    parts: vec![image],
                }),
            }
        }

        GenerateContentRequest {
            system_instruction,
            contents,
            generation_config: GenerationConfig {
                max_output_tokens: self.request.max_tokens,
                temperature: self.request.temperature,
            },
        }
    }
}

#[async_trait]
impl ProviderAdapter for GeminiProvider {
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

        let response = self
            .client
            .post(self.generate_url(model))
            .header("x-goog-api-key", credential.secret())
            .headers(self.extra_headers.clone())
            .json(&self.build_request(&turns, attachment))
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

        let body: GenerateContentResponse = response.json().await?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(Completion {
            text,
            tokens: body.usage_metadata.map_or(0, |u| u.total_token_count),
        })
    }

    fn provider(&self) -> &str {
        self.spec.name
    }

    fn display_name(&self) -> &str {
        self.spec.display_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::find_by_name;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(api_base: &str) -> GeminiProvider {
        let config = ProviderConfig {
            api_base: Some(api_base.to_string()),
            ..Default::default()
        };
        GeminiProvider::new(
            &config,
            find_by_name("gemini").unwrap(),
            LlmRequestConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_generate_url() {
        let provider = provider("https://generativelanguage.googleapis.com/v1beta/");
        assert_eq!(
            provider.generate_url("models/gemini-2.0-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_request_shape() {
        let provider = provider("http://unused");
        let turns = vec![
            Turn::system("You are a historian."),
            Turn::user("Who built it?"),
            Turn::assistant("The Romans."),
            Turn::user("When?"),
        ];
        let attachment = Attachment::new(vec![1, 2, 3], "image/webp");
        let request = provider.build_request(&turns, Some(&attachment));
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"],
            "You are a historian."
        );
        assert_eq!(json["contents"].as_array().unwrap().len(), 3);
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][2]["parts"][0]["text"], "When?");
        assert_eq!(
            json["contents"][2]["parts"][1]["inlineData"]["mimeType"],
            "image/webp"
        );
        assert_eq!(json["contents"][2]["parts"][1]["inlineData"]["data"], "AQID");
        assert!(json["generationConfig"].get("maxOutputTokens").is_some());
    }

    #[tokio::test]
    async fn test_send_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "AIza-test"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{ "role": "user", "parts": [{ "text": "Hello" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [{ "text": "Hi " }, { "text": "there." }]
                    },
                    "finishReason": "STOP"
                }],
                "usageMetadata": {
                    "promptTokenCount": 3,
                    "candidatesTokenCount": 4,
                    "totalTokenCount": 7
                }
            })))
            .mount(&mock_server)
            .await;

        let provider = provider(&mock_server.uri());
        let completion = provider
            .send(
                "gemini-2.0-flash",
                &[Turn::user("Hello")],
                &Credential::new("AIza-test"),
                None,
            )
            .await
            .unwrap();

        assert_eq!(completion.text, "Hi there.");
        assert_eq!(completion.tokens, 7);
    }

    #[tokio::test]
    async fn test_send_resource_exhausted() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {
                    "code": 429,
                    "message": "Resource has been exhausted (e.g. check quota).",
                    "status": "RESOURCE_EXHAUSTED"
                }
            })))
            .mount(&mock_server)
            .await;

        let provider = provider(&mock_server.uri());
        let err = provider
            .send("gemini-2.0-flash", &[Turn::user("hi")], &Credential::new("k"), None)
            .await
            .unwrap_err();

        match err {
            ProviderError::Http { status, code, .. } => {
                assert_eq!(status, 429);
                assert_eq!(code.as_deref(), Some("RESOURCE_EXHAUSTED"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_blocked_candidate_is_empty() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "finishReason": "SAFETY" }]
            })))
            .mount(&mock_server)
            .await;

        let provider = provider(&mock_server.uri());
        let err = provider
            .send("gemini-2.0-flash", &[Turn::user("hi")], &Credential::new("k"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse));
    }
}
