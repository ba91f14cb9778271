//! Core types for aigate.
//!
//! Two layers live here:
//! - the canonical request/response shapes every caller and adapter agree on
//!   ([`Turn`], [`RequestEnvelope`], [`Completion`], [`GatewayResult`])
//! - the OpenAI chat-completions wire format used by OpenAI-compatible
//!   providers ([`Message`], [`ChatCompletionRequest`], [`ChatCompletionResponse`])

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Canonical conversation turns
// ─────────────────────────────────────────────

/// Who authored a turn.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One prior turn of a conversation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn system(text: impl Into<String>) -> Self {
        Turn {
            role: Role::System,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Turn {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Turn {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Keep leading system turns plus the last `max_turns` conversational turns.
///
/// System instructions are never dropped; everything else is a sliding window.
pub fn trailing_window(turns: &[Turn], max_turns: usize) -> Vec<Turn> {
    let (system, rest): (Vec<&Turn>, Vec<&Turn>) =
        turns.iter().partition(|t| t.role == Role::System);
    let skip = rest.len().saturating_sub(max_turns);
    system
        .into_iter()
        .chain(rest.into_iter().skip(skip))
        .cloned()
        .collect()
}

/// Which kind of work a request is; selects the fallback chain.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[default]
    Chat,
    Analysis,
    Title,
    Vision,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Chat => "chat",
            TaskType::Analysis => "analysis",
            TaskType::Title => "title",
            TaskType::Vision => "vision",
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chat" => Ok(TaskType::Chat),
            "analysis" => Ok(TaskType::Analysis),
            "title" => Ok(TaskType::Title),
            "vision" => Ok(TaskType::Vision),
            other => Err(format!(
                "unknown task type '{other}' (expected chat, analysis, title, or vision)"
            )),
        }
    }
}

/// Binary attachment sent alongside the last user turn (images only).
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl Attachment {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Attachment {
            data,
            mime_type: mime_type.into(),
        }
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

// ─────────────────────────────────────────────
// Request envelope
// ─────────────────────────────────────────────

/// Canonical internal representation of one call into the gateway.
///
/// Created per caller invocation and dropped once the call returns.
#[derive(Clone, Debug, Default)]
pub struct RequestEnvelope {
    /// Prior turns in order, including any system instructions.
    pub turns: Vec<Turn>,
    /// Grounding context appended to the system instructions before dispatch.
    pub context: Option<String>,
    /// Optional image sent with the last user turn.
    pub attachment: Option<Attachment>,
    /// Selects which fallback chain to walk.
    pub task_type: TaskType,
}

impl RequestEnvelope {
    pub fn new(turns: Vec<Turn>, task_type: TaskType) -> Self {
        RequestEnvelope {
            turns,
            task_type,
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.context = if context.trim().is_empty() {
            None
        } else {
            Some(context)
        };
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Turns as they should be sent upstream: grounding context is merged into
    /// the first system turn (or becomes one if there is none).
    pub fn dispatch_turns(&self) -> Vec<Turn> {
        let Some(context) = self.context.as_deref() else {
            return self.turns.clone();
        };

        let grounding = format!("Relevant context:\n{context}");
        let mut turns = self.turns.clone();
        match turns.iter_mut().find(|t| t.role == Role::System) {
            Some(system) => {
                system.text = format!("{}\n\n{grounding}", system.text);
            }
            None => turns.insert(0, Turn::system(grounding)),
        }
        turns
    }
}

// ─────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────

/// A successful provider reply, before it is attributed to a chain link.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Total tokens reported by the provider; 0 when it does not report usage.
    pub tokens: u32,
}

/// Outcome of one gateway call.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct GatewayResult {
    pub success: bool,
    /// Response text on success, a user-safe message otherwise.
    pub text: String,
    /// Provider that served the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Model that served the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub tokens: u32,
}

impl GatewayResult {
    pub fn success(
        completion: Completion,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        GatewayResult {
            success: true,
            text: completion.text,
            provider: Some(provider.into()),
            model: Some(model.into()),
            tokens: completion.tokens,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        GatewayResult {
            success: false,
            text: message.into(),
            ..Default::default()
        }
    }
}

// ─────────────────────────────────────────────
// OpenAI chat completions wire format
// ─────────────────────────────────────────────

/// A chat message in the OpenAI format.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role")]
pub enum Message {
    #[serde(rename = "system")]
    System { content: String },

    #[serde(rename = "user")]
    User { content: MessageContent },

    #[serde(rename = "assistant")]
    Assistant { content: String },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: MessageContent::Text(content.into()),
        }
    }

    /// User message with multipart content (text + images).
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Message::User {
            content: MessageContent::Parts(parts),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
        }
    }
}

impl From<&Turn> for Message {
    fn from(turn: &Turn) -> Self {
        match turn.role {
            Role::System => Message::system(&turn.text),
            Role::User => Message::user(&turn.text),
            Role::Assistant => Message::assistant(&turn.text),
        }
    }
}

/// User message content: either plain text or multipart (for vision).
///
/// Text serializes as a plain string, parts as an array of objects.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A single part of a multipart message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    /// Image URL part (a base64 data URI when built from an attachment).
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

/// Image URL payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Token usage statistics from an OpenAI-compatible API.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct UsageInfo {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Request body for an OpenAI-compatible chat completion API.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Raw chat completion response from an OpenAI-compatible API.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<UsageInfo>,
}

/// A single choice in a chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: AssistantMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The assistant message within a chat completion choice.
#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trailing_window_keeps_system_and_last_turns() {
        let mut turns = vec![Turn::system("be brief")];
        for i in 0..14 {
            turns.push(Turn::user(format!("q{i}")));
        }

        let window = trailing_window(&turns, 10);
        assert_eq!(window.len(), 11);
        assert_eq!(window[0], Turn::system("be brief"));
        assert_eq!(window[1].text, "q4");
        assert_eq!(window[10].text, "q13");
    }

    #[test]
    fn test_trailing_window_short_history_untouched() {
        let turns = vec![Turn::user("hi"), Turn::assistant("hello")];
        assert_eq!(trailing_window(&turns, 10), turns);
    }

    #[test]
    fn test_dispatch_turns_merges_context_into_system() {
        let envelope = RequestEnvelope::new(
            vec![Turn::system("You are helpful."), Turn::user("Who built the bridge?")],
            TaskType::Chat,
        )
        .with_context("- [Archive] Bridge records (https://example.org/a/1)");

        let turns = envelope.dispatch_turns();
        assert_eq!(turns.len(), 2);
        assert!(turns[0].text.starts_with("You are helpful."));
        assert!(turns[0].text.contains("Relevant context:"));
        assert!(turns[0].text.contains("Bridge records"));
    }

    #[test]
    fn test_dispatch_turns_inserts_system_when_missing() {
        let envelope = RequestEnvelope::new(vec![Turn::user("hi")], TaskType::Chat)
            .with_context("some facts");
        let turns = envelope.dispatch_turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::System);
        assert_eq!(turns[1], Turn::user("hi"));
    }

    #[test]
    fn test_blank_context_is_dropped() {
        let envelope = RequestEnvelope::new(vec![Turn::user("hi")], TaskType::Chat)
            .with_context("   ");
        assert!(envelope.context.is_none());
        assert_eq!(envelope.dispatch_turns(), vec![Turn::user("hi")]);
    }

    #[test]
    fn test_task_type_parse() {
        assert_eq!("Vision".parse::<TaskType>().unwrap(), TaskType::Vision);
        assert_eq!("title".parse::<TaskType>().unwrap(), TaskType::Title);
        assert!("summary".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_attachment_debug_hides_bytes() {
        let a = Attachment::new(vec![1, 2, 3], "image/png");
        let dbg = format!("{a:?}");
        assert!(dbg.contains("image/png"));
        assert!(dbg.contains("bytes: 3"));
    }

    #[test]
    fn test_message_serialization() {
        let msg = Message::from(&Turn::user("Hello"));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, json!({"role": "user", "content": "Hello"}));

        let msg = Message::user_parts(vec![
            ContentPart::Text {
                text: "What is this?".into(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "data:image/png;base64,AAAA".into(),
                    detail: None,
                },
            },
        ]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(json["content"][1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn test_chat_completion_response_without_usage() {
        let raw = json!({
            "choices": [{ "message": { "content": "ok" }, "finish_reason": "stop" }]
        });
        let resp: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        assert!(resp.usage.is_none());
        assert_eq!(resp.choices[0].message.content.as_deref(), Some("ok"));
    }

    #[test]
    fn test_gateway_result_constructors() {
        let ok = GatewayResult::success(
            Completion {
                text: "hi".into(),
                tokens: 0,
            },
            "groq",
            "llama",
        );
        assert!(ok.success);
        assert_eq!(ok.provider.as_deref(), Some("groq"));
        assert_eq!(ok.tokens, 0);

        let err = GatewayResult::failure("busy");
        assert!(!err.success);
        assert!(err.provider.is_none());
    }
}
