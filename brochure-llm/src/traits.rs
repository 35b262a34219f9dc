use async_trait::async_trait;
use brochure_common::{BrochureError, Result};
use brochure_http::{HttpError, StatusCode};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message of a chat exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Provider-neutral chat request; the model is fixed per client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// The common two-message shape: one instruction, one question.
    pub fn system_user(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self::new(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Fill in sampling settings from `sampling` where it sets them.
    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        if sampling.temperature.is_some() {
            self.temperature = sampling.temperature;
        }
        if sampling.max_tokens.is_some() {
            self.max_tokens = sampling.max_tokens;
        }
        self
    }

    /// All system messages joined, for providers that take the system
    /// prompt as a separate field.
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// Messages other than system messages, in order.
    pub fn conversation(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }
}

/// Deployment-wide sampling settings; `None` leaves the provider default.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sampling {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

/// One item of a streamed reply. A cleanly finished stream always yields
/// `Done` last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Delta(String),
    Done,
}

/// Finite, non-restartable sequence of reply fragments.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatEvent>> + Send>>;

#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("API error: {0}")]
    Api(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Invalid credentials: {0}")]
    Unauthorized(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Classify transport failures by status where it helps the reader.
    pub fn from_http(e: HttpError) -> Self {
        match e {
            HttpError::Api {
                status: StatusCode::TOO_MANY_REQUESTS,
                message,
                ..
            } => Self::RateLimit(message),
            HttpError::Api {
                status: StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN,
                message,
                ..
            } => Self::Unauthorized(message),
            other => Self::Http(other),
        }
    }
}

impl From<LlmError> for BrochureError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Stream(msg) => BrochureError::Stream(msg),
            LlmError::Config(msg) => BrochureError::Config(msg),
            other => BrochureError::Llm(other.to_string()),
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the messages and wait for the complete reply.
    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse>;

    /// Send the messages and receive the reply as incremental fragments.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream>;

    /// Check if the LLM service is available
    async fn health_check(&self) -> Result<bool>;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    /// Single-turn convenience over [`LlmClient::chat`].
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        let request = ChatRequest {
            messages,
            max_tokens,
            temperature,
        };
        self.chat(&request).await
    }
}

/// Drain a reply stream into one string. Errors if the stream stops without
/// its `Done` marker.
pub async fn collect_stream(mut stream: ChatStream) -> Result<String> {
    let mut text = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            ChatEvent::Delta(fragment) => text.push_str(&fragment),
            ChatEvent::Done => return Ok(text),
        }
    }
    Err(BrochureError::Stream(
        "reply stream ended without an end marker".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn system_prompt_joins_only_system_messages() {
        let req = ChatRequest::new(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage::system("use markdown"),
        ]);
        assert_eq!(req.system_prompt().as_deref(), Some("be brief\n\nuse markdown"));
        assert_eq!(req.conversation().count(), 1);
    }

    #[test]
    fn sampling_only_overrides_what_it_sets() {
        let req = ChatRequest::system_user("s", "u")
            .with_temperature(0.7)
            .with_sampling(Sampling {
                temperature: None,
                max_tokens: Some(200),
            });
        assert_eq!(req.temperature, Some(0.7));
        assert_eq!(req.max_tokens, Some(200));
    }

    #[test]
    fn messages_serialize_with_lowercase_roles() {
        let v = serde_json::to_value(ChatMessage::user("hello")).unwrap();
        assert_eq!(v, serde_json::json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn auth_failures_are_classified() {
        let err = LlmError::from_http(HttpError::Api {
            status: StatusCode::UNAUTHORIZED,
            message: "bad key".into(),
            request_id: "-".into(),
        });
        assert!(matches!(err, LlmError::Unauthorized(ref m) if m == "bad key"));
        assert!(matches!(BrochureError::from(err), BrochureError::Llm(_)));
    }

    #[tokio::test]
    async fn collect_stream_concatenates_until_done() {
        let events: ChatStream = Box::pin(stream::iter(vec![
            Ok(ChatEvent::Delta("Hello".into())),
            Ok(ChatEvent::Delta(", world".into())),
            Ok(ChatEvent::Done),
        ]));
        assert_eq!(collect_stream(events).await.unwrap(), "Hello, world");
    }

    #[tokio::test]
    async fn collect_stream_rejects_truncated_streams() {
        let events: ChatStream = Box::pin(stream::iter(vec![Ok(ChatEvent::Delta("Hel".into()))]));
        assert!(matches!(
            collect_stream(events).await,
            Err(BrochureError::Stream(_))
        ));
    }
}
