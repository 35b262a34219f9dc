use crate::sse::{sse_events, SseEvent};
use crate::traits::{ChatEvent, ChatMessage, ChatRequest, ChatStream, LlmClient, LlmError, LlmResponse};
use async_stream::try_stream;
use async_trait::async_trait;
use brochure_common::{BrochureError, Result};
use brochure_http::{Auth, HttpClient, RequestOpts};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";
const STREAM_DONE: &str = "[DONE]";

/// Client for the OpenAI Chat Completions API (and compatible gateways).
pub struct OpenAiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: Option<u32>,
}

/// One `data:` payload of a streamed completion.
#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// Create a new client for the given API key and model.
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Self::with_base_url(api_key, model, OPENAI_API_BASE)
    }

    /// Point the client at an OpenAI-compatible endpoint.
    pub fn with_base_url(api_key: String, model: String, base_url: &str) -> Result<Self> {
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let client = HttpClient::new(&base)
            .map_err(|e| BrochureError::Config(format!("HttpClient init failed: {e}")))?
            .with_timeout(Duration::from_secs(120));

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    fn body<'a>(&'a self, request: &'a ChatRequest, stream: bool) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        tracing::debug!(model = %self.model, messages = request.messages.len(), "openai.chat");

        let resp: ChatCompletionResponse = self
            .client
            .post_json("chat/completions", Some(&self.api_key), &self.body(request, false))
            .await
            .map_err(LlmError::from_http)?;

        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Api("completion carried no message content".into()))?;

        Ok(LlmResponse {
            text,
            model: resp.model,
            tokens_used: resp.usage.and_then(|u| u.total_tokens),
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream> {
        tracing::debug!(model = %self.model, messages = request.messages.len(), "openai.chat_stream");

        let body = self
            .client
            .post_json_stream(
                "chat/completions",
                &self.body(request, true),
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.api_key)),
                    ..Default::default()
                },
            )
            .await
            .map_err(LlmError::from_http)?;

        Ok(Box::pin(completion_events(sse_events(body))))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let test_prompt = "Respond with just 'OK'";

        match self.generate(test_prompt, None, Some(5), Some(0.1)).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("OpenAI health check failed: {}", e);
                Ok(false)
            }
        }
    }
}

/// Turn the SSE events of a streamed completion into reply fragments.
fn completion_events<S>(events: S) -> impl Stream<Item = Result<ChatEvent>> + Send
where
    S: Stream<Item = Result<SseEvent>> + Send + 'static,
{
    try_stream! {
        let mut events = Box::pin(events);
        let mut finished = false;

        while let Some(event) = events.next().await {
            let event = event?;
            let data = event.data.trim();
            if data == STREAM_DONE {
                finished = true;
                break;
            }
            let chunk: ChatCompletionChunk = serde_json::from_str(data)
                .map_err(|e| LlmError::Stream(format!("undecodable chunk: {e}")))?;
            for choice in chunk.choices {
                if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                    yield ChatEvent::Delta(content);
                }
            }
        }

        if !finished {
            Err::<(), _>(LlmError::Stream("stream closed before [DONE]".into()))?;
        }
        yield ChatEvent::Done;
    }
}
