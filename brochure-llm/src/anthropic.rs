use crate::sse::{sse_events, SseEvent};
use crate::traits::{ChatEvent, ChatRequest, ChatStream, LlmClient, LlmError, LlmResponse, Role};
use async_stream::try_stream;
use async_trait::async_trait;
use brochure_common::{BrochureError, Result};
use brochure_http::header::{HeaderMap, HeaderName, HeaderValue};
use brochure_http::{Auth, HttpClient, RequestOpts};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The Messages API requires `max_tokens`; used when the request leaves it unset.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

/// The `data:` payload of a streaming event; only the fields we act on.
#[derive(Debug, Deserialize)]
struct StreamPayload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Self::with_base_url(api_key, model, ANTHROPIC_API_BASE)
    }

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

    fn body<'a>(&'a self, request: &'a ChatRequest, stream: bool) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: request.system_prompt(),
            messages: request
                .conversation()
                .map(|m| WireMessage {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
            temperature: request.temperature,
            stream,
        }
    }

    fn opts(&self) -> Result<RequestOpts<'static>> {
        let key = HeaderValue::from_str(self.api_key.trim())
            .map_err(|e| LlmError::Config(format!("API key is not a valid header value: {e}")))?;
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("anthropic-version"),
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        Ok(RequestOpts {
            auth: Some(Auth::Header {
                name: HeaderName::from_static("x-api-key"),
                value: key,
            }),
            headers: Some(headers),
            ..Default::default()
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        tracing::debug!(model = %self.model, "anthropic.chat");

        let resp: MessagesResponse = self
            .client
            .post_json_opts("v1/messages", &self.body(request, false), self.opts()?)
            .await
            .map_err(LlmError::from_http)?;

        let text: String = resp
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();

        let tokens_used = resp
            .usage
            .map(|u| u.input_tokens.unwrap_or(0) + u.output_tokens.unwrap_or(0));

        Ok(LlmResponse {
            text,
            model: resp.model,
            tokens_used,
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream> {
        tracing::debug!(model = %self.model, "anthropic.chat_stream");

        let body = self
            .client
            .post_json_stream("v1/messages", &self.body(request, true), self.opts()?)
            .await
            .map_err(LlmError::from_http)?;

        Ok(Box::pin(message_events(sse_events(body))))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        match self.generate("Respond with just 'OK'", None, Some(5), None).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Anthropic health check failed: {}", e);
                Ok(false)
            }
        }
    }
}

/// Map Messages API stream events onto reply fragments. Text arrives in
/// `content_block_delta`; `message_stop` ends the reply.
fn message_events<S>(events: S) -> impl Stream<Item = Result<ChatEvent>> + Send
where
    S: Stream<Item = Result<SseEvent>> + Send + 'static,
{
    try_stream! {
        let mut events = Box::pin(events);
        let mut finished = false;

        while let Some(event) = events.next().await {
            let event = event?;
            let payload: StreamPayload = serde_json::from_str(&event.data)
                .map_err(|e| LlmError::Stream(format!("undecodable event: {e}")))?;

            match payload.kind.as_str() {
                "content_block_delta" => {
                    if let Some(text) = payload.delta.and_then(|d| d.text).filter(|t| !t.is_empty()) {
                        yield ChatEvent::Delta(text);
                    }
                }
                "message_stop" => {
                    finished = true;
                    break;
                }
                "error" => {
                    let message = payload.error.map(|e| e.message).unwrap_or_default();
                    Err::<(), _>(LlmError::Api(message))?;
                }
                _ => {}
            }
        }

        if !finished {
            Err::<(), _>(LlmError::Stream("stream closed before message_stop".into()))?;
        }
        yield ChatEvent::Done;
    }
}
