use crate::sse::lines;
use crate::traits::{ChatEvent, ChatMessage, ChatRequest, ChatStream, LlmClient, LlmError, LlmResponse};
use async_stream::try_stream;
use async_trait::async_trait;
use brochure_common::{BrochureError, Result};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

pub const OLLAMA_API_BASE: &str = "http://localhost:11434";

const OLLAMA_CONNECTION_ERROR: &str = "No running Ollama server detected. Start it with: `ollama serve` (after installing). Install instructions: https://github.com/ollama/ollama";

/// Ollama client for local model inference.
///
/// Expects a running Ollama server (see https://github.com/ollama/ollama).
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    options: serde_json::Map<String, JsonValue>,
}

/// Body of a whole reply, and of each NDJSON line of a streamed one.
#[derive(Debug, Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

impl OllamaClient {
    /// Create a new client and verify server/model availability.
    pub async fn new(base_url: String, model: String) -> Result<Self> {
        let client = Self::unchecked(base_url, model)?;

        client.probe_server().await?;
        client.ensure_model_available().await?;

        Ok(client)
    }

    /// Build a client without contacting the server.
    pub fn unchecked(base_url: String, model: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BrochureError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    async fn probe_server(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|_| LlmError::Api(OLLAMA_CONNECTION_ERROR.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(LlmError::Api(OLLAMA_CONNECTION_ERROR.to_string()).into())
        }
    }

    async fn ensure_model_available(&self) -> Result<()> {
        let models = self.fetch_available_models().await?;

        // Tags list "llama3.2:latest" for a bare "llama3.2".
        let wanted_latest = format!("{}:latest", self.model);
        if !models.iter().any(|m| *m == self.model || *m == wanted_latest) {
            tracing::info!("Model {} not found locally, pulling...", self.model);
            self.pull_model(&self.model).await?;
        }

        Ok(())
    }

    async fn fetch_available_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LlmError::Api(format!("Failed to fetch models: {}", e)))?;

        if !resp.status().is_success() {
            return Ok(Vec::new());
        }

        let val: JsonValue = resp
            .json()
            .await
            .map_err(|e| LlmError::Api(format!("Failed to parse models response: {}", e)))?;

        let models = val
            .get("models")
            .and_then(|m| m.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.get("name").and_then(|n| n.as_str()))
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }

    async fn pull_model(&self, model: &str) -> Result<()> {
        let url = format!("{}/api/pull", self.base_url);
        let payload = json!({
            "model": model,
            "stream": false
        });

        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::ModelNotAvailable(format!("{model}: {e}")))?;

        if resp.status().is_success() {
            tracing::info!("Successfully pulled model: {}", model);
            Ok(())
        } else {
            Err(LlmError::ModelNotAvailable(format!("{model}: pull failed with HTTP {}", resp.status())).into())
        }
    }

    fn body<'a>(&'a self, request: &'a ChatRequest, stream: bool) -> OllamaChatRequest<'a> {
        let mut options = serde_json::Map::new();
        if let Some(temp) = request.temperature {
            options.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tok) = request.max_tokens {
            options.insert("num_predict".to_string(), json!(max_tok));
        }

        OllamaChatRequest {
            model: &self.model,
            messages: &request.messages,
            stream,
            options,
        }
    }

    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&self.body(request, stream))
            .send()
            .await
            .map_err(|e| LlmError::Api(format!("Chat request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("Chat failed: HTTP {status}: {}", detail.trim())).into());
        }
        Ok(resp)
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        tracing::debug!(model = %self.model, "ollama.chat");

        let resp = self.send(request, false).await?;
        let chunk: OllamaChatChunk = resp
            .json()
            .await
            .map_err(|e| LlmError::Api(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = chunk.error {
            return Err(LlmError::Api(error).into());
        }

        Ok(LlmResponse {
            text: chunk.message.map(|m| m.content).unwrap_or_default(),
            model: chunk.model.or_else(|| Some(self.model.clone())),
            tokens_used: chunk.eval_count,
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream> {
        tracing::debug!(model = %self.model, "ollama.chat_stream");

        let resp = self.send(request, true).await?;
        Ok(Box::pin(ndjson_events(lines(resp.bytes_stream()))))
    }

    async fn health_check(&self) -> Result<bool> {
        self.probe_server().await.map(|_| true).or(Ok(false))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// One JSON object per line; the object with `done: true` ends the reply.
fn ndjson_events<S>(lines: S) -> impl Stream<Item = Result<ChatEvent>> + Send
where
    S: Stream<Item = Result<String>> + Send + 'static,
{
    try_stream! {
        let mut lines = Box::pin(lines);
        let mut finished = false;

        while let Some(line) = lines.next().await {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let chunk: OllamaChatChunk = serde_json::from_str(&line)
                .map_err(|e| LlmError::Stream(format!("undecodable line: {e}")))?;
            if let Some(error) = chunk.error {
                Err::<(), _>(LlmError::Api(error))?;
            }
            if let Some(content) = chunk.message.map(|m| m.content).filter(|c| !c.is_empty()) {
                yield ChatEvent::Delta(content);
            }
            if chunk.done {
                finished = true;
                break;
            }
        }

        if !finished {
            Err::<(), _>(LlmError::Stream("stream closed before done".into()))?;
        }
        yield ChatEvent::Done;
    }
}
