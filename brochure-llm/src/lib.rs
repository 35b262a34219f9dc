//! Provider‑agnostic LLM integration for the brochure pipeline.
//!
//! This crate exposes a common [`traits::LlmClient`] interface and concrete
//! provider implementations for OpenAI, Ollama and Anthropic. Every client
//! answers a chat request either whole or as a [`traits::ChatStream`] of
//! fragments ending in an explicit [`traits::ChatEvent::Done`] marker.
//!
//! # Examples
//! ```no_run
//! use brochure_common::{LlmConfig, Result};
//! use brochure_llm::ensure_llm_ready;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let cfg = LlmConfig::OpenAi {
//!     api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
//!     model: brochure_llm::DEFAULT_OPENAI_MODEL.to_string(),
//!     base_url: None,
//! };
//! let client = ensure_llm_ready(&cfg).await?;
//! assert!(!client.model_name().is_empty());
//! # Ok(())
//! # }
//! ```
pub mod anthropic;
pub mod credentials;
pub mod ollama;
pub mod openai;
pub mod sse;
pub mod traits;

use anthropic::AnthropicClient;
use brochure_common::{BrochureError, LlmConfig};
use ollama::OllamaClient;
use openai::OpenAiClient;
use std::sync::Arc;
use traits::LlmClient;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Build the client for `config`. Ollama is probed and its model pulled if
/// missing; hosted providers are constructed without a network call.
pub async fn ensure_llm_ready(
    config: &LlmConfig,
) -> brochure_common::Result<Arc<dyn LlmClient + Send + Sync + 'static>> {
    tracing::debug!(provider = config.provider(), "initialising LLM client");
    match config {
        LlmConfig::OpenAi {
            api_key,
            model,
            base_url,
        } => {
            let client = match base_url {
                Some(url) => OpenAiClient::with_base_url(api_key.clone(), model.clone(), url)?,
                None => OpenAiClient::new(api_key.clone(), model.clone())?,
            };
            Ok(Arc::new(client))
        }
        LlmConfig::Ollama { base_url, model } => {
            let client = OllamaClient::new(base_url.clone(), model.clone()).await?;
            Ok(Arc::new(client))
        }
        LlmConfig::Anthropic {
            api_key,
            model,
            base_url,
        } => {
            let client = match base_url {
                Some(url) => AnthropicClient::with_base_url(api_key.clone(), model.clone(), url)?,
                None => AnthropicClient::new(api_key.clone(), model.clone())?,
            };
            Ok(Arc::new(client))
        }
        LlmConfig::None => Err(BrochureError::Config("No LLM configured".to_string())),
    }
}
