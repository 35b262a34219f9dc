//! Common types and utilities shared across the brochure crates.
//!
//! This crate defines the provider configuration, observability helpers,
//! the degrade-or-complete result wrapper and the shared error type used
//! throughout the workspace. It stays dependency-light so every crate can
//! depend on it.
//!
//! # Overview
//!
//! - [`LlmConfig`]: Provider-agnostic LLM configuration
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`Degradable`]: A value that is either complete or a degraded fallback
//! - [`BrochureError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! ```rust
//! use brochure_common::{Degradable, LlmConfig};
//!
//! let cfg = LlmConfig::default();
//! assert!(matches!(cfg, LlmConfig::None));
//!
//! let links: Degradable<Vec<String>> = Degradable::degraded(Vec::new(), "bad json");
//! assert!(links.is_degraded());
//! assert!(links.into_inner().is_empty());
//! ```
use serde::{Deserialize, Serialize};

pub mod degrade;
pub mod observability;

pub use degrade::Degradable;

/// Configuration for the LLM provider that backs the text-generation oracle.
///
/// See the `brochure-llm` crate for concrete client implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LlmConfig {
    OpenAi {
        api_key: String,
        model: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    Ollama {
        base_url: String,
        model: String,
    },
    Anthropic {
        api_key: String,
        model: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    None,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::None
    }
}

impl LlmConfig {
    /// Short provider label used in logs.
    pub fn provider(&self) -> &'static str {
        match self {
            Self::OpenAi { .. } => "openai",
            Self::Ollama { .. } => "ollama",
            Self::Anthropic { .. } => "anthropic",
            Self::None => "none",
        }
    }
}

/// Error types used across the brochure workspace.
#[derive(thiserror::Error, Debug)]
pub enum BrochureError {
    /// The text-generation oracle failed (network, auth, quota, bad payload).
    #[error("LLM error: {0}")]
    Llm(String),

    /// A streamed reply broke off or could not be decoded.
    #[error("Stream error: {0}")]
    Stream(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else bubbled up from a helper that speaks `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`BrochureError`].
pub type Result<T> = std::result::Result<T, BrochureError>;
