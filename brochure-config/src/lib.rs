//! Settings loader: YAML files and `BROCHURE__`-prefixed environment overlays.
//!
//! Sources are merged in the order they are added, environment last, then
//! `${VAR}` placeholders in string values are expanded before the result is
//! deserialized into [`BrochureSettings`]. Every section has defaults, so an
//! empty configuration is valid:
//!
//! ```yaml
//! llm:
//!   provider: openai          # openai | ollama | anthropic
//!   model: gpt-4o-mini
//!   auth_token: ${OPENAI_API_KEY}
//!   temperature: 0.7
//! fetch:
//!   timeout_secs: 10
//!   pacing_ms: 1000
//! compose:
//!   max_prompt_chars: 5000
//! ```
//!
//! `BROCHURE__FETCH__PACING_MS=0` overrides `fetch.pacing_ms`.
use brochure_common::LlmConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "BROCHURE";

/// Conventional settings file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "brochure.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrochureSettings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub compose: ComposeSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LlmSettings {
    Openai {
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default = "default_openai_token")]
        auth_token: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default = "default_openai_endpoint")]
        endpoint: String,
    },
    Ollama {
        #[serde(default = "default_ollama_model")]
        model: String,
        #[serde(default = "default_ollama_endpoint")]
        endpoint: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
    },
    Anthropic {
        #[serde(default = "default_anthropic_model")]
        model: String,
        #[serde(default = "default_anthropic_token")]
        auth_token: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default = "default_anthropic_endpoint")]
        endpoint: String,
    },
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self::Openai {
            model: default_openai_model(),
            auth_token: default_openai_token(),
            temperature: None,
            max_tokens: None,
            endpoint: default_openai_endpoint(),
        }
    }
}

impl LlmSettings {
    /// Client configuration for `brochure_llm::ensure_llm_ready`.
    pub fn to_llm_config(&self) -> LlmConfig {
        match self.clone() {
            Self::Openai {
                model,
                auth_token,
                endpoint,
                ..
            } => LlmConfig::OpenAi {
                api_key: auth_token,
                model,
                base_url: Some(endpoint),
            },
            Self::Ollama {
                model, endpoint, ..
            } => LlmConfig::Ollama {
                base_url: endpoint,
                model,
            },
            Self::Anthropic {
                model,
                auth_token,
                endpoint,
                ..
            } => LlmConfig::Anthropic {
                api_key: auth_token,
                model,
                base_url: Some(endpoint),
            },
        }
    }

    pub fn temperature(&self) -> Option<f32> {
        match self {
            Self::Openai { temperature, .. }
            | Self::Ollama { temperature, .. }
            | Self::Anthropic { temperature, .. } => *temperature,
        }
    }

    pub fn max_tokens(&self) -> Option<u32> {
        match self {
            Self::Openai { max_tokens, .. }
            | Self::Ollama { max_tokens, .. }
            | Self::Anthropic { max_tokens, .. } => *max_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FetchSettings {
    /// `None` keeps the fetcher's built-in desktop browser string.
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: default_timeout_secs(),
            pacing_ms: default_pacing_ms(),
        }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComposeSettings {
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

fn default_openai_model() -> String {
    "gpt-4o-mini".into()
}
fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".into()
}
fn default_openai_token() -> String {
    std::env::var("OPENAI_API_KEY").unwrap_or_default()
}
fn default_ollama_model() -> String {
    "llama3.2".into()
}
fn default_ollama_endpoint() -> String {
    "http://localhost:11434".into()
}
fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-20241022".into()
}
fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".into()
}
fn default_anthropic_token() -> String {
    std::env::var("ANTHROPIC_API_KEY").unwrap_or_default()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_pacing_ms() -> u64 {
    1000
}
fn default_max_prompt_chars() -> usize {
    5000
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring.
pub struct BrochureConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for BrochureConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl BrochureConfigLoader {
    /// ```
    /// use brochure_config::BrochureConfigLoader;
    ///
    /// let settings = BrochureConfigLoader::new()
    ///     .with_yaml_str("compose:\n  max_prompt_chars: 1200")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(settings.compose.max_prompt_chars, 1200);
    /// assert_eq!(settings.fetch.timeout_secs, 10);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a file that must exist; the format is inferred from its suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is used only if present.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Layer the environment over everything added so far, expand `${VAR}`
    /// placeholders and deserialize.
    ///
    /// ```
    /// use brochure_config::{BrochureConfigLoader, LlmSettings};
    ///
    /// unsafe { std::env::set_var("DOC_OLLAMA_HOST", "http://gpu-box:11434"); }
    ///
    /// let settings = BrochureConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// llm:
    ///   provider: ollama
    ///   endpoint: "${DOC_OLLAMA_HOST}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// match settings.llm {
    ///     LlmSettings::Ollama { model, endpoint, .. } => {
    ///         assert_eq!(model, "llama3.2");
    ///         assert_eq!(endpoint, "http://gpu-box:11434");
    ///     }
    ///     other => panic!("expected Ollama settings, got {other:?}"),
    /// }
    ///
    /// unsafe { std::env::remove_var("DOC_OLLAMA_HOST"); }
    /// ```
    pub fn load(self) -> Result<BrochureSettings, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
