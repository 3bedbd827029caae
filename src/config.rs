//! Configuration parsing and validation.
//!
//! Reads a TOML file (default `./config/lta.toml`). Every section is
//! optional and [`Config::default`] is a complete working configuration, so
//! a missing section means "use the defaults".
//!
//! ```toml
//! [data]
//! dir = "./data"
//!
//! [retrieval]
//! deal_match_weight = 5
//! term_weight = 1
//! phrase_weight = 3
//! min_term_len = 4
//! fallback_to_head = true
//! template_triggers = ["integration", "plan"]
//! snippet_chars = 600
//!
//! [retrieval.caps]
//! documents = 8
//! tasks = 15
//! sites = 10
//! templates = 10
//!
//! [completion]
//! provider = "gemini"          # or "disabled"
//! model = "gemini-2.5-flash"
//! api_key_env = "API_KEY"
//!
//! [server]
//! bind = "127.0.0.1:7340"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::selector::EvidenceCaps;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Where the five dataset files live.
#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_deal_match_weight")]
    pub deal_match_weight: u32,
    #[serde(default = "default_term_weight")]
    pub term_weight: u32,
    #[serde(default = "default_phrase_weight")]
    pub phrase_weight: u32,
    #[serde(default = "default_min_term_len")]
    pub min_term_len: usize,
    #[serde(default = "default_true")]
    pub fallback_to_head: bool,
    #[serde(default = "default_template_triggers")]
    pub template_triggers: Vec<String>,
    /// Per-field character limit inside the context block.
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    #[serde(default)]
    pub caps: EvidenceCaps,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            deal_match_weight: default_deal_match_weight(),
            term_weight: default_term_weight(),
            phrase_weight: default_phrase_weight(),
            min_term_len: default_min_term_len(),
            fallback_to_head: true,
            template_triggers: default_template_triggers(),
            snippet_chars: default_snippet_chars(),
            caps: EvidenceCaps::default(),
        }
    }
}

fn default_deal_match_weight() -> u32 {
    5
}
fn default_term_weight() -> u32 {
    1
}
fn default_phrase_weight() -> u32 {
    3
}
fn default_min_term_len() -> usize {
    4
}
fn default_true() -> bool {
    true
}
fn default_template_triggers() -> Vec<String> {
    vec!["integration".to_string(), "plan".to_string()]
}
fn default_snippet_chars() -> usize {
    600
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_api_key_env() -> String {
    "API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_output_tokens() -> u32 {
    2048
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

/// Load and validate a config file.
///
/// A missing file at the default location is not an error; callers decide
/// that through [`load_config_or_default`].
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` when it exists, otherwise fall back to [`Config::default`].
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found; using defaults");
        Ok(Config::default())
    }
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate retrieval
    let caps = &config.retrieval.caps;
    for (name, value) in [
        ("documents", caps.documents),
        ("tasks", caps.tasks),
        ("sites", caps.sites),
        ("templates", caps.templates),
    ] {
        if value < 1 {
            anyhow::bail!("retrieval.caps.{} must be >= 1", name);
        }
    }

    if config.retrieval.min_term_len < 1 {
        anyhow::bail!("retrieval.min_term_len must be >= 1");
    }

    if config.retrieval.snippet_chars < 1 {
        anyhow::bail!("retrieval.snippet_chars must be >= 1");
    }

    // Validate completion
    if !(0.0..=2.0).contains(&config.completion.temperature) {
        anyhow::bail!("completion.temperature must be in [0.0, 2.0]");
    }

    if config.completion.max_output_tokens < 1 {
        anyhow::bail!("completion.max_output_tokens must be >= 1");
    }

    match config.completion.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown completion provider: '{}'. Must be gemini or disabled.",
            other
        ),
    }

    if config.completion.is_enabled() && config.completion.model.trim().is_empty() {
        anyhow::bail!(
            "completion.model must be specified when provider is '{}'",
            config.completion.provider
        );
    }

    Ok(())
}
