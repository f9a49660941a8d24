//! TOML configuration.
//!
//! Every section except `[db]` is optional and falls back to the defaults
//! below. [`load_config`] parses and validates in one step; callers never
//! see a half-valid [`Config`].

use anyhow::{Context, Result};
use repochat_core::pipeline::{PipelineOptions, TermErrorPolicy, DEFAULT_KEYWORDS};
use repochat_core::prompt::{missing_placeholders, DEFAULT_ANSWER_TEMPLATE, DEFAULT_TERMS_TEMPLATE};
use repochat_core::retrieve::DEFAULT_TOP_K_PER_TERM;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
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
    "127.0.0.1:8000".to_string()
}

/// Chat-completion backend shared by the term and answer models.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Overrides `model` for term extraction only.
    #[serde(default)]
    pub terms_model: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: None,
            model: default_llm_model(),
            terms_model: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    120
}

impl LlmConfig {
    /// Base URL with the provider default applied and no trailing slash.
    pub fn base_url(&self) -> String {
        let url = match &self.base_url {
            Some(url) => url.as_str(),
            None if self.provider == "ollama" => "http://localhost:11434",
            None => "https://api.openai.com/v1",
        };
        url.trim_end_matches('/').to_string()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Provider base URL. Defaults per provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    #[serde(default = "default_top_k_per_term")]
    pub top_k_per_term: usize,
    #[serde(default)]
    pub on_term_error: TermErrorPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            top_k_per_term: default_top_k_per_term(),
            on_term_error: TermErrorPolicy::default(),
        }
    }
}

fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect()
}
fn default_top_k_per_term() -> usize {
    DEFAULT_TOP_K_PER_TERM
}

/// Optional prompt template overrides.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PromptsConfig {
    pub terms: Option<String>,
    pub answer: Option<String>,
}

impl Config {
    /// Pipeline tunables derived from `[retrieval]` and `[prompts]`.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            keywords: self.retrieval.keywords.clone(),
            top_k_per_term: self.retrieval.top_k_per_term,
            on_term_error: self.retrieval.on_term_error,
            terms_template: self
                .prompts
                .terms
                .clone()
                .unwrap_or_else(|| DEFAULT_TERMS_TEMPLATE.to_string()),
            answer_template: self
                .prompts
                .answer
                .clone()
                .unwrap_or_else(|| DEFAULT_ANSWER_TEMPLATE.to_string()),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a config document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate retrieval
    if config.retrieval.top_k_per_term == 0 {
        anyhow::bail!("retrieval.top_k_per_term must be >= 1");
    }

    // Validate llm
    match config.llm.provider.as_str() {
        "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be openai or ollama.",
            other
        ),
    }
    if config.llm.model.trim().is_empty() {
        anyhow::bail!("llm.model must not be empty");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    // Validate prompt overrides
    if let Some(terms) = &config.prompts.terms {
        let missing = missing_placeholders(terms, &["question"]);
        if !missing.is_empty() {
            anyhow::bail!("prompts.terms is missing placeholder(s): {{{}}}", missing.join("}, {"));
        }
    }
    if let Some(answer) = &config.prompts.answer {
        let missing = missing_placeholders(answer, &["question", "context"]);
        if !missing.is_empty() {
            anyhow::bail!("prompts.answer is missing placeholder(s): {{{}}}", missing.join("}, {"));
        }
    }

    Ok(config)
}
