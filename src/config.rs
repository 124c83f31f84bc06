use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
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
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Expected vector length. Unchecked when unset.
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            base_url: default_base_url(),
            dims: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "WhereIsAI/UAE-Large-V1".to_string()
}
fn default_base_url() -> String {
    "https://api.together.xyz/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_completion_model(),
            base_url: default_base_url(),
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_completion_model() -> String {
    "meta-llama/Meta-Llama-3-8B-Instruct-Turbo".to_string()
}
fn default_max_tokens() -> u32 {
    300
}
fn default_temperature() -> f32 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `"pinecone"` or `"memory"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            name: None,
            host: None,
            namespace: String::new(),
            api_key: None,
            top_k: default_top_k(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "pinecone".to_string()
}
fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifierConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Applies environment overrides through `lookup`.
    ///
    /// `TOGETHER_API_KEY` feeds both the embedding and completion sections,
    /// since both talk to the same provider.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("TOGETHER_API_KEY") {
            self.embedding.api_key = Some(key.clone());
            self.completion.api_key = Some(key);
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(model) = lookup("COMPLETION_MODEL") {
            self.completion.model = model;
        }
        if let Some(key) = lookup("PINECONE_API_KEY") {
            self.index.api_key = Some(key);
        }
        if let Some(name) = lookup("INDEX_NAME") {
            self.index.name = Some(name);
        }
        if let Some(host) = lookup("INDEX_HOST") {
            self.index.host = Some(host);
        }
        if let Some(url) = lookup("ZAPIER_WEBHOOK_URL") {
            self.notifier.webhook_url = Some(url);
        }
        if let Some(bind) = lookup("TICKETD_BIND") {
            self.server.bind = bind;
        }
    }

    /// Checks the settings a running pipeline depends on.
    pub fn validate(&self) -> Result<()> {
        self.validate_for_seeding()?;

        if self.completion.model.trim().is_empty() {
            anyhow::bail!("completion.model must not be empty");
        }
        if self.completion.max_tokens == 0 {
            anyhow::bail!("completion.max_tokens must be > 0");
        }
        if !(0.0..=2.0).contains(&self.completion.temperature) {
            anyhow::bail!("completion.temperature must be in [0.0, 2.0]");
        }
        if self.completion.timeout_secs == 0 {
            anyhow::bail!("completion.timeout_secs must be > 0");
        }
        if self.notifier.timeout_secs == 0 {
            anyhow::bail!("notifier.timeout_secs must be > 0");
        }
        if is_blank(&self.completion.api_key) {
            anyhow::bail!("TOGETHER_API_KEY environment variable not set");
        }
        if is_blank(&self.notifier.webhook_url) {
            anyhow::bail!("ZAPIER_WEBHOOK_URL environment variable not set");
        }

        Ok(())
    }

    /// Checks only what embedding and index access need.
    pub fn validate_for_seeding(&self) -> Result<()> {
        if self.embedding.model.trim().is_empty() {
            anyhow::bail!("embedding.model must not be empty");
        }
        if self.embedding.dims == Some(0) {
            anyhow::bail!("embedding.dims must be > 0 when set");
        }
        if self.embedding.timeout_secs == 0 {
            anyhow::bail!("embedding.timeout_secs must be > 0");
        }
        if is_blank(&self.embedding.api_key) {
            anyhow::bail!("TOGETHER_API_KEY environment variable not set");
        }
        if self.index.top_k < 1 {
            anyhow::bail!("index.top_k must be >= 1");
        }
        if self.index.timeout_secs == 0 {
            anyhow::bail!("index.timeout_secs must be > 0");
        }

        match self.index.backend.as_str() {
            "pinecone" => {
                if is_blank(&self.index.host) {
                    anyhow::bail!("INDEX_HOST must be set for the pinecone index backend");
                }
                if is_blank(&self.index.api_key) {
                    anyhow::bail!("PINECONE_API_KEY environment variable not set");
                }
            }
            "memory" => {}
            other => anyhow::bail!(
                "Unknown index backend: '{}'. Must be pinecone or memory.",
                other
            ),
        }

        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Parses a TOML document into a [`Config`] without validating it.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

/// Reads `path` when given, loads `.env` if one exists, and applies
/// environment overrides. The result is not validated.
pub fn read_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            parse_config(&content)?
        }
        None => Config::default(),
    };

    // a missing .env is fine
    let _ = dotenvy::dotenv();
    config.apply_env(|key| std::env::var(key).ok());

    Ok(config)
}

/// Loads and validates the configuration for serving tickets.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = read_config(path)?;
    config.validate()?;
    Ok(config)
}
