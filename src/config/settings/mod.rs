
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::database::{MAX_UPSERT_BATCH, Metric};
use crate::query::prompt::{DEFAULT_PROMPT_TEMPLATE, PromptTemplate};

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_MAX_SECTION_LEN: usize = 1000;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedder: EmbedderConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderBackend {
    #[default]
    Ollama,
    Predict,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorBackend {
    #[default]
    Ollama,
    Predict,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbedderConfig {
    pub backend: EmbedderBackend,
    pub url: Url,
    pub model: String,
    pub batch_size: u32,
    pub dimension: u32,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    /// Bearer key for the `openai` backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    pub backend: GeneratorBackend,
    pub url: Url,
    pub model: String,
    pub max_new_tokens: u32,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    pub name: String,
    pub metric: Metric,
    pub upsert_batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub max_section_len: usize,
    pub prompt_template: String,
}

fn local_ollama_url() -> Url {
    Url::parse("http://localhost:11434").expect("static URL is valid")
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            backend: EmbedderBackend::Ollama,
            url: local_ollama_url(),
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            timeout_seconds: 30,
            retry_attempts: 1,
            api_key: None,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            backend: GeneratorBackend::Ollama,
            url: local_ollama_url(),
            model: "llama3.2:latest".to_string(),
            max_new_tokens: 256,
            timeout_seconds: 120,
            retry_attempts: 1,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: "kit".to_string(),
            metric: Metric::Cosine,
            upsert_batch_size: MAX_UPSERT_BATCH,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_section_len: DEFAULT_MAX_SECTION_LEN,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL: {0} (must use http or https)")]
    InvalidUrl(String),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Missing API key for the {0} embedding backend")]
    MissingApiKey(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding dimension: {0} (must be between 1 and 8192)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 3600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid max new tokens: {0} (must be between 1 and 8192)")]
    InvalidMaxNewTokens(u32),
    #[error("Invalid index name: '{0}' (use letters, digits, '-' or '_')")]
    InvalidIndexName(String),
    #[error("Invalid upsert batch size: {0} (must be between 1 and {MAX_UPSERT_BATCH})")]
    InvalidUpsertBatchSize(usize),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid max section length: {0} (must be greater than 0)")]
    InvalidSectionLength(usize),
    #[error("Invalid prompt template: {0}")]
    InvalidPromptTemplate(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration directory, `~/.rag-kit`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".rag-kit"))
            .or_else(|| dirs::data_dir().map(|data| data.join("rag-kit")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when absent
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();
        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Directory holding the LanceDB tables
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedder.validate()?;
        self.generator.validate()?;
        self.index.validate()?;
        self.retrieval.validate()?;
        Ok(())
    }
}

fn validate_url(url: &Url) -> Result<(), ConfigError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(url.to_string()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::InvalidUrl(url.to_string()));
    }
    Ok(())
}

fn validate_timeout(seconds: u64) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&seconds) {
        return Err(ConfigError::InvalidTimeout(seconds));
    }
    Ok(())
}

fn validate_retry_attempts(attempts: u32) -> Result<(), ConfigError> {
    if !(1..=10).contains(&attempts) {
        return Err(ConfigError::InvalidRetryAttempts(attempts));
    }
    Ok(())
}

impl EmbedderConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url(&self.url)?;

        let named_model = matches!(self.backend, EmbedderBackend::Ollama | EmbedderBackend::OpenAi);
        if named_model && self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.backend == EmbedderBackend::OpenAi
            && self.api_key.as_deref().is_none_or(|key| key.trim().is_empty())
        {
            return Err(ConfigError::MissingApiKey("openai".to_string()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(1..=8192).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }

        validate_timeout(self.timeout_seconds)?;
        validate_retry_attempts(self.retry_attempts)
    }

    #[inline]
    pub fn set_url(&mut self, url: &str) -> Result<(), ConfigError> {
        let parsed = Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.to_string()))?;
        validate_url(&parsed)?;
        self.url = parsed;
        Ok(())
    }

    #[inline]
    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    #[inline]
    pub fn set_api_key(&mut self, api_key: String) -> Result<(), ConfigError> {
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey("openai".to_string()));
        }
        self.api_key = Some(api_key);
        Ok(())
    }

    #[inline]
    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }

    #[inline]
    pub fn set_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(1..=8192).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.dimension = dimension;
        Ok(())
    }
}

impl GeneratorConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url(&self.url)?;

        if self.backend == GeneratorBackend::Ollama && self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(1..=8192).contains(&self.max_new_tokens) {
            return Err(ConfigError::InvalidMaxNewTokens(self.max_new_tokens));
        }

        validate_timeout(self.timeout_seconds)?;
        validate_retry_attempts(self.retry_attempts)
    }

    #[inline]
    pub fn set_url(&mut self, url: &str) -> Result<(), ConfigError> {
        let parsed = Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.to_string()))?;
        validate_url(&parsed)?;
        self.url = parsed;
        Ok(())
    }

    #[inline]
    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }
}

impl IndexConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_index_name(&self.name)?;

        if !(1..=MAX_UPSERT_BATCH).contains(&self.upsert_batch_size) {
            return Err(ConfigError::InvalidUpsertBatchSize(self.upsert_batch_size));
        }

        Ok(())
    }

    #[inline]
    pub fn set_name(&mut self, name: String) -> Result<(), ConfigError> {
        validate_index_name(&name)?;
        self.name = name;
        Ok(())
    }
}

/// Index names become table names, so keep them to a portable character set
#[inline]
pub fn validate_index_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidIndexName(name.to_string()))
    }
}

impl RetrievalConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.top_k) {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }

        if self.max_section_len == 0 {
            return Err(ConfigError::InvalidSectionLength(self.max_section_len));
        }

        PromptTemplate::new(&self.prompt_template)
            .map_err(|e| ConfigError::InvalidPromptTemplate(e.to_string()))?;

        Ok(())
    }
}
