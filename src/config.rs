use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_chars: default_chunk_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_chunk_chars() -> usize {
    500
}
fn default_overlap_chars() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Results at or below this similarity are dropped.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_similarity: default_min_similarity(),
            top_k: default_top_k(),
        }
    }
}

fn default_min_similarity() -> f64 {
    0.4
}
fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
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
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Chat backend: `groq` or `openai`.
    #[serde(default = "default_model_provider")]
    pub provider: String,
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_model_provider(),
            name: default_model_name(),
            url: None,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_model_provider() -> String {
    "groq".to_string()
}
fn default_model_name() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_max_tokens() -> u32 {
    2048
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// Optional global instruction prepended to every system prompt.
    #[serde(default)]
    pub instructions: Option<String>,
    /// Most recent messages sent to the model; full history stays persisted.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            instructions: None,
            history_limit: default_history_limit(),
        }
    }
}

fn default_history_limit() -> usize {
    20
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.chunk_chars == 0 {
        anyhow::bail!("chunking.chunk_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.chunk_chars {
        anyhow::bail!("chunking.overlap_chars must be smaller than chunking.chunk_chars");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(0.0..1.0).contains(&config.retrieval.min_similarity) {
        anyhow::bail!("retrieval.min_similarity must be in [0.0, 1.0)");
    }

    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
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

    match config.model.provider.as_str() {
        "groq" | "openai" => {}
        other => anyhow::bail!("Unknown model provider: '{}'. Must be groq or openai.", other),
    }

    if config.chat.history_limit == 0 {
        anyhow::bail!("chat.history_limit must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("memobot.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(&tmp, "[db]\npath = \"data/memobot.sqlite\"\n");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.chunking.chunk_chars, 500);
        assert_eq!(cfg.chunking.overlap_chars, 50);
        assert_eq!(cfg.retrieval.top_k, 3);
        assert!((cfg.retrieval.min_similarity - 0.4).abs() < 1e-9);
        assert_eq!(cfg.chat.history_limit, 20);
        assert!(!cfg.embedding.is_enabled());
    }

    #[test]
    fn missing_chat_section_defaults_to_limit_20() {
        // serde's section default and the field default must agree
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(&tmp, "[db]\npath = \"x.sqlite\"\n[model]\nprovider = \"openai\"\n");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.chat.history_limit, 20);
        assert!(cfg.chat.instructions.is_none());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "[db]\npath = \"x.sqlite\"\n[chunking]\nchunk_chars = 50\noverlap_chars = 50\n",
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn enabled_embedding_requires_model_and_dims() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "[db]\npath = \"x.sqlite\"\n[embedding]\nprovider = \"openai\"\n",
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn unknown_model_provider_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "[db]\npath = \"x.sqlite\"\n[model]\nprovider = \"mystery\"\n",
        );
        assert!(load_config(&path).is_err());
    }
}
