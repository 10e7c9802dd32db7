//! TOML configuration.
//!
//! Only `[db]` is required; every other section falls back to defaults.
//! Values are validated once at load time so the rest of the crate can
//! trust them.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::orchestrator::OrchestratorParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub language: LanguageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Word-window chunking defaults; requests may override both values.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_documents: usize,
    #[serde(default = "default_true")]
    pub enable_relationship_extraction: bool,
    #[serde(default = "default_true")]
    pub enable_auto_summary: bool,
    #[serde(default = "default_summary_max_length")]
    pub summary_max_length: usize,
    #[serde(default = "default_context_summary_max_length")]
    pub context_summary_max_length: usize,
    #[serde(default)]
    pub search_min_score: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_concurrent_documents: default_max_concurrent(),
            enable_relationship_extraction: true,
            enable_auto_summary: true,
            summary_max_length: default_summary_max_length(),
            context_summary_max_length: default_context_summary_max_length(),
            search_min_score: 0.0,
        }
    }
}

fn default_max_concurrent() -> usize {
    4
}
fn default_true() -> bool {
    true
}
fn default_summary_max_length() -> usize {
    500
}
fn default_context_summary_max_length() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct LanguageConfig {
    /// `local` or `openai`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            dims: default_dims(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    256
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
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

impl Config {
    /// Defaults with the database under `./data`.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/memory.sqlite"),
            },
            chunking: ChunkingConfig::default(),
            memory: MemoryConfig::default(),
            language: LanguageConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn orchestrator_params(&self) -> OrchestratorParams {
        OrchestratorParams {
            chunk_size: self.chunking.chunk_size,
            overlap: self.chunking.overlap,
            max_concurrent_documents: self.memory.max_concurrent_documents,
            enable_relationship_extraction: self.memory.enable_relationship_extraction,
            enable_auto_summary: self.memory.enable_auto_summary,
            summary_max_length: self.memory.summary_max_length,
            context_summary_max_length: self.memory.context_summary_max_length,
            search_min_score: self.memory.search_min_score,
            vector_dims: self.language.dims,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            anyhow::bail!("chunking.overlap must be < chunking.chunk_size");
        }
        if self.memory.max_concurrent_documents == 0 {
            anyhow::bail!("memory.max_concurrent_documents must be >= 1");
        }
        if self.memory.summary_max_length == 0 || self.memory.context_summary_max_length == 0 {
            anyhow::bail!("memory summary lengths must be > 0");
        }
        if !(-1.0..=1.0).contains(&self.memory.search_min_score) {
            anyhow::bail!("memory.search_min_score must be in [-1.0, 1.0]");
        }
        if self.language.dims == 0 {
            anyhow::bail!("language.dims must be > 0");
        }
        match self.language.provider.as_str() {
            "local" | "openai" => {}
            other => anyhow::bail!(
                "Unknown language provider: '{}'. Must be local or openai.",
                other
            ),
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = parse_config("[db]\npath = \"/tmp/m.sqlite\"\n").unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.memory.max_concurrent_documents, 4);
        assert_eq!(config.language.provider, "local");
        assert_eq!(config.server.bind, "127.0.0.1:7340");
    }

    #[test]
    fn test_overrides() {
        let config = parse_config(
            r#"
[db]
path = "m.sqlite"

[chunking]
chunk_size = 200
overlap = 20

[memory]
max_concurrent_documents = 8
enable_auto_summary = false

[language]
provider = "openai"
dims = 1536
"#,
        )
        .unwrap();
        let params = config.orchestrator_params();
        assert_eq!(params.chunk_size, 200);
        assert_eq!(params.max_concurrent_documents, 8);
        assert!(!params.enable_auto_summary);
        assert!(params.enable_relationship_extraction);
        assert_eq!(params.vector_dims, 1536);
    }

    #[test]
    fn test_rejects_overlap_not_below_chunk_size() {
        let err = parse_config("[db]\npath = \"m\"\n[chunking]\nchunk_size = 100\noverlap = 100\n")
            .unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let err =
            parse_config("[db]\npath = \"m\"\n[language]\nprovider = \"carrier-pigeon\"\n").unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn test_minimal_is_valid() {
        let config = Config::minimal();
        assert!(config.validate().is_ok());
        let params = config.orchestrator_params();
        assert_eq!(params.chunk_size, 500);
        assert_eq!(params.vector_dims, 256);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        assert!(parse_config("[db]\npath = \"m\"\n[memory]\nmax_concurrent_documents = 0\n").is_err());
    }
}
