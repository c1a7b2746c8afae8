use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub transcript: TranscriptConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// External transcript service settings. The service itself is a black box
/// returning time-aligned segments for a media id.
#[derive(Debug, Deserialize, Clone)]
pub struct TranscriptConfig {
    pub base_url: String,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_languages() -> Vec<String> {
    ["fr", "fr-FR", "en", "en-US", "es", "de", "it", "pt"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Bucket-style object storage for transcript blobs. The service token is
/// read from the `STORAGE_SERVICE_KEY` environment variable, never from the
/// config file.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub base_url: String,
    pub bucket: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Whether the bucket serves objects at public URLs. When false, URLs
    /// are minted as signed links with `signed_ttl_secs` time-to-live.
    #[serde(default)]
    pub public: bool,
    #[serde(default = "default_signed_ttl")]
    pub signed_ttl_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_prefix() -> String {
    "transcripts".to_string()
}
fn default_signed_ttl() -> u64 {
    3600
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_words")]
    pub max_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_words: default_max_words(),
        }
    }
}

fn default_max_words() -> usize {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
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
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
        }
    }
}

fn default_limit() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Cooldown after processing a job, before the invocation exits.
    #[serde(default = "default_sleep_after")]
    pub sleep_after_secs: u64,
    /// Reuse the stored object (skip fetch and reingest) when it exists.
    #[serde(default = "default_true")]
    pub skip_if_exists: bool,
    /// Store an empty transcript object when the source has no segments.
    #[serde(default)]
    pub upload_if_empty: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sleep_after_secs: default_sleep_after(),
            skip_if_exists: true,
            upload_if_empty: false,
        }
    }
}

fn default_sleep_after() -> u64 {
    5
}
fn default_true() -> bool {
    true
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_words == 0 {
        anyhow::bail!("chunking.max_words must be > 0");
    }

    if config.retrieval.limit == 0 {
        anyhow::bail!("retrieval.limit must be >= 1");
    }

    if config.storage.bucket.trim().is_empty() {
        anyhow::bail!("storage.bucket must not be empty");
    }

    if config.transcript.languages.is_empty() {
        anyhow::bail!("transcript.languages must list at least one language");
    }

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
        "disabled" | "openai" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or local.",
            other
        ),
    }

    Ok(config)
}
