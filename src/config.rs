//! Application configuration.
//!
//! Values come from `Default`, then an optional TOML file, then command-line
//! flags and environment variables applied by the binary. Credentials are
//! never read from the file; the API key comes from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::embedding::openai::{DEFAULT_BASE_URL, DEFAULT_DIMENSION, DEFAULT_MODEL};
use crate::embedding::CallPolicy;
use crate::error::{DocvecError, Result};
use crate::persistence::EngineConfig;
use crate::pipeline::{BatchPolicy, IngestOptions, DEFAULT_K};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub store: StoreSection,
    pub embedding: EmbeddingSection,
    pub corpus: CorpusSection,
    pub search: SearchSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    pub data_dir: PathBuf,
    pub dimension: usize,
    pub checkpoint_interval: usize,
}

impl Default for StoreSection {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            data_dir: PathBuf::from("docvec-data"),
            dimension: engine.dimension,
            checkpoint_interval: engine.checkpoint_interval,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingSection {
    pub model: String,
    pub base_url: String,
    /// Per-call timeout in seconds; unset means no timeout.
    pub timeout_secs: Option<u64>,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Embedding calls in flight during batch ingestion.
    pub concurrency: usize,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: None,
            max_retries: 0,
            retry_backoff_ms: 500,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorpusSection {
    pub dir: PathBuf,
    pub extension: String,
    pub skip_failures: bool,
}

impl Default for CorpusSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            extension: "md".to_string(),
            skip_failures: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSection {
    pub default_k: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            default_k: DEFAULT_K,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// Fallback filter when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file, or return defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    DocvecError::InvalidArgument(format!(
                        "cannot read config {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Self::from_toml(&raw).map_err(|e| match e {
                    DocvecError::InvalidArgument(msg) => DocvecError::InvalidArgument(format!(
                        "{}: {}",
                        path.display(),
                        msg
                    )),
                    other => other,
                })?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| DocvecError::InvalidArgument(e.to_string()))
    }

    /// Reject values the rest of the system cannot work with.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.store.dimension == 0, "store.dimension must be positive"),
            (
                self.store.checkpoint_interval == 0,
                "store.checkpoint_interval must be positive",
            ),
            (self.search.default_k == 0, "search.default_k must be positive"),
            (
                self.embedding.concurrency == 0,
                "embedding.concurrency must be positive",
            ),
            (
                self.embedding.timeout_secs == Some(0),
                "embedding.timeout_secs must be positive when set",
            ),
            (
                self.corpus.extension.is_empty(),
                "corpus.extension must not be empty",
            ),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, msg)) => Err(DocvecError::InvalidArgument(msg.to_string())),
            None => Ok(()),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            dimension: self.store.dimension,
            checkpoint_interval: self.store.checkpoint_interval,
        }
    }

    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            timeout: self.embedding.timeout_secs.map(Duration::from_secs),
            max_retries: self.embedding.max_retries,
            retry_backoff: Duration::from_millis(self.embedding.retry_backoff_ms),
        }
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            policy: if self.corpus.skip_failures {
                BatchPolicy::SkipAndContinue
            } else {
                BatchPolicy::FailFast
            },
            concurrency: self.embedding.concurrency,
            call_policy: self.call_policy(),
        }
    }
}
