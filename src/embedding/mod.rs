//! Embedding providers: the text -> vector boundary.
//!
//! The pipelines only see [`EmbeddingProvider`]. Timeouts and retries are
//! applied around a provider by [`embed_with_policy`] according to an
//! explicit [`CallPolicy`]; by default neither is used, so each document
//! causes exactly one provider call.

pub mod openai;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{DocvecError, Result};
use crate::vector::Vector;

pub use openai::OpenAiEmbedder;

/// Failures reported by an embedding provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Turns text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> std::result::Result<Vector, ProviderError>;

    /// Dimension of the vectors this provider produces.
    fn dimension(&self) -> usize;

    /// Model identifier, for logs and status output.
    fn model(&self) -> &str;
}

/// How a provider call is bounded and retried.
#[derive(Debug, Clone, PartialEq)]
pub struct CallPolicy {
    /// Per-attempt limit. `None` waits as long as the provider takes.
    pub timeout: Option<Duration>,
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// Fixed pause between attempts.
    pub retry_backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: None,
            max_retries: 0,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Call `provider` once, plus up to `policy.max_retries` more times on failure.
///
/// A timed-out attempt yields [`DocvecError::EmbeddingTimeout`]; any other
/// provider failure yields [`DocvecError::EmbeddingFailed`]. The error of the
/// last attempt is returned.
pub async fn embed_with_policy(
    provider: &dyn EmbeddingProvider,
    text: &str,
    policy: &CallPolicy,
) -> Result<Vector> {
    let mut attempt = 0u32;
    loop {
        let outcome = match policy.timeout {
            Some(limit) => match tokio::time::timeout(limit, provider.embed(text)).await {
                Ok(result) => result.map_err(DocvecError::from),
                Err(_) => Err(DocvecError::EmbeddingTimeout { after: limit }),
            },
            None => provider.embed(text).await.map_err(DocvecError::from),
        };

        match outcome {
            Ok(vector) => return Ok(vector),
            Err(e) if attempt < policy.max_retries => {
                attempt += 1;
                tracing::warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    error = %e,
                    "embedding call failed, retrying"
                );
                tokio::time::sleep(policy.retry_backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
