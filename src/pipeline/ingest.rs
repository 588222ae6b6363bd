//! Ingestion pipeline: normalize, embed, insert.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::embedding::{embed_with_policy, CallPolicy, EmbeddingProvider};
use crate::error::{DocvecError, Result};
use crate::pipeline::normalize_text;
use crate::storage::{RecordId, RecordStore};
use crate::vector::Vector;

/// What to do when one document of a batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Stop at the first failure. Earlier inserts keep their ids.
    #[default]
    FailFast,
    /// Record the failure in the report and move on to the next document.
    /// Storage failures still abort the batch.
    SkipAndContinue,
}

/// Tuning for [`IngestPipeline`].
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub policy: BatchPolicy,
    /// Maximum embedding calls in flight. Inserts stay sequential and in order.
    pub concurrency: usize,
    pub call_policy: CallPolicy,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            policy: BatchPolicy::FailFast,
            concurrency: 1,
            call_policy: CallPolicy::default(),
        }
    }
}

/// A normalized document with its embedding, ready to be stored.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub text: String,
    pub vector: Vector,
}

/// A document that was skipped under [`BatchPolicy::SkipAndContinue`].
#[derive(Debug)]
pub struct SkippedDocument {
    /// Position of the document in the batch, starting at 0.
    pub index: usize,
    pub error: DocvecError,
}

/// Outcome of a batch ingestion.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Ids of stored documents, in batch order.
    pub ingested: Vec<RecordId>,
    pub skipped: Vec<SkippedDocument>,
}

/// Normalizes raw documents, embeds them and writes them to a store.
pub struct IngestPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    options: IngestOptions,
}

impl IngestPipeline {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_options(embedder, IngestOptions::default())
    }

    pub fn with_options(embedder: Arc<dyn EmbeddingProvider>, options: IngestOptions) -> Self {
        Self { embedder, options }
    }

    /// Normalize and embed a document without touching any store.
    pub async fn prepare(&self, raw_text: &str) -> Result<PreparedDocument> {
        let text = normalize_text(raw_text);
        let vector =
            embed_with_policy(self.embedder.as_ref(), &text, &self.options.call_policy).await?;
        Ok(PreparedDocument { text, vector })
    }

    /// Write a prepared document; the store assigns its id.
    pub fn commit<S: RecordStore + ?Sized>(
        &self,
        store: &mut S,
        document: PreparedDocument,
    ) -> Result<RecordId> {
        store.insert(document.text, document.vector)
    }

    /// Ingest a single document.
    pub async fn ingest<S: RecordStore + ?Sized>(
        &self,
        store: &mut S,
        raw_text: &str,
    ) -> Result<RecordId> {
        let document = self.prepare(raw_text).await?;
        self.commit(store, document)
    }

    /// Ingest documents in order.
    ///
    /// Up to `concurrency` documents are embedded at once, but results are
    /// consumed in batch order and inserted one by one, so ids follow the
    /// batch order. An empty batch fails with [`DocvecError::CorpusEmpty`].
    /// Under [`BatchPolicy::FailFast`] the first failure is returned as
    /// [`DocvecError::BatchAborted`].
    pub async fn ingest_batch<S, T>(&self, store: &mut S, texts: &[T]) -> Result<BatchReport>
    where
        S: RecordStore + ?Sized,
        T: AsRef<str>,
    {
        if texts.is_empty() {
            return Err(DocvecError::CorpusEmpty(
                "batch contains no documents".to_string(),
            ));
        }

        let mut prepared = stream::iter(texts.iter().map(|t| self.prepare(t.as_ref())))
            .buffered(self.options.concurrency.max(1));

        let mut report = BatchReport::default();
        let mut index = 0;
        while let Some(outcome) = prepared.next().await {
            match outcome.and_then(|document| self.commit(store, document)) {
                Ok(id) => {
                    tracing::debug!(index, id, "document ingested");
                    report.ingested.push(id);
                }
                Err(error)
                    if self.options.policy == BatchPolicy::SkipAndContinue
                        && is_document_error(&error) =>
                {
                    tracing::warn!(index, error = %error, "skipping document");
                    report.skipped.push(SkippedDocument { index, error });
                }
                Err(error) => {
                    tracing::error!(index, error = %error, "aborting batch");
                    return Err(DocvecError::BatchAborted {
                        index,
                        ingested: report.ingested.len(),
                        source: Box::new(error),
                    });
                }
            }
            index += 1;
        }

        tracing::info!(
            ingested = report.ingested.len(),
            skipped = report.skipped.len(),
            model = self.embedder.model(),
            "batch ingestion finished"
        );
        Ok(report)
    }
}

/// Failures confined to one document, as opposed to the store itself.
fn is_document_error(error: &DocvecError) -> bool {
    matches!(
        error,
        DocvecError::EmbeddingFailed(_)
            | DocvecError::EmbeddingTimeout { .. }
            | DocvecError::DimensionMismatch { .. }
            | DocvecError::InvalidVector { .. }
    )
}
