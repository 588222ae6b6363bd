//! Query pipeline: embed the query text and rank the store against it.

use std::sync::Arc;
use std::time::Instant;

use crate::embedding::{embed_with_policy, CallPolicy, EmbeddingProvider};
use crate::error::{DocvecError, Result};
use crate::ranker::{self, RankedResult};
use crate::storage::RecordStore;
use crate::vector::Vector;

/// Number of results returned when the caller does not ask for a specific count.
pub const DEFAULT_K: usize = 3;

pub struct QueryPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    call_policy: CallPolicy,
}

impl QueryPipeline {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_call_policy(embedder, CallPolicy::default())
    }

    pub fn with_call_policy(embedder: Arc<dyn EmbeddingProvider>, call_policy: CallPolicy) -> Self {
        Self {
            embedder,
            call_policy,
        }
    }

    /// Validate the request and fetch the query vector from the provider.
    pub async fn embed_query(&self, query_text: &str, k: usize) -> Result<Vector> {
        validate_request(query_text, k)?;
        let vector = embed_with_policy(self.embedder.as_ref(), query_text, &self.call_policy).await?;
        vector.ensure_finite()?;
        Ok(vector)
    }

    /// Rank every record in `store` against an already embedded query.
    pub fn rank<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        query: &Vector,
        k: usize,
    ) -> Result<Vec<RankedResult>> {
        query.ensure_dimension(store.dimension())?;
        ranker::top_k(query, k, store.all_records())
    }

    /// Embed `query_text` and return the `k` most similar stored documents.
    pub async fn search<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<RankedResult>> {
        let query = self.embed_query(query_text, k).await?;

        let start = Instant::now();
        let results = self.rank(store, &query, k)?;
        tracing::debug!(
            k,
            scanned = store.count(),
            returned = results.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "query ranked"
        );
        Ok(results)
    }
}

fn validate_request(query_text: &str, k: usize) -> Result<()> {
    if query_text.trim().is_empty() {
        return Err(DocvecError::InvalidArgument(
            "query text must not be empty".to_string(),
        ));
    }
    if k == 0 {
        return Err(DocvecError::InvalidArgument(
            "k must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::stub::StubEmbedder;
    use crate::storage::{MemoryStore, RecordId};
    use approx::assert_relative_eq;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new(2);
        store.insert("east".into(), Vector::new(vec![1.0, 0.0])).unwrap();
        store.insert("north".into(), Vector::new(vec![0.0, 1.0])).unwrap();
        store.insert("north-east".into(), Vector::new(vec![1.0, 1.0])).unwrap();
        store
    }

    #[tokio::test]
    async fn test_search_ranks_store() {
        let stub = Arc::new(StubEmbedder::new(2).with("which way is east", vec![1.0, 0.0]));
        let pipeline = QueryPipeline::new(stub);

        let results = pipeline
            .search(&store(), "which way is east", DEFAULT_K)
            .await
            .unwrap();

        let ids: Vec<RecordId> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
        assert_eq!(results[0].text, "east");
        assert_relative_eq!(results[1].score, 0.70710677, epsilon = 1e-5);
    }

    #[tokio::test]
    async fn test_search_bounds_results_by_k() {
        let stub = Arc::new(StubEmbedder::new(2).with("q", vec![0.0, 1.0]));
        let pipeline = QueryPipeline::new(stub);

        let results = pipeline.search(&store(), "q", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 2);
    }

    #[tokio::test]
    async fn test_invalid_arguments_skip_the_provider() {
        let stub = Arc::new(StubEmbedder::new(2).with("q", vec![0.0, 1.0]));
        let pipeline = QueryPipeline::new(stub.clone());

        assert!(matches!(
            pipeline.search(&store(), "   ", 3).await,
            Err(DocvecError::InvalidArgument(_))
        ));
        assert!(matches!(
            pipeline.search(&store(), "q", 0).await,
            Err(DocvecError::InvalidArgument(_))
        ));
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure() {
        let stub = Arc::new(StubEmbedder::new(2).failing("q"));
        let pipeline = QueryPipeline::new(stub);

        assert!(matches!(
            pipeline.search(&store(), "q", 3).await,
            Err(DocvecError::EmbeddingFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let stub = Arc::new(StubEmbedder::new(2).with("q", vec![0.0, 1.0]));
        let pipeline = QueryPipeline::new(stub);

        let results = pipeline.search(&MemoryStore::new(2), "q", 3).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_query_dimension_checked_against_store() {
        let stub = Arc::new(StubEmbedder::new(3).with("q", vec![0.0, 1.0, 0.0]));
        let pipeline = QueryPipeline::new(stub);

        assert!(matches!(
            pipeline.search(&MemoryStore::new(2), "q", 3).await,
            Err(DocvecError::DimensionMismatch { .. })
        ));
    }
}
