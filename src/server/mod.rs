//! HTTP API for ingesting and searching documents.

pub mod routes;

use crate::metrics::MetricsCollector;
use crate::pipeline::{IngestPipeline, QueryPipeline};
use crate::storage::RecordStore;
use std::sync::{Arc, RwLock};

/// Shared application state for the HTTP server.
///
/// The store lock is only taken for the insert or the ranking scan; embedding
/// calls happen before it is acquired. Inserts serialize on the write lock.
pub struct AppState<S: RecordStore> {
    pub store: RwLock<S>,
    pub ingest: IngestPipeline,
    pub query: QueryPipeline,
    pub metrics: RwLock<MetricsCollector>,
    pub default_k: usize,
}

impl<S: RecordStore> AppState<S> {
    pub fn new(store: S, ingest: IngestPipeline, query: QueryPipeline, default_k: usize) -> Self {
        Self {
            store: RwLock::new(store),
            ingest,
            query,
            metrics: RwLock::new(MetricsCollector::new()),
            default_k,
        }
    }
}

/// Serve the API on `addr` until the process is stopped.
pub async fn serve<S>(addr: &str, state: AppState<S>) -> anyhow::Result<()>
where
    S: RecordStore + Send + Sync + 'static,
{
    let app = routes::create_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
