//! # docvec
//!
//! Embedding-backed semantic search over a corpus of text documents.
//!
//! This library provides:
//! - An append-only record store with dense ids, in memory or durable (WAL + snapshots)
//! - Exact cosine-similarity ranking with deterministic tie-breaking
//! - Ingestion and query pipelines over a pluggable embedding provider
//! - An OpenAI-compatible HTTP embedding provider and an HTTP API
//!
//! ## Example
//!
//! ```rust
//! use docvec::storage::{MemoryStore, RecordStore};
//! use docvec::ranker::top_k;
//! use docvec::vector::Vector;
//!
//! let mut store = MemoryStore::new(2);
//! store.insert("east".to_string(), Vector::new(vec![1.0, 0.0])).unwrap();
//! store.insert("north".to_string(), Vector::new(vec![0.0, 1.0])).unwrap();
//!
//! let query = Vector::new(vec![0.9, 0.1]);
//! let results = top_k(&query, 3, store.all_records()).unwrap();
//! assert_eq!(results[0].text, "east");
//! ```

pub mod config;
pub mod corpus;
pub mod distance;
pub mod embedding;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod pipeline;
pub mod ranker;
pub mod server;
pub mod storage;
pub mod vector;

pub use embedding::{CallPolicy, EmbeddingProvider, ProviderError};
pub use error::{DocvecError, Result};
pub use persistence::DurableStore;
pub use pipeline::{IngestPipeline, QueryPipeline};
pub use ranker::RankedResult;
pub use storage::{MemoryStore, RecordId, RecordStore, VectorRecord};
pub use vector::Vector;
