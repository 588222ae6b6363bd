//! Ingestion and query pipelines.
//!
//! Both pipelines receive their embedding provider at construction and the
//! record store per call, so the caller decides how the store is shared.

pub mod ingest;
pub mod query;

pub use ingest::{BatchPolicy, BatchReport, IngestOptions, IngestPipeline, PreparedDocument};
pub use query::{QueryPipeline, DEFAULT_K};

/// Turn each line break into a single space, then trim surrounding whitespace.
pub fn normalize_text(raw: &str) -> String {
    raw.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  # Title\nbody line\n"), "# Title body line");
        assert_eq!(normalize_text("a\r\nb\rc"), "a b c");
        assert_eq!(normalize_text("a\n\nb"), "a  b");
        assert_eq!(normalize_text("\n \t\n"), "");
    }
}
