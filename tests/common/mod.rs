//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use docvec::embedding::{EmbeddingProvider, ProviderError};
use docvec::vector::Vector;

/// Counts vocabulary words: component `i` is the number of times `vocab[i]`
/// appears in the text.
pub struct KeywordEmbedder {
    vocab: Vec<&'static str>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(vocab: &[&'static str]) -> Self {
        Self {
            vocab: vocab.to_vec(),
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Refuse any text containing `word`.
    pub fn failing_on(mut self, word: &str) -> Self {
        self.failing.insert(word.to_lowercase());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vector, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .collect();

        if words.iter().any(|w| self.failing.contains(w)) {
            return Err(ProviderError::Api {
                status: 429,
                message: "rate limited".to_string(),
            });
        }

        let data = self
            .vocab
            .iter()
            .map(|term| words.iter().filter(|w| w.as_str() == *term).count() as f32)
            .collect();
        Ok(Vector::new(data))
    }

    fn dimension(&self) -> usize {
        self.vocab.len()
    }

    fn model(&self) -> &str {
        "keyword"
    }
}

pub const VOCAB: &[&str] = &[
    "rust",
    "ownership",
    "borrowing",
    "green",
    "tea",
    "brewing",
    "temperature",
    "sql",
    "joins",
    "indexes",
];

/// Write a small markdown corpus (plus one file that must be ignored).
pub fn write_corpus(dir: &Path) {
    std::fs::write(dir.join("a_rust.md"), "Rust ownership\nand borrowing\n").unwrap();
    std::fs::write(dir.join("b_tea.md"), "Green tea\r\nbrewing temperature").unwrap();
    std::fs::write(dir.join("c_sql.md"), "SQL joins and indexes").unwrap();
    std::fs::write(dir.join("notes.txt"), "rust rust rust").unwrap();
}

/// Replace the store's WAL with a device that rejects every write.
#[cfg(target_os = "linux")]
pub fn point_wal_at_full_device(data_dir: &Path) {
    let wal = data_dir.join("wal.log");
    std::fs::remove_file(&wal).unwrap();
    std::os::unix::fs::symlink("/dev/full", &wal).unwrap();
}
