//! Directory corpus loader

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DocvecError, Result};

/// One raw document read from the corpus directory.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusDocument {
    pub path: PathBuf,
    pub text: String,
}

/// Read every regular file in `dir` whose extension is `extension`.
///
/// Documents are returned sorted by file name; that order decides the order
/// in which ids are assigned. Subdirectories are not descended into.
pub fn load_corpus(dir: impl AsRef<Path>, extension: &str) -> Result<Vec<CorpusDocument>> {
    let dir = dir.as_ref();
    let unavailable = |source| DocvecError::CorpusUnavailable {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(unavailable)? {
        let entry = entry.map_err(unavailable)?;
        let path = entry.path();
        if !entry.file_type().map_err(unavailable)?.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if paths.is_empty() {
        return Err(DocvecError::CorpusEmpty(format!(
            "no .{} files in {}",
            extension,
            dir.display()
        )));
    }

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(&path).map_err(|source| DocvecError::CorpusUnavailable {
            path: path.clone(),
            source,
        })?;
        documents.push(CorpusDocument { path, text });
    }

    tracing::debug!(dir = %dir.display(), documents = documents.len(), "corpus loaded");
    Ok(documents)
}
