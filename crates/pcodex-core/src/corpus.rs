//! Source document loading.
//!
//! Walks the data directory, keeps files with a configured extension and reads
//! them in a stable (sorted) order so rebuilds are reproducible.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::Document;

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<Document>,
}

impl Corpus {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Load every matching file under `data_dir`. A directory without matching
    /// files is an empty corpus, not an error.
    pub fn load<S: AsRef<str>>(data_dir: &Path, extensions: &[S]) -> Result<Self> {
        if !data_dir.is_dir() {
            return Err(Error::NotFound(format!("data directory {}", data_dir.display())));
        }
        let files = list_files(data_dir, extensions);
        if files.is_empty() {
            warn!(dir = %data_dir.display(), "no documents found");
            return Ok(Self::default());
        }
        let mut documents = Vec::with_capacity(files.len());
        for (file_index, path) in files.iter().enumerate() {
            debug!("Reading file {}/{}: {}", file_index + 1, files.len(), path.display());
            let text = read_file_content(path)?;
            let name = document_name(path, data_dir);
            documents.push(Document { name, path: path.clone(), text });
        }
        info!(dir = %data_dir.display(), documents = documents.len(), "loaded corpus");
        Ok(Self { documents })
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn names(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

/// Path relative to the data directory with `/` separators.
fn document_name(file_path: &Path, data_dir: &Path) -> String {
    let relative = file_path.strip_prefix(data_dir).unwrap_or(file_path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn list_files<S: AsRef<str>>(root: &Path, extensions: &[S]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| extensions.iter().any(|want| want.as_ref().eq_ignore_ascii_case(ext)))
        })
        .collect();
    files.sort();
    files
}
