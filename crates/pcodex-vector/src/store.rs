use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use pcodex_core::config::IndexConfig;
use pcodex_core::{Chunk, Document, DocumentSummary, Embedder, Error, MarkdownChunker, Result};

use crate::codec::read_vectors;
use crate::index::Index;
use crate::layout::Layout;
use crate::schema::{IndexMeta, FORMAT_VERSION, META_FILE, VECTORS_FILE};
use crate::search::FlatIndex;
use crate::writer::{embed_chunks, write_generation};

const DEFAULT_BATCH_SIZE: usize = 32;
/// Staging directories older than this belong to builds that died.
const STALE_STAGING: Duration = Duration::from_secs(60 * 60);

/// Summary of the active generation, read from its metadata only.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub generation: String,
    pub built_at: DateTime<Utc>,
    pub embedder_id: String,
    pub dim: usize,
    pub count: usize,
    pub documents: Vec<DocumentSummary>,
    pub generations: Vec<String>,
}

/// Owns an index directory. Builds publish a complete generation and then
/// flip `CURRENT`; loads only ever read what `CURRENT` names.
#[derive(Debug, Clone)]
pub struct IndexStore {
    layout: Layout,
    keep_generations: usize,
    batch_size: usize,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: Layout::new(root),
            keep_generations: IndexConfig::default().keep_generations,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &IndexConfig) -> Self {
        Self::new(root).with_keep_generations(config.keep_generations)
    }

    pub fn with_keep_generations(mut self, keep: usize) -> Self {
        self.keep_generations = keep.max(1);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Chunk and index a set of documents. Documents that yield no chunks are
    /// still recorded so they can be suggested as under-represented.
    pub fn build_corpus(&self, embedder: &dyn Embedder, chunker: &MarkdownChunker, docs: &[Document]) -> Result<Index> {
        let mut documents = Vec::with_capacity(docs.len());
        let mut chunks = Vec::new();
        for doc in docs {
            let doc_chunks = chunker.chunk_document(doc);
            documents.push(DocumentSummary { name: doc.name.clone(), chunks: doc_chunks.len() });
            chunks.extend(doc_chunks);
        }
        self.build_with_documents(embedder, documents, chunks)
    }

    /// Embed `chunks` and replace the persisted index with them. An empty
    /// slice produces a valid, empty index.
    pub fn build(&self, embedder: &dyn Embedder, chunks: &[Chunk]) -> Result<Index> {
        let mut documents: Vec<DocumentSummary> = Vec::new();
        for c in chunks {
            match documents.iter_mut().find(|d| d.name == c.source) {
                Some(d) => d.chunks += 1,
                None => documents.push(DocumentSummary { name: c.source.clone(), chunks: 1 }),
            }
        }
        self.build_with_documents(embedder, documents, chunks.to_vec())
    }

    fn build_with_documents(
        &self,
        embedder: &dyn Embedder,
        documents: Vec<DocumentSummary>,
        records: Vec<Chunk>,
    ) -> Result<Index> {
        let dim = embedder.dim();
        if dim == 0 {
            return Err(Error::ModelUnavailable(format!("{} reports zero dimensions", embedder.id())));
        }
        info!(chunks = records.len(), documents = documents.len(), embedder = embedder.id(), "building index");
        let data = embed_chunks(embedder, &records, self.batch_size)?;
        let meta = IndexMeta {
            format_version: FORMAT_VERSION,
            embedder_id: embedder.id().to_string(),
            dim,
            count: records.len(),
            built_at: Utc::now(),
            documents,
            records,
        };

        let generation = write_generation(&self.layout, &meta, &data)?;
        self.layout.set_current(&generation)?;
        info!(generation = %generation, count = meta.count, dim, "published index generation");

        match self.layout.prune(self.keep_generations, &generation) {
            Ok(removed) if !removed.is_empty() => info!(removed = removed.len(), "pruned old generations"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to list generations for pruning"),
        }
        match self.layout.sweep_staging(STALE_STAGING) {
            Ok(removed) if !removed.is_empty() => info!(removed = removed.len(), "removed stale staging directories"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "failed to sweep staging directories"),
        }

        Index::from_parts(Some(generation), meta, FlatIndex::new(dim, data)?)
    }

    /// Load the generation named by `CURRENT`.
    pub fn load(&self) -> Result<Index> {
        let generation = self.current()?;
        let dir = self.layout.generation_dir(&generation);
        if !dir.is_dir() {
            return Err(Error::index_missing(format!("generation {generation} is missing from {}", dir.display())));
        }

        let vectors_path = dir.join(VECTORS_FILE);
        let file = File::open(&vectors_path).map_err(|e| missing_artifact(&vectors_path, &e))?;
        let (header, data) =
            read_vectors(&mut BufReader::new(file)).map_err(|e| missing_artifact(&vectors_path, &e))?;
        let meta = read_meta(&dir)?;
        if header.count != meta.count {
            return Err(Error::index_missing(format!(
                "{} holds {} vectors but {} declares {}",
                VECTORS_FILE, header.count, META_FILE, meta.count
            )));
        }
        let index = Index::from_parts(Some(generation), meta, FlatIndex::new(header.dim, data)?)?;
        info!(generation = index.generation().unwrap_or_default(), count = index.len(), "loaded index");
        Ok(index)
    }

    pub fn status(&self) -> Result<IndexStatus> {
        let generation = self.current()?;
        let meta = read_meta(&self.layout.generation_dir(&generation))?;
        Ok(IndexStatus {
            generation,
            built_at: meta.built_at,
            embedder_id: meta.embedder_id,
            dim: meta.dim,
            count: meta.count,
            documents: meta.documents,
            generations: self.layout.list_generations()?,
        })
    }

    /// Generation ids on disk, oldest first.
    pub fn generations(&self) -> Result<Vec<String>> {
        self.layout.list_generations()
    }

    fn current(&self) -> Result<String> {
        self.layout
            .read_current()?
            .ok_or_else(|| Error::index_missing(format!("no index has been built in {}", self.root().display())))
    }
}

fn read_meta(dir: &Path) -> Result<IndexMeta> {
    let path = dir.join(META_FILE);
    let file = File::open(&path).map_err(|e| missing_artifact(&path, &e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::index_missing(format!("unreadable {}: {e}", path.display())))
}

fn missing_artifact(path: &Path, err: &io::Error) -> Error {
    Error::index_missing(format!("{}: {err}", path.display()))
}
