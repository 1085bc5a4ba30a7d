//! Build-time embedding and generation staging.
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use pcodex_core::types::l2_normalize;
use pcodex_core::{Chunk, Embedder, Error, Result};

use crate::codec::write_vectors;
use crate::layout::Layout;
use crate::schema::{IndexMeta, META_FILE, STAGING_PREFIX, VECTORS_FILE};

/// Embed chunk texts in batches, returning a row-major matrix in chunk order.
///
/// Every row is checked for the embedder's dimension and re-normalized; a
/// zero vector means the model produced nothing usable.
pub(crate) fn embed_chunks(embedder: &dyn Embedder, chunks: &[Chunk], batch_size: usize) -> Result<Vec<f32>> {
    let dim = embedder.dim();
    let batch_size = batch_size.max(1);
    let pb = if chunks.len() > batch_size { ProgressBar::new(chunks.len() as u64) } else { ProgressBar::hidden() };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let mut data = Vec::with_capacity(chunks.len() * dim);
    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != batch.len() {
            return Err(Error::ModelUnavailable(format!(
                "{} returned {} vectors for {} texts",
                embedder.id(),
                vectors.len(),
                batch.len()
            )));
        }
        for (chunk, mut v) in batch.iter().zip(vectors) {
            if v.len() != dim {
                return Err(Error::ModelUnavailable(format!(
                    "{} returned a {}-d vector for {}, expected {dim}",
                    embedder.id(),
                    v.len(),
                    chunk.id
                )));
            }
            if l2_normalize(&mut v) == 0.0 {
                return Err(Error::ModelUnavailable(format!("{} returned a zero vector for {}", embedder.id(), chunk.id)));
            }
            data.extend_from_slice(&v);
        }
        pb.inc(batch.len() as u64);
        debug!(done = pb.position(), total = chunks.len(), "embedded batch");
    }
    pb.finish_and_clear();
    Ok(data)
}

/// Write both artifacts into a hidden staging directory, then move it under
/// `generations/`. Returns the new generation id. Nothing is visible to
/// readers until the caller flips `CURRENT`.
pub(crate) fn write_generation(layout: &Layout, meta: &IndexMeta, data: &[f32]) -> Result<String> {
    layout.ensure()?;
    let meta_bytes = serde_json::to_vec_pretty(meta)?;
    let staging = tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir_in(layout.root())?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(&meta_bytes);
    for x in data {
        hasher.update(&x.to_le_bytes());
    }

    write_file(&staging.path().join(VECTORS_FILE), |w| Ok(write_vectors(w, meta.dim, data)?))?;
    write_file(&staging.path().join(META_FILE), |w| Ok(w.write_all(&meta_bytes)?))?;

    let id = generation_id(layout, meta, &hasher.finalize().to_hex())?;
    let staged = staging.keep();
    if let Err(e) = fs::rename(&staged, layout.generation_dir(&id)) {
        let _ = fs::remove_dir_all(&staged);
        return Err(e.into());
    }
    Ok(id)
}

fn write_file(path: &Path, body: impl FnOnce(&mut BufWriter<File>) -> Result<()>) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    body(&mut w)?;
    let file = w.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

/// `<sequence>-<UTC timestamp>-<8 hex of content digest>`. The zero-padded
/// sequence keeps lexical order equal to build order even within one
/// millisecond.
fn generation_id(layout: &Layout, meta: &IndexMeta, digest: &str) -> Result<String> {
    let mut seq = layout
        .list_generations()?
        .iter()
        .filter_map(|id| id.split('-').next()?.parse::<u64>().ok())
        .max()
        .map_or(1, |last| last + 1);
    let stamp = meta.built_at.format("%Y%m%dT%H%M%S%3fZ");
    loop {
        let id = format!("{seq:06}-{stamp}-{}", &digest[..8]);
        if !layout.generation_dir(&id).exists() {
            return Ok(id);
        }
        seq += 1;
    }
}
