//! Directory layout of a persisted index and the `CURRENT` pointer.
//!
//! ```text
//! <root>/CURRENT                      name of the active generation
//! <root>/generations/<id>/vectors.bin
//! <root>/generations/<id>/meta.json
//! <root>/.staging-*                   in-progress builds
//! ```
//!
//! Generation ids start with a zero-padded sequence number, so lexical order
//! is build order.
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use pcodex_core::Result;

use crate::schema::{CURRENT_FILE, GENERATIONS_DIR, STAGING_PREFIX};

#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn generations_dir(&self) -> PathBuf {
        self.root.join(GENERATIONS_DIR)
    }

    pub fn generation_dir(&self, id: &str) -> PathBuf {
        self.generations_dir().join(id)
    }

    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(self.generations_dir())?;
        Ok(())
    }

    /// Active generation, or `None` when nothing has been published yet.
    pub fn read_current(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.root.join(CURRENT_FILE)) {
            Ok(s) => {
                let id = s.trim();
                Ok((!id.is_empty()).then(|| id.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace `CURRENT` with a rename so readers see the old or the new id,
    /// never a torn write.
    pub fn set_current(&self, id: &str) -> Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        writeln!(tmp, "{id}")?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.root.join(CURRENT_FILE)).map_err(|e| e.error)?;
        debug!(generation = id, "CURRENT updated");
        Ok(())
    }

    /// Generation ids, oldest first.
    pub fn list_generations(&self) -> Result<Vec<String>> {
        let dir = self.generations_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Remove all but the newest `keep` generations, never touching `active`.
    /// Failures are logged; a stale generation costs disk space only.
    pub fn prune(&self, keep: usize, active: &str) -> Result<Vec<String>> {
        let ids = self.list_generations()?;
        let excess = ids.len().saturating_sub(keep.max(1));
        let mut removed = Vec::new();
        for id in ids.into_iter().take(excess).filter(|id| id != active) {
            match fs::remove_dir_all(self.generation_dir(&id)) {
                Ok(()) => removed.push(id),
                Err(e) => warn!(generation = %id, error = %e, "failed to prune generation"),
            }
        }
        Ok(removed)
    }

    /// Remove staging directories left by builds that died before publishing.
    /// Only directories untouched for `older_than` are removed, so a build
    /// running in another process keeps its staging area.
    pub fn sweep_staging(&self, older_than: Duration) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        if !self.root.is_dir() {
            return Ok(removed);
        }
        let now = SystemTime::now();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) || !entry.file_type()?.is_dir() {
                continue;
            }
            let age = entry
                .metadata()?
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            if age < older_than {
                continue;
            }
            let path = entry.path();
            match fs::remove_dir_all(&path) {
                Ok(()) => removed.push(path),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale staging directory"),
            }
        }
        Ok(removed)
    }
}
