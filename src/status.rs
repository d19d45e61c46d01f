// src/status.rs

//! Durable stage completion tracking
//!
//! The status document is a flat JSON object mapping stage keys to `true`.
//! It is what makes the migration resumable: a stage whose key is set is
//! never entered again.
//!
//! Every update is a whole-document read-modify-write performed under an
//! exclusive lock on a sibling `.lock` file. The new document is written to
//! a temporary file in the same directory, fsynced, and renamed over the old
//! one, so a crash leaves either the previous or the new document.

use crate::error::{Error, Result};
use fs2::FileExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Stage key → completed
pub type StatusDocument = BTreeMap<String, bool>;

/// Persistent record of completed stages
#[derive(Debug, Clone)]
pub struct StatusStore {
    path: PathBuf,
}

impl StatusStore {
    /// Bind to a status document path (no I/O is performed)
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path to the status document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file locked across each update (`<document>.lock`)
    pub fn lock_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Whether a stage has completed
    ///
    /// A missing document or key means "not completed". Read and parse
    /// failures are logged and also reported as not completed.
    pub fn get_stage_status(&self, stage: &str) -> bool {
        match self.load() {
            Ok(doc) => doc.get(stage).copied().unwrap_or(false),
            Err(e) => {
                warn!("Could not read status of stage '{}': {}", stage, e);
                false
            }
        }
    }

    /// Record a stage as successfully completed
    pub fn set_stage_completed(&self, stage: &str) -> Result<()> {
        self.update(|doc| {
            doc.insert(stage.to_string(), true);
        })?;
        debug!("Stage '{}' marked complete in {}", stage, self.path.display());
        Ok(())
    }

    /// Remove a stage key so the stage runs again on the next invocation
    ///
    /// Returns whether the key was present.
    pub fn clear_stage(&self, stage: &str) -> Result<bool> {
        let mut removed = false;
        self.update(|doc| {
            removed = doc.remove(stage).is_some();
        })?;
        Ok(removed)
    }

    /// Import the document at `legacy` when this store has none yet
    ///
    /// Lets a migration recorded at an older location resume here. Returns
    /// whether anything was imported; the legacy document is left in place.
    pub fn adopt(&self, legacy: &Path) -> Result<bool> {
        if self.path.exists() || legacy == self.path || !legacy.exists() {
            return Ok(false);
        }
        let imported = StatusStore::open(legacy).load()?;
        if imported.is_empty() {
            return Ok(false);
        }
        self.update(|doc| {
            for (key, done) in imported {
                doc.entry(key).or_insert(done);
            }
        })?;
        info!(
            "Imported stage status from {} into {}",
            legacy.display(),
            self.path.display()
        );
        Ok(true)
    }

    /// Read the whole document (empty when it does not exist)
    pub fn load(&self) -> Result<StatusDocument> {
        if !self.path.exists() {
            return Ok(StatusDocument::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(StatusDocument::new());
        }
        serde_json::from_str(&content).map_err(|e| Error::StatusError {
            path: self.path.clone(),
            reason: format!("corrupt document: {}", e),
        })
    }

    fn update(&self, apply: impl FnOnce(&mut StatusDocument)) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let lock = self.lock()?;

        let mut doc = self.load()?;
        apply(&mut doc);

        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        temp.write_all(&render(&doc)?)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::StatusError {
            path: self.path.clone(),
            reason: format!("failed to replace document: {}", e.error),
        })?;

        drop(lock);
        Ok(())
    }

    fn lock(&self) -> Result<StatusLock> {
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        file.lock_exclusive().map_err(|e| {
            Error::LockError(format!(
                "Failed to lock {}: {}",
                lock_path.display(),
                e
            ))
        })?;
        Ok(StatusLock { file })
    }
}

/// Exclusive lock held across one read-modify-write
struct StatusLock {
    file: File,
}

impl Drop for StatusLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn render(doc: &StatusDocument) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    doc.serialize(&mut serializer)?;
    buffer.push(b'\n');
    Ok(buffer)
}
