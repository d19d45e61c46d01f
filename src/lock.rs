// src/lock.rs

//! Run lock preventing two migrations on one host
//!
//! The engine itself assumes a single instance. The CLI takes this lock
//! before starting a run and holds it until the process exits.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Exclusive `flock` on the run lock file
pub struct RunLock {
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Try to acquire the lock without blocking
    ///
    /// Returns:
    /// - `Ok(Some(lock))` if the lock was acquired
    /// - `Ok(None)` if another process holds it
    /// - `Err` on I/O errors
    pub fn try_acquire<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired run lock at {}", path.display());
                let lock = Self { file, path };
                lock.write_pid()?;
                Ok(Some(lock))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                info!("Run lock already held at {}", path.display());
                Ok(None)
            }
            Err(e) => Err(Error::LockError(format!(
                "Failed to acquire run lock {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID recorded by the current holder, if any
    pub fn holder_pid<P: AsRef<Path>>(lock_path: P) -> Option<u32> {
        fs::read_to_string(lock_path.as_ref().with_extension("pid"))
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    fn write_pid(&self) -> Result<()> {
        fs::write(self.path.with_extension("pid"), std::process::id().to_string())?;
        Ok(())
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(self.path.with_extension("pid"));
        debug!("Released run lock at {}", self.path.display());
    }
}
