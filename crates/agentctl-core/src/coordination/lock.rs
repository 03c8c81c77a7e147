//! Advisory file locks serializing table mutations across processes.
//!
//! Lock files live next to the tables and are never deleted, so two
//! processes can never end up locking different inodes for the same table.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use fs2::FileExt;

use crate::{Error, Result};

/// Exclusive lock held for the lifetime of the guard.
#[derive(Debug)]
pub struct TableLock {
    file: File,
    lock_path: PathBuf,
}

impl TableLock {
    /// Block until the exclusive lock on `lock_path` is acquired.
    ///
    /// The lock file is created if missing; its parent directory must exist.
    pub fn acquire(lock_path: &Path) -> Result<Self> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| {
                Error::storage(format!(
                    "Failed to open lock file {}: {e}",
                    lock_path.display()
                ))
            })?;

        FileExt::lock_exclusive(&file).map_err(|e| {
            Error::storage(format!(
                "Failed to acquire lock {}: {e}",
                lock_path.display()
            ))
        })?;

        tracing::debug!("Acquired table lock: {}", lock_path.display());
        Ok(Self {
            file,
            lock_path: lock_path.to_path_buf(),
        })
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for TableLock {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock as well
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::debug!("Failed to unlock {}: {e}", self.lock_path.display());
        }
        tracing::debug!("Released table lock: {}", self.lock_path.display());
    }
}
