// src/lock.rs

//! Exclusive lock on an install root
//!
//! Every operation that opens the registry holds this lock for as long as
//! the registry connection lives: transactions for their whole run, the
//! query commands for the duration of the command. The lock is an
//! `flock(LOCK_EX)` on `plugpack/plugpack.lock` and is released on drop.

use crate::error::{Error, Result};
use crate::layout::Layout;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct RootLock {
    /// Kept open to hold the lock
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl RootLock {
    /// Lock the install root of `layout` without blocking
    ///
    /// Fails with [`Error::Locked`] when another holder has it.
    pub fn try_acquire(layout: &Layout) -> Result<Self> {
        fs::create_dir_all(layout.data_dir())?;

        let path = layout.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired root lock at {}", path.display());
                Ok(Self { file, path })
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Err(Error::Locked(
                format!("{}: held by another operation", path.display()),
            )),
            Err(e) => Err(Error::Locked(format!("{}: {e}", path.display()))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_root_lock_is_exclusive() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());

        let lock = RootLock::try_acquire(&layout).unwrap();
        assert_eq!(lock.path(), layout.lock_path());
        assert!(matches!(
            RootLock::try_acquire(&layout),
            Err(Error::Locked(_))
        ));

        drop(lock);
        assert!(RootLock::try_acquire(&layout).is_ok());
    }
}
