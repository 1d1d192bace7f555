// src/filesystem/mod.rs

//! Filesystem helpers for placing downloaded files
//!
//! - `path`: traversal-safe relative install paths
//! - `move_file_atomic`: rename with a cross-filesystem fallback

pub mod path;

pub use path::InstallPath;

use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::debug;

/// Move a file into place, falling back to copy+sync+delete when `src` and
/// `dst` live on different filesystems (EXDEV).
pub fn move_file_atomic(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
            debug!(
                "Cross-filesystem move ({} -> {}), copying instead",
                src.display(),
                dst.display()
            );

            fs::copy(src, dst)?;
            File::open(dst)?.sync_all()?;

            if let Some(parent) = dst.parent()
                && let Ok(dir) = File::open(parent)
            {
                // Not every filesystem supports fsync on directories
                let _ = dir.sync_all();
            }

            fs::remove_file(src)
        }
        Err(e) => Err(e),
    }
}

/// Remove a file, treating "already gone" as success
pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
