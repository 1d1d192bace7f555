// src/layout.rs

//! Path derivation for an install root
//!
//! Everything the package manager reads or writes lives under one root
//! directory. Package files go in the type directories (`Scripts/`,
//! `Effects/`, ...); private state goes in `plugpack/`. No package type
//! installs under `plugpack/`, so downloads staged there can never collide
//! with an installed file.

use crate::filesystem::InstallPath;
use crate::index::IndexCache;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Suffix of in-flight downloads next to their target
pub const PARTIAL_SUFFIX: &str = ".part";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Per-user default: `<data dir>/plugpack-host`, or the working
    /// directory when the platform has no data dir
    pub fn user_default() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join("plugpack-host"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Private state directory
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("plugpack")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir().join("cache")
    }

    pub fn index_cache(&self) -> IndexCache {
        IndexCache::new(self.cache_dir())
    }

    pub fn registry_path(&self) -> PathBuf {
        self.data_dir().join("registry.db")
    }

    /// Downloads in progress
    pub fn staging_dir(&self) -> PathBuf {
        self.data_dir().join("tmp")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir().join("plugpack.lock")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("plugpack.toml")
    }

    /// Absolute location of an install path
    pub fn resolve(&self, path: &InstallPath) -> PathBuf {
        path.under(&self.root)
    }

    /// Fresh temporary download location, unique per call
    pub fn staging_path(&self) -> PathBuf {
        self.staging_dir()
            .join(format!("{}{}", Uuid::new_v4(), PARTIAL_SUFFIX))
    }
}
