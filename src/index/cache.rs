// src/index/cache.rs

//! On-disk copies of fetched index documents, one file per remote

use super::{BuildTarget, Index, validate_remote_name};
use crate::error::Result;
use crate::filesystem::{move_file_atomic, remove_file_if_exists};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct IndexCache {
    dir: PathBuf,
}

impl IndexCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<remote>.json`
    pub fn path(&self, remote: &str) -> PathBuf {
        self.dir.join(format!("{remote}.json"))
    }

    pub fn exists(&self, remote: &str) -> bool {
        self.path(remote).is_file()
    }

    /// Whether the cached copy is younger than `max_age`
    ///
    /// A zero `max_age` never counts as fresh.
    pub fn is_fresh(&self, remote: &str, max_age: Duration) -> bool {
        if max_age.is_zero() {
            return false;
        }

        let modified = match fs::metadata(self.path(remote)).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return false,
        };

        match SystemTime::now().duration_since(modified) {
            Ok(age) => age < max_age,
            // Modified in the future: clock skew, trust the copy
            Err(_) => true,
        }
    }

    /// Parse the cached document of `remote`
    pub fn load(&self, remote: &str, target: BuildTarget) -> Result<Index> {
        let text = fs::read_to_string(self.path(remote))?;
        Index::from_json_for(remote, &text, target)
    }

    /// Replace the cached document, never leaving a partial file behind
    pub fn store(&self, remote: &str, content: &[u8]) -> Result<()> {
        validate_remote_name(remote)?;
        fs::create_dir_all(&self.dir)?;

        let path = self.path(remote);
        let temp = self.dir.join(format!("{remote}.json.part"));
        fs::write(&temp, content)?;
        move_file_atomic(&temp, &path)?;

        debug!("Cached index of {} at {}", remote, path.display());
        Ok(())
    }

    pub fn remove(&self, remote: &str) -> Result<()> {
        remove_file_if_exists(&self.path(remote))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const DOC: &str = r#"{"version": 1, "categories": []}"#;

    #[test]
    fn test_store_and_load() {
        let dir = tempdir().unwrap();
        let cache = IndexCache::new(dir.path().join("cache"));

        assert!(!cache.exists("remote"));
        cache.store("remote", DOC.as_bytes()).unwrap();
        assert!(cache.exists("remote"));
        assert!(!dir.path().join("cache/remote.json.part").exists());

        let index = cache.load("remote", BuildTarget::Other).unwrap();
        assert_eq!(index.name(), "remote");
    }

    #[test]
    fn test_freshness() {
        let dir = tempdir().unwrap();
        let cache = IndexCache::new(dir.path());

        assert!(!cache.is_fresh("remote", Duration::from_secs(3600)));
        cache.store("remote", DOC.as_bytes()).unwrap();
        assert!(cache.is_fresh("remote", Duration::from_secs(3600)));
        assert!(!cache.is_fresh("remote", Duration::ZERO));
    }

    #[test]
    fn test_remove() {
        let dir = tempdir().unwrap();
        let cache = IndexCache::new(dir.path());
        cache.store("remote", DOC.as_bytes()).unwrap();

        cache.remove("remote").unwrap();
        assert!(!cache.exists("remote"));
        cache.remove("remote").unwrap();
    }

    #[test]
    fn test_store_rejects_bad_names() {
        let dir = tempdir().unwrap();
        let cache = IndexCache::new(dir.path());
        assert!(cache.store("../escape", DOC.as_bytes()).is_err());
    }
}
