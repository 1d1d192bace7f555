// src/remote.rs

//! Configured remote repositories

use crate::error::{Error, Result};
use crate::index::validate_remote_name;
use serde::{Deserialize, Serialize};
use url::Url;

/// A named index URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Protected remotes can be disabled but not removed
    #[serde(default)]
    pub protected: bool,
    /// Per-remote override of `install.auto_install`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_install: Option<bool>,
}

fn default_true() -> bool {
    true
}

impl Remote {
    /// Create an enabled remote after validating its name and URL
    pub fn new(name: &str, url: &str) -> Result<Self> {
        let remote = Self {
            name: name.to_string(),
            url: url.to_string(),
            enabled: true,
            protected: false,
            auto_install: None,
        };
        remote.validate()?;
        Ok(remote)
    }

    pub fn validate(&self) -> Result<()> {
        validate_remote_name(&self.name)?;

        let url = Url::parse(&self.url)
            .map_err(|e| Error::Config(format!("invalid url '{}' for {}: {}", self.url, self.name, e)))?;
        if !matches!(url.scheme(), "http" | "https" | "file") {
            return Err(Error::Config(format!(
                "unsupported url scheme '{}' for {}",
                url.scheme(),
                self.name
            )));
        }
        Ok(())
    }

    /// Effective auto-install setting given the global default
    pub fn auto_install(&self, default: bool) -> bool {
        self.auto_install.unwrap_or(default)
    }
}

/// Ordered set of remotes, unique by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteList {
    remotes: Vec<Remote>,
}

impl RemoteList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by name
    pub fn add(&mut self, remote: Remote) {
        match self.remotes.iter_mut().find(|r| r.name == remote.name) {
            Some(existing) => *existing = remote,
            None => self.remotes.push(remote),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Remote> {
        let position = self.remotes.iter().position(|r| r.name == name)?;
        Some(self.remotes.remove(position))
    }

    pub fn get(&self, name: &str) -> Option<&Remote> {
        self.remotes.iter().find(|r| r.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Remote> {
        self.remotes.iter_mut().find(|r| r.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Remote> {
        self.remotes.iter()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Remote> {
        self.remotes.iter().filter(|r| r.enabled)
    }

    pub fn names(&self) -> Vec<String> {
        self.remotes.iter().map(|r| r.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.remotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remotes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_remote() {
        let remote = Remote::new("ReaTeam", "https://example.com/index.json").unwrap();
        assert!(remote.enabled);
        assert!(!remote.protected);
        assert!(remote.auto_install(true));
    }

    #[test]
    fn test_invalid_remote() {
        assert!(Remote::new("", "https://example.com").is_err());
        assert!(Remote::new("a/b", "https://example.com").is_err());
        assert!(Remote::new("name", "not a url").is_err());
        assert!(Remote::new("name", "ftp://example.com").is_err());
    }

    #[test]
    fn test_auto_install_override() {
        let mut remote = Remote::new("r", "https://example.com").unwrap();
        remote.auto_install = Some(false);
        assert!(!remote.auto_install(true));
    }

    #[test]
    fn test_list_operations() {
        let mut list = RemoteList::new();
        list.add(Remote::new("a", "https://a.example.com").unwrap());
        list.add(Remote::new("b", "https://b.example.com").unwrap());
        assert_eq!(list.len(), 2);

        let mut replacement = Remote::new("a", "https://new.example.com").unwrap();
        replacement.enabled = false;
        list.add(replacement);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get("a").unwrap().url, "https://new.example.com");

        let enabled: Vec<&str> = list.enabled().map(|r| r.name.as_str()).collect();
        assert_eq!(enabled, ["b"]);

        assert!(list.remove("a").is_some());
        assert!(list.remove("a").is_none());
        assert_eq!(list.names(), ["b"]);
    }
}
