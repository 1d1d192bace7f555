// src/config.rs

//! `plugpack.toml` configuration
//!
//! ```toml
//! [install]
//! auto_install = true
//! bleeding_edge = false
//! prompt_obsolete = true
//!
//! [network]
//! timeout_secs = 30
//! workers = 4
//! stale_threshold_secs = 0
//!
//! [[remotes]]
//! name = "ReaTeam Scripts"
//! url = "https://example.com/index.json"
//! protected = true
//! ```

use crate::error::Result;
use crate::remote::RemoteList;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub install: InstallOptions,
    pub network: NetworkOptions,
    pub remotes: RemoteList,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallOptions {
    /// Install new packages of synchronized remotes
    pub auto_install: bool,
    /// Offer prereleases
    pub bleeding_edge: bool,
    /// Report packages gone from their index as obsolete
    pub prompt_obsolete: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            auto_install: true,
            bleeding_edge: false,
            prompt_obsolete: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkOptions {
    pub timeout_secs: u64,
    /// Size of the download worker pool
    pub workers: usize,
    /// Cached indexes younger than this are not fetched again; 0 always fetches
    pub stale_threshold_secs: u64,
    pub user_agent: String,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            workers: 4,
            stale_threshold_secs: 0,
            user_agent: format!("plugpack/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl NetworkOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_secs)
    }
}

impl Config {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)?;
        for remote in config.remotes.iter() {
            remote.validate()?;
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
