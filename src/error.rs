// src/error.rs

//! Error types shared by the whole library

use std::io;
use thiserror::Error;

/// Library result alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Version string without a usable numeric part
    #[error("invalid version name '{0}'")]
    InvalidVersion(String),

    /// A version segment does not fit in a u64
    #[error("version segment overflow in '{0}'")]
    VersionSegmentOverflow(String),

    #[error("empty {0} name")]
    EmptyName(&'static str),

    #[error("invalid {kind} name '{name}'")]
    InvalidName { kind: &'static str, name: String },

    /// Attaching a child to a parent other than the one it was created for
    #[error("{child} belongs to another {parent}")]
    Ownership {
        child: &'static str,
        parent: &'static str,
    },

    #[error("duplicate {0}")]
    Duplicate(String),

    #[error("empty source url")]
    EmptySourceUrl,

    #[error("no package associated with this source")]
    NoPackage,

    #[error("category or index is unset")]
    MissingContext,

    #[error("empty source file name and no package")]
    EmptyFileName,

    #[error("invalid index: {0}")]
    IndexParse(String),

    #[error("index format version {0} is not supported")]
    UnsupportedIndexVersion(u64),

    #[error("download failed: {0}")]
    Download(String),

    #[error("'{path}' is already owned by {owner}")]
    Conflict { path: String, owner: String },

    /// The effective package type has no install root
    #[error("no install location for {0}")]
    NoInstallLocation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("initialization failed: {0}")]
    InitError(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Another operation holds the root lock
    #[error("install root is locked: {0}")]
    Locked(String),

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("registry error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    /// Whether this error came from cooperative cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}
