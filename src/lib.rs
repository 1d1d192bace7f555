// src/lib.rs

//! Plugpack Package Manager
//!
//! Installs and updates scripts, extensions and other resources of a
//! plugin-extensible host from remote package indexes.
//!
//! # Architecture
//!
//! - Indexes: one JSON document per remote, cached on disk
//! - Version model: comparable version codes, platform-filtered sources
//! - Registry: SQLite record of installed packages and their files
//! - Transactions: fetch, resolve, download, then apply with one commit
//! - Downloads: bounded worker pool, files staged under the data directory

pub mod config;
pub mod download;
mod error;
pub mod filesystem;
pub mod index;
pub mod layout;
mod lock;
pub mod progress;
pub mod registry;
pub mod remote;
pub mod scheduler;
pub mod transaction;
pub mod version;

pub use config::Config;
pub use download::{FetchTask, HttpTransport, MemoryTransport, TaskState, Transport};
pub use error::{Error, Result};
pub use index::{Category, Index, Package, PackageType, Platform, Source, Version};
pub use layout::Layout;
pub use lock::RootLock;
pub use progress::{BarProgress, LogProgress, ProgressTracker, SilentProgress};
pub use registry::{Registry, RegistryEntry};
pub use remote::{Remote, RemoteList};
pub use scheduler::Scheduler;
pub use transaction::{Receipt, Transaction, TransactionOutcome, TransactionState};
pub use version::VersionCode;
