// src/commands/mod.rs
//! Command handlers for the Plugpack CLI

mod query;
mod remote;
mod sync;

pub use query::{cmd_list, cmd_pin};
pub use remote::{cmd_remote_add, cmd_remote_disable, cmd_remote_enable, cmd_remote_list, cmd_remote_remove};
pub use sync::{cmd_sync, cmd_uninstall_remote, SyncOptions};

use anyhow::Result;
use plugpack::{Config, HttpTransport, Layout, Transaction, Transport};
use std::path::PathBuf;
use std::sync::Arc;

/// Install root from `--root`, or the per-user default
pub fn open_layout(root: Option<PathBuf>) -> Layout {
    root.map(Layout::new).unwrap_or_else(Layout::user_default)
}

fn load_config(layout: &Layout) -> Result<Config> {
    Ok(Config::load(&layout.config_path())?)
}

fn save_config(layout: &Layout, config: &Config) -> Result<()> {
    Ok(config.save(&layout.config_path())?)
}

/// Lock the root and start a transaction using HTTP downloads
fn begin(layout: &Layout, config: &Config) -> Result<Transaction> {
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.network)?);
    Ok(Transaction::new(layout.clone(), config.clone(), transport)?)
}
