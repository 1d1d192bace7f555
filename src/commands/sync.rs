// src/commands/sync.rs

//! Synchronization and remote uninstall

use super::{begin, load_config, save_config};
use anyhow::{Result, anyhow};
use plugpack::{
    BarProgress, Layout, LogProgress, ProgressTracker, SilentProgress, TransactionOutcome,
};
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::info;

/// Per-run overrides of the install options
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub remove_obsolete: bool,
    pub bleeding_edge: bool,
    pub no_install: bool,
    pub quiet: bool,
}

/// How a sync run reports progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgressMode {
    Bar,
    Log,
    Silent,
}

fn progress_mode(quiet: bool, terminal: bool) -> ProgressMode {
    match (quiet, terminal) {
        (true, _) => ProgressMode::Silent,
        (false, true) => ProgressMode::Bar,
        (false, false) => ProgressMode::Log,
    }
}

fn progress_tracker(mode: ProgressMode) -> Arc<dyn ProgressTracker> {
    match mode {
        ProgressMode::Bar => Arc::new(BarProgress::new()),
        ProgressMode::Log => Arc::new(LogProgress::new("sync")),
        ProgressMode::Silent => Arc::new(SilentProgress::new()),
    }
}

/// Synchronize one remote, or every enabled remote
pub fn cmd_sync(layout: &Layout, remote: Option<&str>, options: SyncOptions) -> Result<()> {
    let mut config = load_config(layout)?;
    config.install.bleeding_edge |= options.bleeding_edge;
    if options.no_install {
        config.install.auto_install = false;
    }

    let mut tx = begin(layout, &config)?;
    match remote {
        Some(name) => {
            let remote = config
                .remotes
                .get(name)
                .ok_or_else(|| anyhow!("Remote '{}' not found", name))?;
            tx.synchronize(remote);
        }
        None => {
            if config.remotes.enabled().next().is_none() {
                println!("No enabled remotes");
            }
            tx.synchronize_all(&config.remotes);
        }
    }

    let remove_obsolete = options.remove_obsolete;
    tx.set_obsolete_handler(move |entries| {
        if !remove_obsolete {
            println!("Obsolete packages (run with --remove-obsolete to remove):");
            for entry in entries.iter() {
                println!("  {}", entry);
            }
            entries.clear();
        }
        true
    });

    let mode = progress_mode(options.quiet, std::io::stderr().is_terminal());
    tx.set_progress(progress_tracker(mode));
    report(tx.run())
}

/// Uninstall every package of a remote, then forget the remote
pub fn cmd_uninstall_remote(layout: &Layout, name: &str) -> Result<()> {
    let mut config = load_config(layout)?;
    let remote = config
        .remotes
        .get(name)
        .ok_or_else(|| anyhow!("Remote '{}' not found", name))?;
    if remote.protected {
        return Err(anyhow!("Remote '{}' is protected and cannot be uninstalled", name));
    }

    info!("Uninstalling remote: {}", name);
    let mut tx = begin(layout, &config)?;
    tx.uninstall(name);
    let outcome = tx.run();

    if !outcome.cancelled && outcome.receipt.errors().is_empty() {
        config.remotes.remove(name);
        save_config(layout, &config)?;
        println!("Removed remote: {}", name);
    }
    report(outcome)
}

pub(super) fn report(outcome: TransactionOutcome) -> Result<()> {
    print!("{}", outcome.receipt);

    if outcome.cancelled {
        return Err(anyhow!("Transaction cancelled"));
    }
    if !outcome.receipt.errors().is_empty() {
        return Err(anyhow!(
            "{} error(s) during synchronization",
            outcome.receipt.errors().len()
        ));
    }
    Ok(())
}
