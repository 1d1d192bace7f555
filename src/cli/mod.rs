// src/cli/mod.rs
//! CLI definitions for the Plugpack package manager
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod remote;

pub use remote::RemoteCommands;

#[derive(Parser)]
#[command(name = "plugpack")]
#[command(author = "Plugpack Contributors")]
#[command(version)]
#[command(about = "Package manager for plugin-extensible host applications", long_about = None)]
pub struct Cli {
    /// Host resource directory (default: per-user data directory)
    #[arg(short, long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize installed packages with their remotes
    Sync {
        /// Only synchronize this remote (default: every enabled remote)
        remote: Option<String>,

        /// Remove packages that are no longer offered by their remote
        #[arg(long)]
        remove_obsolete: bool,

        /// Offer prereleases for this run
        #[arg(long)]
        bleeding_edge: bool,

        /// Do not install new packages, only update installed ones
        #[arg(long)]
        no_install: bool,

        /// Do not report progress
        #[arg(short, long)]
        quiet: bool,
    },

    /// List installed packages
    List {
        /// Only list packages of this remote
        remote: Option<String>,

        /// Show installed files
        #[arg(short, long)]
        files: bool,
    },

    /// Remote repository management
    #[command(subcommand)]
    Remote(RemoteCommands),

    /// Remove a remote and every package installed from it
    UninstallRemote {
        /// Remote name
        name: String,
    },

    /// Exclude an installed package from updates
    Pin {
        remote: String,
        category: String,
        package: String,
    },

    /// Allow updates of a pinned package again
    Unpin {
        remote: String,
        category: String,
        package: String,
    },
}
