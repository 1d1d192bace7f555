// src/cli/remote.rs
//! Remote management commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum RemoteCommands {
    /// Add a remote, or replace the URL of an existing one
    Add {
        /// Remote name
        name: String,

        /// URL of the remote's index document
        url: String,

        /// Add the remote in disabled state
        #[arg(long)]
        disabled: bool,

        /// Do not install new packages of this remote automatically
        #[arg(long)]
        no_auto_install: bool,
    },

    /// List configured remotes
    List,

    /// Remove a remote; its packages become obsolete
    Remove {
        /// Remote name
        name: String,
    },

    /// Enable a remote and register its packages with the host
    Enable {
        /// Remote name
        name: String,
    },

    /// Disable a remote and unregister its packages from the host
    Disable {
        /// Remote name
        name: String,
    },
}
