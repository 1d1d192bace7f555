// src/main.rs

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod cli;
mod commands;

use cli::{Cli, Commands, RemoteCommands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let layout = commands::open_layout(cli.root);
    debug!("Using root {}", layout.root().display());

    match cli.command {
        Commands::Sync {
            remote,
            remove_obsolete,
            bleeding_edge,
            no_install,
            quiet,
        } => commands::cmd_sync(
            &layout,
            remote.as_deref(),
            commands::SyncOptions {
                remove_obsolete,
                bleeding_edge,
                no_install,
                quiet,
            },
        ),
        Commands::List { remote, files } => commands::cmd_list(&layout, remote.as_deref(), files),
        Commands::Remote(command) => match command {
            RemoteCommands::Add {
                name,
                url,
                disabled,
                no_auto_install,
            } => commands::cmd_remote_add(&layout, &name, &url, disabled, no_auto_install),
            RemoteCommands::List => commands::cmd_remote_list(&layout),
            RemoteCommands::Remove { name } => commands::cmd_remote_remove(&layout, &name),
            RemoteCommands::Enable { name } => commands::cmd_remote_enable(&layout, &name),
            RemoteCommands::Disable { name } => commands::cmd_remote_disable(&layout, &name),
        },
        Commands::UninstallRemote { name } => commands::cmd_uninstall_remote(&layout, &name),
        Commands::Pin {
            remote,
            category,
            package,
        } => commands::cmd_pin(&layout, &remote, &category, &package, true),
        Commands::Unpin {
            remote,
            category,
            package,
        } => commands::cmd_pin(&layout, &remote, &category, &package, false),
    }
}
