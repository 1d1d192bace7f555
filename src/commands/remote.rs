// src/commands/remote.rs
//! Remote management commands

use super::sync::report;
use super::{begin, load_config, save_config};
use anyhow::{Result, anyhow};
use plugpack::{Layout, Remote};
use tracing::info;

/// Add a remote, or replace the URL of an existing one
pub fn cmd_remote_add(
    layout: &Layout,
    name: &str,
    url: &str,
    disabled: bool,
    no_auto_install: bool,
) -> Result<()> {
    info!("Adding remote: {} ({})", name, url);
    let mut config = load_config(layout)?;

    let mut remote = Remote::new(name, url)?;
    if let Some(existing) = config.remotes.get(name) {
        remote.protected = existing.protected;
    }
    remote.enabled = !disabled;
    if no_auto_install {
        remote.auto_install = Some(false);
    }

    config.remotes.add(remote);
    save_config(layout, &config)?;
    println!("Added remote: {}", name);
    println!("  URL: {}", url);
    println!("  Enabled: {}", !disabled);
    Ok(())
}

/// List configured remotes
pub fn cmd_remote_list(layout: &Layout) -> Result<()> {
    let config = load_config(layout)?;

    if config.remotes.is_empty() {
        println!("No remotes configured");
        return Ok(());
    }

    println!("Remotes:");
    for remote in config.remotes.iter() {
        let enabled_mark = if remote.enabled { "[x]" } else { "[ ]" };
        let protected = if remote.protected { " (protected)" } else { "" };
        println!("  {} {}{}", enabled_mark, remote.name, protected);
        println!("      {}", remote.url);
    }
    Ok(())
}

/// Forget a remote; installed packages stay until the next synchronization
pub fn cmd_remote_remove(layout: &Layout, name: &str) -> Result<()> {
    info!("Removing remote: {}", name);
    let mut config = load_config(layout)?;

    match config.remotes.get(name) {
        None => return Err(anyhow!("Remote '{}' not found", name)),
        Some(remote) if remote.protected => {
            return Err(anyhow!("Remote '{}' is protected and cannot be removed", name));
        }
        Some(_) => {}
    }

    config.remotes.remove(name);
    save_config(layout, &config)?;
    println!("Removed remote: {}", name);
    Ok(())
}

/// Enable a remote, register its packages and synchronize it
pub fn cmd_remote_enable(layout: &Layout, name: &str) -> Result<()> {
    set_enabled(layout, name, true)
}

/// Disable a remote and unregister its packages
pub fn cmd_remote_disable(layout: &Layout, name: &str) -> Result<()> {
    set_enabled(layout, name, false)
}

fn set_enabled(layout: &Layout, name: &str, enable: bool) -> Result<()> {
    let mut config = load_config(layout)?;
    let remote = config
        .remotes
        .get_mut(name)
        .ok_or_else(|| anyhow!("Remote '{}' not found", name))?;
    remote.enabled = enable;
    let remote = remote.clone();
    save_config(layout, &config)?;

    let mut tx = begin(layout, &config)?;
    tx.register_all(name, enable);
    if enable {
        tx.synchronize(&remote);
    }
    report(tx.run())?;

    println!("{} remote: {}", if enable { "Enabled" } else { "Disabled" }, name);
    Ok(())
}
