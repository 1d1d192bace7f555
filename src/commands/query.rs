// src/commands/query.rs

//! Installed package queries

use anyhow::{Result, anyhow};
use plugpack::{Layout, Registry, RootLock};
use tracing::info;

/// List installed packages
pub fn cmd_list(layout: &Layout, remote: Option<&str>, files: bool) -> Result<()> {
    let _lock = RootLock::try_acquire(layout)?;
    let registry = Registry::open(&layout.registry_path())?;
    let entries = match remote {
        Some(remote) => registry.get_entries(remote)?,
        None => registry.all_entries()?,
    };

    if entries.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    println!("Installed packages:");
    for entry in &entries {
        let pinned = if entry.pinned { " [pinned]" } else { "" };
        println!("  {} ({}){}", entry, entry.kind.display_name(), pinned);
        if !entry.author.is_empty() {
            println!("    Author: {}", entry.author);
        }
        if files {
            for file in registry.get_files(entry)? {
                println!("    {}", file.path);
            }
        }
    }
    println!("\nTotal: {} package(s)", entries.len());
    Ok(())
}

/// Pin or unpin an installed package
pub fn cmd_pin(
    layout: &Layout,
    remote: &str,
    category: &str,
    package: &str,
    pinned: bool,
) -> Result<()> {
    let _lock = RootLock::try_acquire(layout)?;
    let registry = Registry::open(&layout.registry_path())?;
    let entry = registry
        .get_entry(remote, category, package)?
        .ok_or_else(|| anyhow!("Package '{}/{}/{}' is not installed", remote, category, package))?;

    info!("{} {}", if pinned { "Pinning" } else { "Unpinning" }, entry);
    registry.set_pinned(&entry, pinned)?;
    registry.commit()?;

    println!("{} {}", if pinned { "Pinned" } else { "Unpinned" }, entry);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_queries_take_root_lock() {
        let dir = tempdir().unwrap();
        let layout = Layout::new(dir.path());

        let lock = RootLock::try_acquire(&layout).unwrap();
        assert!(cmd_list(&layout, None, false).is_err());
        assert!(cmd_pin(&layout, "A", "Category", "hello.lua", true).is_err());
        drop(lock);

        cmd_list(&layout, None, false).unwrap();
        let err = cmd_pin(&layout, "A", "Category", "hello.lua", true).unwrap_err();
        assert!(err.to_string().contains("is not installed"));
    }
}
