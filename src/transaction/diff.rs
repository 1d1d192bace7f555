// src/transaction/diff.rs

//! Registry diff: what a synchronization does to each package

use crate::index::{Index, Package, Version};
use crate::registry::RegistryEntry;
use crate::version::VersionCode;

/// Selection settings for one remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    /// Install packages that have no registry entry yet
    pub auto_install: bool,
    /// Offer prereleases to hosts on the stable track
    pub bleeding_edge: bool,
}

/// Decision for one package of a loaded index
#[derive(Debug, Clone, Copy)]
pub enum Plan<'a> {
    /// Not installed yet
    Install(&'a Version),
    /// Installed at an older version
    Update {
        version: &'a Version,
        from: &'a VersionCode,
    },
    /// Installed but files are missing on disk
    Reinstall(&'a Version),
    /// Installed at or above the selected version
    UpToDate,
    /// Not installed and not wanted, or nothing qualifies
    Skip,
}

impl<'a> Plan<'a> {
    /// Version to download, if any
    pub fn version(&self) -> Option<&'a Version> {
        match *self {
            Plan::Install(v) | Plan::Reinstall(v) => Some(v),
            Plan::Update { version, .. } => Some(version),
            Plan::UpToDate | Plan::Skip => None,
        }
    }
}

/// Decide what to do with `package` given its registry entry
///
/// `files_present` tells whether every file of the entry still exists.
/// Pinned entries are never updated; they are only reinstalled at their
/// recorded version when files went missing.
pub fn decide<'a>(
    package: &'a Package,
    entry: Option<&'a RegistryEntry>,
    files_present: bool,
    options: DiffOptions,
) -> Plan<'a> {
    let Some(entry) = entry else {
        if !options.auto_install {
            return Plan::Skip;
        }
        return match package.last_version(options.bleeding_edge, None) {
            Some(version) => Plan::Install(version),
            None => Plan::Skip,
        };
    };

    let installed = package.find_version(&entry.version);
    let repair = || match installed {
        Some(version) if !files_present => Plan::Reinstall(version),
        _ => Plan::UpToDate,
    };

    if entry.pinned {
        return repair();
    }

    match package.last_version(options.bleeding_edge, Some(&entry.version)) {
        Some(version) if version.code() > &entry.version => Plan::Update {
            version,
            from: &entry.version,
        },
        Some(version) if !files_present && installed.is_none() => Plan::Reinstall(version),
        _ => repair(),
    }
}

/// Entries of a synchronized remote whose package left its index
///
/// Pinned entries are kept.
pub fn obsolete_entries(index: &Index, entries: &[RegistryEntry]) -> Vec<RegistryEntry> {
    entries
        .iter()
        .filter(|entry| !entry.pinned)
        .filter(|entry| index.find(&entry.category, &entry.package).is_none())
        .cloned()
        .collect()
}
