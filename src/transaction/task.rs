// src/transaction/task.rs

//! Work items carried between the stages of a transaction

use super::diff::Plan;
use super::receipt::{InstallTicket, TicketKind};
use crate::error::{Error, Result};
use crate::filesystem::InstallPath;
use crate::index::{Index, Version};
use crate::layout::Layout;
use crate::registry::{RegistryEntry, RegistryFile};
use crate::remote::Remote;
use crate::version::VersionCode;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Index of a synchronized remote that loaded, from network or cache
pub(crate) struct LoadedIndex {
    pub remote: Remote,
    pub index: Index,
}

/// One file to download then move into place
#[derive(Debug, Clone)]
pub(crate) struct StagedFile {
    pub path: InstallPath,
    pub url: String,
    pub temp: PathBuf,
}

/// Everything needed to install one version once its files are downloaded
#[derive(Debug)]
pub(crate) struct InstallTask {
    pub version: Version,
    pub description: String,
    pub kind: TicketKind,
    pub previous: Option<VersionCode>,
    /// Files of the replaced version
    pub old_files: Vec<RegistryFile>,
    pub files: Vec<StagedFile>,
    pub failed: bool,
}

impl InstallTask {
    /// Build the task for `plan`; fails when a target path cannot be computed
    pub fn new(
        plan: Plan<'_>,
        description: &str,
        entry: Option<&RegistryEntry>,
        old_files: Vec<RegistryFile>,
        layout: &Layout,
    ) -> Result<Option<Self>> {
        let (version, kind) = match plan {
            Plan::Install(version) => (version, TicketKind::Install),
            Plan::Update { version, .. } => (version, TicketKind::Update),
            Plan::Reinstall(version) => (version, TicketKind::Reinstall),
            Plan::UpToDate | Plan::Skip => return Ok(None),
        };

        let files = version
            .sources()
            .iter()
            .map(|source| {
                let path = source.target_path()?;
                if path.is_empty() {
                    return Err(Error::NoInstallLocation(source.full_name()?));
                }
                Ok(StagedFile {
                    temp: layout.staging_path(),
                    url: source.url().to_string(),
                    path,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Self {
            version: version.clone(),
            description: description.to_string(),
            kind,
            previous: entry.map(|e| e.version.clone()),
            old_files,
            files,
            failed: false,
        }))
    }

    pub fn paths(&self) -> BTreeSet<&InstallPath> {
        self.files.iter().map(|f| &f.path).collect()
    }

    /// Files of the replaced version that the new one no longer ships
    pub fn stale_files(&self) -> Vec<&RegistryFile> {
        let current = self.paths();
        self.old_files
            .iter()
            .filter(|old| !current.contains(&old.path))
            .collect()
    }

    pub fn ticket(&self) -> InstallTicket {
        InstallTicket::new(self.kind, &self.version, self.previous.clone())
    }
}
