// src/transaction/receipt.rs

//! Summary of what a synchronization run did

use crate::filesystem::InstallPath;
use crate::index::{PackageType, Version};
use crate::version::VersionCode;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketKind {
    Install,
    Update,
    /// Same version placed again after its files went missing
    Reinstall,
}

/// One package placed on disk by the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTicket {
    pub kind: TicketKind,
    pub remote: String,
    pub category: String,
    pub package: String,
    pub package_type: PackageType,
    pub version: VersionCode,
    /// Version replaced by an update or reinstall
    pub previous: Option<VersionCode>,
}

impl InstallTicket {
    pub(crate) fn new(kind: TicketKind, version: &Version, previous: Option<VersionCode>) -> Self {
        Self {
            kind,
            remote: version.remote_name().unwrap_or_default().to_string(),
            category: version.category_name().unwrap_or_default().to_string(),
            package: version.package_name().unwrap_or_default().to_string(),
            package_type: version.package_type(),
            version: version.code().clone(),
            previous,
        }
    }
}

impl fmt::Display for InstallTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{} v{}", self.remote, self.category, self.package, self.version)?;
        if let Some(previous) = &self.previous
            && previous != &self.version
        {
            write!(f, " (was v{previous})")?;
        }
        Ok(())
    }
}

/// Error recorded against one item of the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Receipt {
    tickets: Vec<InstallTicket>,
    removals: BTreeSet<InstallPath>,
    errors: Vec<ErrorInfo>,
    warnings: Vec<String>,
    restart_needed: bool,
}

impl Receipt {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_ticket(&mut self, ticket: InstallTicket) {
        if ticket.package_type == PackageType::Extension {
            self.restart_needed = true;
        }
        self.tickets.push(ticket);
    }

    pub(crate) fn add_removal(&mut self, path: InstallPath) {
        self.removals.insert(path);
    }

    pub(crate) fn add_error(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ErrorInfo {
            title: title.into(),
            message: message.into(),
        });
    }

    pub(crate) fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn tickets(&self) -> &[InstallTicket] {
        &self.tickets
    }

    pub fn installs(&self) -> impl Iterator<Item = &InstallTicket> {
        self.tickets.iter().filter(|t| t.kind == TicketKind::Install)
    }

    pub fn updates(&self) -> impl Iterator<Item = &InstallTicket> {
        self.tickets.iter().filter(|t| t.kind == TicketKind::Update)
    }

    pub fn reinstalls(&self) -> impl Iterator<Item = &InstallTicket> {
        self.tickets.iter().filter(|t| t.kind == TicketKind::Reinstall)
    }

    pub fn removals(&self) -> &BTreeSet<InstallPath> {
        &self.removals
    }

    pub fn errors(&self) -> &[ErrorInfo] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Whether the host must restart to load new extensions
    pub fn restart_needed(&self) -> bool {
        self.restart_needed
    }

    /// Nothing was installed, updated or removed
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty() && self.removals.is_empty()
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            writeln!(f, "Nothing to do")?;
        }
        for (title, kind) in [
            ("Installed", TicketKind::Install),
            ("Updated", TicketKind::Update),
            ("Reinstalled", TicketKind::Reinstall),
        ] {
            let tickets: Vec<_> = self.tickets.iter().filter(|t| t.kind == kind).collect();
            if tickets.is_empty() {
                continue;
            }
            writeln!(f, "{title} ({}):", tickets.len())?;
            for ticket in tickets {
                writeln!(f, "  {ticket}")?;
            }
        }
        if !self.removals.is_empty() {
            writeln!(f, "Removed ({}):", self.removals.len())?;
            for path in &self.removals {
                writeln!(f, "  {path}")?;
            }
        }
        if !self.warnings.is_empty() {
            writeln!(f, "Warnings ({}):", self.warnings.len())?;
            for warning in &self.warnings {
                writeln!(f, "  {warning}")?;
            }
        }
        if !self.errors.is_empty() {
            writeln!(f, "Errors ({}):", self.errors.len())?;
            for error in &self.errors {
                writeln!(f, "  {}: {}", error.title, error.message)?;
            }
        }
        if self.restart_needed {
            writeln!(f, "Restart the host to load the new extensions.")?;
        }
        Ok(())
    }
}
