// src/index/version.rs

//! One release of a package

use super::{BuildTarget, Package, PackageLink, PackageType, Source, VersionLink, same_owner};
use crate::error::{Error, Result};
use crate::filesystem::InstallPath;
use crate::version::VersionCode;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Version {
    link: Arc<VersionLink>,
    author: String,
    time: Option<DateTime<Utc>>,
    changelog: String,
    sources: Vec<Source>,
}

impl Version {
    /// Create a version of `package`; fails when `name` is not a valid version
    pub fn new(name: &str, package: Option<&Package>) -> Result<Self> {
        let code = VersionCode::parse(name)?;

        Ok(Self {
            link: Arc::new(VersionLink {
                code,
                package: package.map(|p| Arc::clone(p.link())),
            }),
            author: String::new(),
            time: None,
            changelog: String::new(),
            sources: Vec::new(),
        })
    }

    /// Point this version, and every source it holds, at `package`
    pub(crate) fn relink(&mut self, package: &Arc<PackageLink>) {
        self.link = Arc::new(VersionLink {
            code: self.link.code.clone(),
            package: Some(Arc::clone(package)),
        });
        for source in &mut self.sources {
            source.adopt(&self.link);
        }
    }

    pub fn code(&self) -> &VersionCode {
        &self.link.code
    }

    pub fn name(&self) -> &str {
        self.link.code.as_str()
    }

    pub fn is_prerelease(&self) -> bool {
        self.link.code.is_prerelease()
    }

    pub fn package_name(&self) -> Option<&str> {
        self.link.package.as_deref().map(|p| p.name.as_str())
    }

    pub fn package_type(&self) -> PackageType {
        self.link
            .package
            .as_deref()
            .map(|p| p.kind)
            .unwrap_or(PackageType::Unknown)
    }

    pub fn category_name(&self) -> Option<&str> {
        self.link.package.as_deref().and_then(PackageLink::category_name)
    }

    pub fn remote_name(&self) -> Option<&str> {
        self.link.package.as_deref().and_then(PackageLink::remote_name)
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn set_author(&mut self, author: &str) {
        self.author = author.to_string();
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.time
    }

    pub fn set_time(&mut self, time: Option<DateTime<Utc>>) {
        self.time = time;
    }

    /// Release date for display, empty when unknown
    pub fn display_time(&self) -> String {
        self.time
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }

    pub fn changelog(&self) -> &str {
        &self.changelog
    }

    pub fn set_changelog(&mut self, changelog: &str) {
        self.changelog = changelog.to_string();
    }

    /// `Remote/Category/package v1.0`, omitting unset parents
    pub fn full_name(&self) -> String {
        self.link.full_name()
    }

    pub(crate) fn link(&self) -> &Arc<VersionLink> {
        &self.link
    }

    pub(crate) fn package_link(&self) -> Option<&Arc<PackageLink>> {
        self.link.package.as_ref()
    }

    /// Add a source for the running host
    pub fn add_source(&mut self, source: Source) -> Result<bool> {
        self.add_source_for(BuildTarget::current(), source)
    }

    /// Add a source, silently dropping it when unusable on `target`
    ///
    /// Returns whether the source was kept. Fails when the source was
    /// created for another version, or when it would be a second main
    /// source or a second source for the same file.
    pub fn add_source_for(&mut self, target: BuildTarget, mut source: Source) -> Result<bool> {
        if !same_owner(source.version_link(), &self.link) {
            return Err(Error::Ownership {
                child: "source",
                parent: "version",
            });
        }

        if !source.platform().is_compatible(target) {
            return Ok(false);
        }

        if source.is_main() && self.main_source().is_some() {
            return Err(Error::Duplicate(format!("main source in '{}'", self.full_name())));
        }
        if !source.is_main() && self.sources.iter().any(|s| s.file() == source.file()) {
            return Err(Error::Duplicate(format!("file '{}'", source.file())));
        }

        source.adopt(&self.link);
        self.sources.push(source);
        Ok(true)
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn source(&self, index: usize) -> Option<&Source> {
        self.sources.get(index)
    }

    /// The source with an empty file name, if any
    pub fn main_source(&self) -> Option<&Source> {
        self.sources.iter().find(|s| s.is_main())
    }

    /// Install paths of every source
    pub fn files(&self) -> Result<BTreeSet<InstallPath>> {
        self.sources.iter().map(Source::target_path).collect()
    }
}
