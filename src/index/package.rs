// src/index/package.rs

//! Packages and version selection

use super::{Category, CategoryLink, PackageLink, Version, same_owner};
use crate::error::{Error, Result};
use crate::version::VersionCode;
use std::fmt;
use std::sync::Arc;

/// Kind of content a package installs; decides its install root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageType {
    Unknown,
    Script,
    Extension,
    Effect,
    Data,
    Theme,
    LangPack,
    WebInterface,
}

impl PackageType {
    /// Parse the identifier used in index documents
    pub fn parse(s: &str) -> Self {
        match s {
            "script" => Self::Script,
            "extension" => Self::Extension,
            "effect" => Self::Effect,
            "data" => Self::Data,
            "theme" => Self::Theme,
            "langpack" => Self::LangPack,
            "webinterface" => Self::WebInterface,
            _ => Self::Unknown,
        }
    }

    /// Identifier used in index documents and the registry
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Script => "script",
            Self::Extension => "extension",
            Self::Effect => "effect",
            Self::Data => "data",
            Self::Theme => "theme",
            Self::LangPack => "langpack",
            Self::WebInterface => "webinterface",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Script => "Script",
            Self::Extension => "Extension",
            Self::Effect => "Effect",
            Self::Data => "Data",
            Self::Theme => "Theme",
            Self::LangPack => "Language Pack",
            Self::WebInterface => "Web Interface",
        }
    }

    /// Top-level install directory, `None` for unknown types
    pub fn root(&self) -> Option<&'static str> {
        match self {
            Self::Unknown => None,
            Self::Script => Some("Scripts"),
            Self::Extension => Some("UserPlugins"),
            Self::Effect => Some("Effects"),
            Self::Data => Some("Data"),
            Self::Theme => Some("ColorThemes"),
            Self::LangPack => Some("LangPack"),
            Self::WebInterface => Some("WebRoot"),
        }
    }

    /// Whether files go under `<root>/<remote>/<category>/`
    pub fn is_namespaced(&self) -> bool {
        matches!(self, Self::Script | Self::Effect)
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A named package and its versions, oldest first
#[derive(Debug, Clone)]
pub struct Package {
    link: Arc<PackageLink>,
    description: String,
    versions: Vec<Version>,
}

impl Package {
    pub fn new(kind: PackageType, name: &str, category: Option<&Category>) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::EmptyName("package"));
        }
        if name.contains(['/', '\\']) {
            return Err(Error::InvalidName {
                kind: "package",
                name: name.to_string(),
            });
        }

        Ok(Self {
            link: Arc::new(PackageLink {
                name: name.to_string(),
                kind,
                category: category.map(|c| Arc::clone(c.link())),
            }),
            description: String::new(),
            versions: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.link.name
    }

    pub fn kind(&self) -> PackageType {
        self.link.kind
    }

    pub fn category_name(&self) -> Option<&str> {
        self.link.category_name()
    }

    pub fn remote_name(&self) -> Option<&str> {
        self.link.remote_name()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: &str) {
        self.description = description.to_string();
    }

    /// Description when set (and preferred), otherwise the file name
    pub fn display_name(&self, prefer_description: bool) -> &str {
        if prefer_description && !self.description.is_empty() {
            &self.description
        } else {
            self.name()
        }
    }

    /// `Remote/Category/DisplayName`, omitting unset parents
    pub fn full_name(&self) -> String {
        let display = self.display_name(true);
        match &self.link.category {
            Some(category) => format!("{}/{}", category.full_name(), display),
            None => display.to_string(),
        }
    }

    pub(crate) fn link(&self) -> &Arc<PackageLink> {
        &self.link
    }

    /// Point this package, its versions and their sources at `category`
    pub(crate) fn relink(&mut self, category: &Arc<CategoryLink>) {
        self.link = Arc::new(PackageLink {
            name: self.link.name.clone(),
            kind: self.link.kind,
            category: Some(Arc::clone(category)),
        });
        for version in &mut self.versions {
            version.relink(&self.link);
        }
    }

    pub(crate) fn category_link(&self) -> Option<&Arc<CategoryLink>> {
        self.link.category.as_ref()
    }

    /// Insert a version created for this package, keeping ascending order
    ///
    /// Returns `Ok(false)` when the version has no usable source and was
    /// dropped.
    pub fn add_version(&mut self, mut version: Version) -> Result<bool> {
        if !same_owner(version.package_link(), &self.link) {
            return Err(Error::Ownership {
                child: "version",
                parent: "package",
            });
        }
        if version.package_link().is_none() {
            version.relink(&self.link);
        }

        if version.sources().is_empty() {
            return Ok(false);
        }

        match self
            .versions
            .binary_search_by(|existing| existing.code().cmp(version.code()))
        {
            Ok(_) => Err(Error::Duplicate(format!(
                "version '{}'",
                version.full_name()
            ))),
            Err(position) => {
                self.versions.insert(position, version);
                Ok(true)
            }
        }
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn version(&self, index: usize) -> Option<&Version> {
        self.versions.get(index)
    }

    /// Pick the version to install or update to
    ///
    /// With `allow_prerelease` the newest version wins. Otherwise the newest
    /// stable version wins, except that a host already on a prerelease
    /// (`current`) may move to a newer prerelease when no stable release at
    /// or above `current` exists.
    pub fn last_version(
        &self,
        allow_prerelease: bool,
        current: Option<&VersionCode>,
    ) -> Option<&Version> {
        let newest = self.versions.last()?;
        if allow_prerelease {
            return Some(newest);
        }

        let newest_stable = self.versions.iter().rev().find(|v| !v.is_prerelease());

        match current {
            Some(current) if current.is_prerelease() => {
                let mut candidates = self.versions.iter().rev().filter(|v| v.code() >= current);
                let first = candidates.clone().next();
                candidates
                    .find(|v| !v.is_prerelease())
                    .or(first)
                    .or(newest_stable)
            }
            _ => newest_stable,
        }
    }

    pub fn find_version(&self, code: &VersionCode) -> Option<&Version> {
        self.versions
            .binary_search_by(|v| v.code().cmp(code))
            .ok()
            .map(|i| &self.versions[i])
    }
}
