// src/index/document.rs

//! JSON index documents
//!
//! ```json
//! {
//!   "version": 1,
//!   "name": "ReaTeam Scripts",
//!   "categories": [{
//!     "name": "Items Editing",
//!     "packages": [{
//!       "name": "split.lua",
//!       "type": "script",
//!       "desc": "Split items",
//!       "versions": [{
//!         "name": "1.2",
//!         "author": "someone",
//!         "time": "2016-02-12T01:16:40Z",
//!         "changelog": "Faster",
//!         "sources": [{ "platform": "all", "main": "main", "url": "https://..." }]
//!       }]
//!     }]
//!   }]
//! }
//! ```
//!
//! A malformed document or an unsupported format version fails the whole
//! load. Inside a valid document, a bad version, package or source is
//! skipped and reported through [`Index::warnings`].

use super::{BuildTarget, Category, Index, Package, PackageType, Platform, Sections, Source, Version};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Index format version understood by this build
pub const INDEX_FORMAT_VERSION: u64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocument {
    pub version: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub categories: Vec<CategoryDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDocument {
    pub name: String,
    #[serde(default)]
    pub packages: Vec<PackageDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, rename = "desc")]
    pub description: String,
    #[serde(default)]
    pub versions: Vec<VersionDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDocument {
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub changelog: String,
    #[serde(default)]
    pub sources: Vec<SourceDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub main: Option<String>,
    pub url: String,
}

fn default_platform() -> String {
    Platform::Generic.as_str().to_string()
}

impl IndexDocument {
    pub fn parse(text: &str) -> Result<Self> {
        let doc: IndexDocument =
            serde_json::from_str(text).map_err(|e| Error::IndexParse(e.to_string()))?;

        if doc.version != INDEX_FORMAT_VERSION {
            return Err(Error::UnsupportedIndexVersion(doc.version));
        }

        Ok(doc)
    }

    /// Build the index of remote `name` for `target`
    pub fn into_index(self, name: &str, target: BuildTarget) -> Result<Index> {
        let mut index = Index::new(name)?;
        let mut warnings = Vec::new();

        for cat_doc in self.categories {
            let mut category = match Category::new(&cat_doc.name, Some(&index)) {
                Ok(category) => category,
                Err(e) => {
                    warnings.push(format!("{name}: skipping category: {e}"));
                    continue;
                }
            };

            for pkg_doc in cat_doc.packages {
                let label = format!("{}/{}", category.full_name(), pkg_doc.name);
                match load_package(&category, pkg_doc, target, &mut warnings) {
                    Ok(package) => {
                        if !category.add_package(package)? {
                            debug!("{}: no usable version, dropped", label);
                        }
                    }
                    Err(e) => warnings.push(format!("{label}: {e}")),
                }
            }

            index.add_category(category)?;
        }

        for warning in warnings {
            warn!("{}", warning);
            index.add_warning(warning);
        }

        Ok(index)
    }
}

fn load_package(
    category: &Category,
    doc: PackageDocument,
    target: BuildTarget,
    warnings: &mut Vec<String>,
) -> Result<Package> {
    let kind = PackageType::parse(&doc.kind);
    if kind == PackageType::Unknown {
        return Err(Error::IndexParse(format!(
            "unsupported package type '{}'",
            doc.kind
        )));
    }

    let mut package = Package::new(kind, &doc.name, Some(category))?;
    package.set_description(&doc.description);

    for ver_doc in doc.versions {
        let label = format!("{} v{}", package.full_name(), ver_doc.name);
        let added = load_version(&package, ver_doc, target, warnings)
            .and_then(|version| package.add_version(version));

        if let Err(e) = added {
            warnings.push(format!("{label}: {e}"));
        }
    }

    Ok(package)
}

fn load_version(
    package: &Package,
    doc: VersionDocument,
    target: BuildTarget,
    warnings: &mut Vec<String>,
) -> Result<Version> {
    let mut version = Version::new(&doc.name, Some(package))?;
    version.set_author(&doc.author);
    version.set_changelog(&doc.changelog);

    if let Some(time) = doc.time.as_deref() {
        match DateTime::parse_from_rfc3339(time) {
            Ok(time) => version.set_time(Some(time.with_timezone(&Utc))),
            Err(e) => warnings.push(format!(
                "{}: invalid time '{}': {}",
                version.full_name(),
                time,
                e
            )),
        }
    }

    for src_doc in doc.sources {
        let added = load_source(&version, &src_doc)
            .and_then(|source| version.add_source_for(target, source));

        if let Err(e) = added {
            warnings.push(format!("{}: {}", version.full_name(), e));
        }
    }

    Ok(version)
}

fn load_source(version: &Version, doc: &SourceDocument) -> Result<Source> {
    let mut source = Source::new(&doc.file, &doc.url, Some(version))?;
    source.set_platform(Platform::parse(&doc.platform));
    source.set_type_override(doc.kind.as_deref().map(PackageType::parse));
    if let Some(main) = doc.main.as_deref() {
        source.set_sections(Sections::parse_list(main));
    }
    Ok(source)
}
