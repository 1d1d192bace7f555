// src/index/mod.rs

//! Remote package indexes
//!
//! An [`Index`] is the parsed manifest of one remote: categories holding
//! packages, packages holding versions in ascending order, versions holding
//! platform-specific sources.
//!
//! Every child keeps a shared, immutable back-reference ("link") to the
//! parent it was created for. Links carry just enough context (names and
//! package type) to compute install paths and display names, and double as
//! ownership tokens: a child can only be added to the parent whose link it
//! holds. A child created without a parent is relinked, along with all of
//! its descendants, when it is added.

mod cache;
mod document;
mod package;
mod source;
mod version;

pub use cache::IndexCache;
pub use document::{IndexDocument, INDEX_FORMAT_VERSION};
pub use package::{Package, PackageType};
pub use source::{BuildTarget, Platform, Sections, Source};
pub use version::Version;

use crate::error::{Error, Result};
use crate::version::VersionCode;
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct IndexLink {
    pub(crate) name: String,
}

#[derive(Debug)]
pub(crate) struct CategoryLink {
    pub(crate) name: String,
    pub(crate) index: Option<Arc<IndexLink>>,
}

impl CategoryLink {
    fn full_name(&self) -> String {
        match &self.index {
            Some(index) => format!("{}/{}", index.name, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct PackageLink {
    pub(crate) name: String,
    pub(crate) kind: PackageType,
    pub(crate) category: Option<Arc<CategoryLink>>,
}

impl PackageLink {
    pub(crate) fn full_name(&self) -> String {
        match &self.category {
            Some(category) => format!("{}/{}", category.full_name(), self.name),
            None => self.name.clone(),
        }
    }

    pub(crate) fn category_name(&self) -> Option<&str> {
        self.category.as_deref().map(|c| c.name.as_str())
    }

    pub(crate) fn remote_name(&self) -> Option<&str> {
        self.category
            .as_deref()
            .and_then(|c| c.index.as_deref())
            .map(|i| i.name.as_str())
    }
}

#[derive(Debug)]
pub(crate) struct VersionLink {
    pub(crate) code: VersionCode,
    pub(crate) package: Option<Arc<PackageLink>>,
}

impl VersionLink {
    pub(crate) fn full_name(&self) -> String {
        match &self.package {
            Some(package) => format!("{} v{}", package.full_name(), self.code),
            None => format!("v{}", self.code),
        }
    }
}

/// Whether `child` may be attached to `parent`: unset or the same link
///
/// Children with an unset link are relinked to the parent on insertion.
pub(crate) fn same_owner<T>(child: Option<&Arc<T>>, parent: &Arc<T>) -> bool {
    child.is_none_or(|link| Arc::ptr_eq(link, parent))
}

/// Characters a remote name can not contain
const FORBIDDEN_NAME_CHARS: &[char] = &[
    '~', '#', '%', '&', '*', '{', '}', '\\', ':', '<', '>', '?', '/', '+', '|', '"',
];

/// Validate a remote name; it doubles as a directory and cache file name
pub fn validate_remote_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::EmptyName("index"));
    }
    if name.contains(FORBIDDEN_NAME_CHARS) || name == "." || name == ".." {
        return Err(Error::InvalidName {
            kind: "index",
            name: name.to_string(),
        });
    }
    Ok(())
}

/// A category of packages inside one index
#[derive(Debug, Clone)]
pub struct Category {
    link: Arc<CategoryLink>,
    packages: Vec<Package>,
}

impl Category {
    pub fn new(name: &str, index: Option<&Index>) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::EmptyName("category"));
        }

        Ok(Self {
            link: Arc::new(CategoryLink {
                name: name.to_string(),
                index: index.map(|i| Arc::clone(&i.link)),
            }),
            packages: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.link.name
    }

    pub fn full_name(&self) -> String {
        self.link.full_name()
    }

    pub(crate) fn link(&self) -> &Arc<CategoryLink> {
        &self.link
    }

    fn relink(&mut self, index: &Arc<IndexLink>) {
        self.link = Arc::new(CategoryLink {
            name: self.link.name.clone(),
            index: Some(Arc::clone(index)),
        });
        for package in &mut self.packages {
            package.relink(&self.link);
        }
    }

    /// Add a package created for this category
    ///
    /// Packages without any version are dropped and `Ok(false)` is returned.
    pub fn add_package(&mut self, mut package: Package) -> Result<bool> {
        if !same_owner(package.category_link(), &self.link) {
            return Err(Error::Ownership {
                child: "package",
                parent: "category",
            });
        }
        if package.category_link().is_none() {
            package.relink(&self.link);
        }

        if package.versions().is_empty() {
            return Ok(false);
        }

        self.packages.push(package);
        Ok(true)
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name() == name)
    }
}

/// Parsed manifest of one remote
#[derive(Debug, Clone)]
pub struct Index {
    link: Arc<IndexLink>,
    categories: Vec<Category>,
    warnings: Vec<String>,
}

impl Index {
    pub fn new(name: &str) -> Result<Self> {
        validate_remote_name(name)?;

        Ok(Self {
            link: Arc::new(IndexLink {
                name: name.to_string(),
            }),
            categories: Vec::new(),
            warnings: Vec::new(),
        })
    }

    /// Parse an index document for the running host
    pub fn from_json(name: &str, text: &str) -> Result<Self> {
        Self::from_json_for(name, text, BuildTarget::current())
    }

    /// Parse an index document, keeping only sources usable on `target`
    pub fn from_json_for(name: &str, text: &str, target: BuildTarget) -> Result<Self> {
        let doc = IndexDocument::parse(text)?;
        doc.into_index(name, target)
    }

    pub fn name(&self) -> &str {
        &self.link.name
    }

    /// Add a category created for this index; empty categories are dropped
    pub fn add_category(&mut self, mut category: Category) -> Result<bool> {
        if !same_owner(category.link.index.as_ref(), &self.link) {
            return Err(Error::Ownership {
                child: "category",
                parent: "index",
            });
        }
        if category.link.index.is_none() {
            category.relink(&self.link);
        }

        if category.packages.is_empty() {
            return Ok(false);
        }

        self.categories.push(category);
        Ok(true)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name() == name)
    }

    /// All packages across categories
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.categories.iter().flat_map(|c| c.packages.iter())
    }

    pub fn find(&self, category: &str, package: &str) -> Option<&Package> {
        self.category(category)?.package(package)
    }

    /// Problems skipped while loading the document
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub(crate) fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package_with_version(category: &Category, name: &str) -> Package {
        let mut package = Package::new(PackageType::Script, name, Some(category)).unwrap();
        let mut version = Version::new("1.0", Some(&package)).unwrap();
        version
            .add_source(Source::new("", "https://example.com/a", Some(&version)).unwrap())
            .unwrap();
        package.add_version(version).unwrap();
        package
    }

    #[test]
    fn test_remote_name_validation() {
        assert!(Index::new("ReaTeam Scripts").is_ok());
        assert!(matches!(Index::new(""), Err(Error::EmptyName("index"))));
        assert!(matches!(
            Index::new("a/b"),
            Err(Error::InvalidName { .. })
        ));
        assert!(Index::new("..").is_err());
    }

    #[test]
    fn test_category_full_name() {
        let index = Index::new("Remote").unwrap();
        let cat = Category::new("Category", Some(&index)).unwrap();
        assert_eq!(cat.full_name(), "Remote/Category");
        assert!(matches!(
            Category::new("", None),
            Err(Error::EmptyName("category"))
        ));
    }

    #[test]
    fn test_drop_empty_package_and_category() {
        let mut index = Index::new("Remote").unwrap();
        let mut cat = Category::new("Category", Some(&index)).unwrap();
        let empty = Package::new(PackageType::Script, "empty", Some(&cat)).unwrap();

        assert!(!cat.add_package(empty).unwrap());
        assert!(cat.packages().is_empty());
        assert!(!index.add_category(cat).unwrap());
        assert!(index.categories().is_empty());
    }

    #[test]
    fn test_add_owned_package() {
        let index = Index::new("Remote").unwrap();
        let cat1 = Category::new("a", Some(&index)).unwrap();
        let mut cat2 = Category::new("b", Some(&index)).unwrap();
        let package = package_with_version(&cat1, "pkg");

        let err = cat2.add_package(package).unwrap_err();
        assert_eq!(err.to_string(), "package belongs to another category");
    }

    #[test]
    fn test_add_unowned_package() {
        let index = Index::new("Remote").unwrap();
        let mut cat = Category::new("Category", Some(&index)).unwrap();
        let mut package = Package::new(PackageType::Script, "pkg.lua", None).unwrap();
        let mut version = Version::new("1.0", Some(&package)).unwrap();
        version
            .add_source(Source::new("", "https://example.com/a", Some(&version)).unwrap())
            .unwrap();
        package.add_version(version).unwrap();

        assert!(cat.add_package(package).unwrap());
        let package = &cat.packages()[0];
        assert_eq!(package.full_name(), "Remote/Category/pkg.lua");
        let src = package.versions()[0].main_source().unwrap();
        assert_eq!(
            src.target_path().unwrap().to_string(),
            "Scripts/Remote/Category/pkg.lua"
        );
    }

    #[test]
    fn test_add_unowned_category() {
        let mut index = Index::new("Remote").unwrap();
        let mut cat = Category::new("Category", None).unwrap();
        cat.add_package(package_with_version(&cat, "pkg.lua")).unwrap();

        assert!(index.add_category(cat).unwrap());
        let package = index.find("Category", "pkg.lua").unwrap();
        assert_eq!(package.remote_name(), Some("Remote"));
        let ver = &package.versions()[0];
        assert_eq!(ver.full_name(), "Remote/Category/pkg.lua v1.0");
        assert_eq!(
            ver.main_source().unwrap().target_path().unwrap().to_string(),
            "Scripts/Remote/Category/pkg.lua"
        );
    }

    #[test]
    fn test_add_owned_category() {
        let index1 = Index::new("one").unwrap();
        let mut index2 = Index::new("two").unwrap();
        let mut cat = Category::new("a", Some(&index1)).unwrap();
        cat.add_package(package_with_version(&cat, "pkg")).unwrap();

        let err = index2.add_category(cat).unwrap_err();
        assert_eq!(err.to_string(), "category belongs to another index");
    }

    #[test]
    fn test_find_package() {
        let mut index = Index::new("Remote").unwrap();
        let mut cat = Category::new("Category", Some(&index)).unwrap();
        let package = package_with_version(&cat, "pkg.lua");
        assert!(cat.add_package(package).unwrap());
        assert!(index.add_category(cat).unwrap());

        assert!(index.find("Category", "pkg.lua").is_some());
        assert!(index.find("Category", "other").is_none());
        assert!(index.find("Other", "pkg.lua").is_none());
        assert_eq!(index.packages().count(), 1);
    }
}
