// src/index/source.rs

//! Downloadable files of a version
//!
//! A source names one file (or the package's main file when its file name
//! is empty), the URL to fetch it from, and the platform it runs on. The
//! platform decides whether the source survives [`Version::add_source`] on
//! the running host; the package type decides where the file lands.
//!
//! [`Version::add_source`]: super::Version::add_source

use super::{PackageType, VersionLink};
use crate::error::{Error, Result};
use crate::filesystem::InstallPath;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

/// Platform a source is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Platform {
    Unknown,
    #[default]
    Generic,
    Windows,
    Win32,
    Win64,
    Darwin,
    Darwin32,
    Darwin64,
}

impl Platform {
    pub const ALL: [Platform; 8] = [
        Platform::Unknown,
        Platform::Generic,
        Platform::Windows,
        Platform::Win32,
        Platform::Win64,
        Platform::Darwin,
        Platform::Darwin32,
        Platform::Darwin64,
    ];

    /// Parse the identifier used in index documents
    pub fn parse(s: &str) -> Self {
        match s {
            "all" => Self::Generic,
            "windows" => Self::Windows,
            "win32" => Self::Win32,
            "win64" => Self::Win64,
            "darwin" => Self::Darwin,
            "darwin32" => Self::Darwin32,
            "darwin64" => Self::Darwin64,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Generic => "all",
            Self::Windows => "windows",
            Self::Win32 => "win32",
            Self::Win64 => "win64",
            Self::Darwin => "darwin",
            Self::Darwin32 => "darwin32",
            Self::Darwin64 => "darwin64",
        }
    }

    /// Whether a source for this platform can be installed on `target`
    pub fn is_compatible(&self, target: BuildTarget) -> bool {
        use BuildTarget as T;

        match self {
            Self::Generic => true,
            Self::Unknown => false,
            Self::Windows => matches!(target, T::Windows32 | T::Windows64),
            Self::Win32 => target == T::Windows32,
            Self::Win64 => target == T::Windows64,
            Self::Darwin => matches!(target, T::Darwin32 | T::Darwin64),
            Self::Darwin32 => target == T::Darwin32,
            Self::Darwin64 => target == T::Darwin64,
        }
    }
}

/// OS and pointer width of the host the files are installed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildTarget {
    Windows32,
    Windows64,
    Darwin32,
    Darwin64,
    /// Any other host; only generic sources apply
    Other,
}

impl BuildTarget {
    /// Target of the running build
    pub fn current() -> Self {
        let wide = cfg!(target_pointer_width = "64");

        if cfg!(target_os = "windows") {
            if wide { Self::Windows64 } else { Self::Windows32 }
        } else if cfg!(target_os = "macos") {
            if wide { Self::Darwin64 } else { Self::Darwin32 }
        } else {
            Self::Other
        }
    }
}

/// Host sections a script is registered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Sections(u32);

impl Sections {
    pub const NONE: Sections = Sections(0);
    pub const MAIN: Sections = Sections(1 << 0);
    pub const MIDI_EDITOR: Sections = Sections(1 << 1);
    pub const MIDI_INLINE_EDITOR: Sections = Sections(1 << 2);
    pub const MIDI_EVENT_LIST_EDITOR: Sections = Sections(1 << 3);
    pub const MEDIA_EXPLORER: Sections = Sections(1 << 4);
    /// Resolved from the category when the file is installed
    pub const IMPLICIT: Sections = Sections(1 << 31);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: Sections) -> bool {
        self.0 & other.0 == other.0
    }

    /// One section identifier; unknown names map to `NONE`
    pub fn parse_one(name: &str) -> Self {
        match name {
            "true" => Self::IMPLICIT,
            "main" => Self::MAIN,
            "midi_editor" => Self::MIDI_EDITOR,
            "midi_inlineeditor" => Self::MIDI_INLINE_EDITOR,
            "midi_eventlisteditor" => Self::MIDI_EVENT_LIST_EDITOR,
            "mediaexplorer" => Self::MEDIA_EXPLORER,
            _ => Self::NONE,
        }
    }

    /// Whitespace separated identifiers, as found in index documents
    pub fn parse_list(list: &str) -> Self {
        list.split_whitespace()
            .map(Self::parse_one)
            .fold(Self::NONE, BitOr::bitor)
    }

    /// Section implied by a category: the MIDI editor for categories under
    /// "MIDI Editor", the main section otherwise
    pub fn detect(category: &str) -> Self {
        let top = InstallPath::parse(category);
        let top = top.segments().first().map(|s| s.to_lowercase());

        if top.as_deref() == Some("midi editor") {
            Self::MIDI_EDITOR
        } else {
            Self::MAIN
        }
    }
}

impl BitOr for Sections {
    type Output = Sections;

    fn bitor(self, rhs: Sections) -> Sections {
        Sections(self.0 | rhs.0)
    }
}

impl fmt::Display for Sections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Sections, &str); 5] = [
            (Sections::MAIN, "main"),
            (Sections::MIDI_EDITOR, "midi_editor"),
            (Sections::MIDI_INLINE_EDITOR, "midi_inlineeditor"),
            (Sections::MIDI_EVENT_LIST_EDITOR, "midi_eventlisteditor"),
            (Sections::MEDIA_EXPLORER, "mediaexplorer"),
        ];

        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(section, _)| self.contains(*section))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join(" "))
    }
}

/// One downloadable file of a version
#[derive(Debug, Clone)]
pub struct Source {
    platform: Platform,
    type_override: Option<PackageType>,
    sections: Sections,
    file: String,
    url: String,
    version: Option<Arc<VersionLink>>,
}

impl Source {
    /// Create a source for `version`; an empty `file` makes it the main file
    pub fn new(file: &str, url: &str, version: Option<&super::Version>) -> Result<Self> {
        if url.is_empty() {
            return Err(Error::EmptySourceUrl);
        }

        Ok(Self {
            platform: Platform::Generic,
            type_override: None,
            sections: Sections::NONE,
            file: file.to_string(),
            url: url.to_string(),
            version: version.map(|v| Arc::clone(v.link())),
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn set_platform(&mut self, platform: Platform) {
        self.platform = platform;
    }

    pub fn type_override(&self) -> Option<PackageType> {
        self.type_override
    }

    pub fn set_type_override(&mut self, kind: Option<PackageType>) {
        self.type_override = kind;
    }

    pub fn set_sections(&mut self, sections: Sections) {
        self.sections = sections;
    }

    /// File name as declared, empty for the main file
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_main(&self) -> bool {
        self.file.is_empty()
    }

    pub(crate) fn version_link(&self) -> Option<&Arc<VersionLink>> {
        self.version.as_ref()
    }

    pub(crate) fn adopt(&mut self, link: &Arc<VersionLink>) {
        self.version = Some(Arc::clone(link));
    }

    /// Type override when set, otherwise the package's type
    pub fn effective_type(&self) -> PackageType {
        self.type_override.unwrap_or_else(|| {
            self.version
                .as_deref()
                .and_then(|v| v.package.as_deref())
                .map(|p| p.kind)
                .unwrap_or(PackageType::Unknown)
        })
    }

    /// File name to install: the declared one, or the package name for
    /// the main file
    pub fn effective_file(&self) -> Result<&str> {
        if !self.file.is_empty() {
            return Ok(&self.file);
        }

        self.version
            .as_deref()
            .and_then(|v| v.package.as_deref())
            .map(|p| p.name.as_str())
            .ok_or(Error::EmptyFileName)
    }

    /// Sections to register the file in; only scripts have any
    pub fn sections(&self) -> Result<Sections> {
        if self.effective_type() != PackageType::Script {
            return Ok(Sections::NONE);
        }

        if self.sections.contains(Sections::IMPLICIT) {
            let category = self
                .version
                .as_deref()
                .and_then(|v| v.package.as_deref())
                .and_then(|p| p.category_name())
                .ok_or(Error::MissingContext)?;
            return Ok(Sections::detect(category));
        }

        Ok(self.sections)
    }

    /// Where the file lands, relative to the install root
    ///
    /// Scripts and effects are namespaced as
    /// `<Root>/<Remote>/<Category>/<file>`; other types go straight under
    /// their root. Traversal in the remote name is dropped, traversal in
    /// the category and file name can not climb above the remote.
    pub fn target_path(&self) -> Result<InstallPath> {
        let package = self
            .version
            .as_deref()
            .and_then(|v| v.package.as_deref())
            .ok_or(Error::NoPackage)?;

        let kind = self.effective_type();
        let Some(root) = kind.root() else {
            return Ok(InstallPath::new());
        };

        let file = self.effective_file()?;
        let mut path = InstallPath::parse(root);

        if kind.is_namespaced() {
            let category = package.category.as_deref().ok_or(Error::MissingContext)?;
            let index = category.index.as_deref().ok_or(Error::MissingContext)?;

            path.push(&index.name);
            path.extend(&InstallPath::resolve([category.name.as_str(), file]));
        } else {
            path.extend(&InstallPath::resolve([file]));
        }

        Ok(path)
    }

    /// Human readable name: `<version> (<file>)`, the version's name for a
    /// main file, or just the file name without a version
    pub fn full_name(&self) -> Result<String> {
        let Some(version) = self.version.as_deref() else {
            return Ok(InstallPath::parse(self.effective_file()?).basename().to_string());
        };

        if self.is_main() {
            Ok(version.full_name())
        } else {
            Ok(format!(
                "{} ({})",
                version.full_name(),
                InstallPath::parse(&self.file).basename()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Category, Index, Package, Version};

    fn versioned(kind: PackageType, remote: &str, category: &str, pkg: &str) -> Version {
        let index = Index::new(remote).unwrap();
        let cat = Category::new(category, Some(&index)).unwrap();
        let pack = Package::new(kind, pkg, Some(&cat)).unwrap();
        Version::new("1.0", Some(&pack)).unwrap()
    }

    fn target(kind: PackageType, file: &str) -> String {
        let ver = versioned(kind, "Index Name", "Category Name", "Package Name");
        let src = Source::new(file, "https://example.com", Some(&ver)).unwrap();
        src.target_path().unwrap().to_string()
    }

    #[test]
    fn test_platform_from_string() {
        assert_eq!(Platform::parse("hello"), Platform::Unknown);
        assert_eq!(Platform::parse("all"), Platform::Generic);
        assert_eq!(Platform::parse("windows"), Platform::Windows);
        assert_eq!(Platform::parse("win32"), Platform::Win32);
        assert_eq!(Platform::parse("win64"), Platform::Win64);
        assert_eq!(Platform::parse("darwin"), Platform::Darwin);
        assert_eq!(Platform::parse("darwin32"), Platform::Darwin32);
        assert_eq!(Platform::parse("darwin64"), Platform::Darwin64);
    }

    fn compatible(target: BuildTarget) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| p.is_compatible(target))
            .collect()
    }

    #[test]
    fn test_platform_table() {
        use Platform::*;

        assert_eq!(compatible(BuildTarget::Windows64), [Generic, Windows, Win64]);
        assert_eq!(compatible(BuildTarget::Windows32), [Generic, Windows, Win32]);
        assert_eq!(compatible(BuildTarget::Darwin64), [Generic, Darwin, Darwin64]);
        assert_eq!(compatible(BuildTarget::Darwin32), [Generic, Darwin, Darwin32]);
        assert_eq!(compatible(BuildTarget::Other), [Generic]);
    }

    #[test]
    fn test_add_source_filters_per_target() {
        for target in [
            BuildTarget::Windows32,
            BuildTarget::Windows64,
            BuildTarget::Darwin32,
            BuildTarget::Darwin64,
            BuildTarget::Other,
        ] {
            let mut ver = Version::new("1", None).unwrap();
            for (i, platform) in Platform::ALL.into_iter().enumerate() {
                let mut src =
                    Source::new(&format!("file{i}"), "https://example.com", Some(&ver)).unwrap();
                src.set_platform(platform);
                ver.add_source_for(target, src).unwrap();
            }

            let kept: Vec<Platform> = ver.sources().iter().map(|s| s.platform()).collect();
            assert_eq!(kept, compatible(target), "target {target:?}");
        }
    }

    #[test]
    fn test_empty_url() {
        assert!(matches!(
            Source::new("a", "", None),
            Err(Error::EmptySourceUrl)
        ));
    }

    #[test]
    fn test_type_override() {
        let ver = versioned(PackageType::Script, "r", "c", "p");
        let mut src = Source::new("a", "https://example.com", Some(&ver)).unwrap();
        assert_eq!(src.effective_type(), PackageType::Script);

        src.set_type_override(Some(PackageType::Data));
        assert_eq!(src.effective_type(), PackageType::Data);
        assert_eq!(src.target_path().unwrap().to_string(), "Data/a");
    }

    #[test]
    fn test_target_path_per_type() {
        assert_eq!(
            target(PackageType::Script, "file.name"),
            "Scripts/Index Name/Category Name/file.name"
        );
        assert_eq!(
            target(PackageType::Effect, "file.name"),
            "Effects/Index Name/Category Name/file.name"
        );
        assert_eq!(target(PackageType::Extension, "file.name"), "UserPlugins/file.name");
        assert_eq!(target(PackageType::Data, "file.name"), "Data/file.name");
        assert_eq!(target(PackageType::Theme, "file.name"), "ColorThemes/file.name");
        assert_eq!(target(PackageType::LangPack, "file.name"), "LangPack/file.name");
        assert_eq!(target(PackageType::WebInterface, "file.name"), "WebRoot/file.name");
        assert_eq!(target(PackageType::Unknown, "file.name"), "");
    }

    #[test]
    fn test_target_path_main_file() {
        assert_eq!(
            target(PackageType::Script, ""),
            "Scripts/Index Name/Category Name/Package Name"
        );
    }

    #[test]
    fn test_target_path_file_traversal() {
        assert_eq!(
            target(PackageType::Script, "../../../file.name"),
            "Scripts/Index Name/file.name"
        );
        assert_eq!(
            target(PackageType::Extension, "../../file.name"),
            "UserPlugins/file.name"
        );
        assert_eq!(
            target(PackageType::Data, "sub/../../x/file.name"),
            "Data/x/file.name"
        );
    }

    #[test]
    fn test_target_path_category_traversal() {
        let ver = versioned(PackageType::Script, "Remote Name", "../..", "Package Name");
        let src = Source::new("file.name", "https://example.com", Some(&ver)).unwrap();
        assert_eq!(
            src.target_path().unwrap().to_string(),
            "Scripts/Remote Name/file.name"
        );
    }

    #[test]
    fn test_target_path_remote_traversal() {
        let ver = versioned(PackageType::Script, "...", "Cat", "p");
        let src = Source::new("f", "https://example.com", Some(&ver)).unwrap();
        assert_eq!(src.target_path().unwrap().to_string(), "Scripts/.../Cat/f");
    }

    #[test]
    fn test_target_path_without_package() {
        let src = Source::new("file.name", "https://example.com", None).unwrap();
        let err = src.target_path().unwrap_err();
        assert_eq!(err.to_string(), "no package associated with this source");

        let ver = Version::new("1.0", None).unwrap();
        let src = Source::new("file.name", "https://example.com", Some(&ver)).unwrap();
        assert!(matches!(src.target_path(), Err(Error::NoPackage)));
    }

    #[test]
    fn test_target_path_without_category() {
        let pack = Package::new(PackageType::Script, "p", None).unwrap();
        let ver = Version::new("1.0", Some(&pack)).unwrap();
        let src = Source::new("file.name", "https://example.com", Some(&ver)).unwrap();

        let err = src.target_path().unwrap_err();
        assert_eq!(err.to_string(), "category or index is unset");

        // Non-namespaced types do not need the context
        let pack = Package::new(PackageType::Data, "p", None).unwrap();
        let ver = Version::new("1.0", Some(&pack)).unwrap();
        let src = Source::new("file.name", "https://example.com", Some(&ver)).unwrap();
        assert_eq!(src.target_path().unwrap().to_string(), "Data/file.name");
    }

    #[test]
    fn test_full_name() {
        let src = Source::new("path/to/file", "https://example.com", None).unwrap();
        assert_eq!(src.full_name().unwrap(), "file");

        let ver = Version::new("1.0", None).unwrap();
        let src = Source::new("path/to/file", "https://example.com", Some(&ver)).unwrap();
        assert_eq!(src.full_name().unwrap(), "v1.0 (file)");

        let main = Source::new("", "https://example.com", Some(&ver)).unwrap();
        assert_eq!(main.full_name().unwrap(), "v1.0");

        let orphan = Source::new("", "https://example.com", None).unwrap();
        assert_eq!(
            orphan.full_name().unwrap_err().to_string(),
            "empty source file name and no package"
        );
    }

    #[test]
    fn test_sections() {
        assert_eq!(Sections::parse_one("main"), Sections::MAIN);
        assert_eq!(Sections::parse_one("true"), Sections::IMPLICIT);
        assert_eq!(Sections::parse_one("nope"), Sections::NONE);
        assert_eq!(
            Sections::parse_list("main midi_editor"),
            Sections::MAIN | Sections::MIDI_EDITOR
        );
        assert_eq!((Sections::MAIN | Sections::MIDI_EDITOR).to_string(), "main midi_editor");
    }

    #[test]
    fn test_implicit_sections() {
        let ver = versioned(PackageType::Script, "r", "MIDI Editor/Tools", "p");
        let mut src = Source::new("", "https://example.com", Some(&ver)).unwrap();
        src.set_sections(Sections::IMPLICIT);
        assert_eq!(src.sections().unwrap(), Sections::MIDI_EDITOR);

        let ver = versioned(PackageType::Script, "r", "Items", "p");
        let mut src = Source::new("", "https://example.com", Some(&ver)).unwrap();
        src.set_sections(Sections::IMPLICIT);
        assert_eq!(src.sections().unwrap(), Sections::MAIN);
    }

    #[test]
    fn test_sections_only_for_scripts() {
        let ver = versioned(PackageType::Effect, "r", "c", "p");
        let mut src = Source::new("", "https://example.com", Some(&ver)).unwrap();
        src.set_sections(Sections::MAIN);
        assert!(src.sections().unwrap().is_empty());
    }

    #[test]
    fn test_implicit_sections_without_category() {
        let pack = Package::new(PackageType::Script, "p", None).unwrap();
        let ver = Version::new("1", Some(&pack)).unwrap();
        let mut src = Source::new("", "https://example.com", Some(&ver)).unwrap();
        src.set_sections(Sections::IMPLICIT);
        assert!(matches!(src.sections(), Err(Error::MissingContext)));
    }
}
