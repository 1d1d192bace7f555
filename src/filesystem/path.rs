// src/filesystem/path.rs

//! Relative install paths
//!
//! Package files come from remote index documents, so every path they name
//! is untrusted. `InstallPath` stores a list of plain segments that can never
//! contain a separator, `.` or `..`, which means joining it under an install
//! root can not escape that root.
//!
//! Two ways of absorbing untrusted text exist:
//!
//! - [`InstallPath::push`] drops `..` segments outright.
//! - [`InstallPath::resolve`] lets `..` remove earlier segments of the same
//!   resolved run, but never anything before it.

use std::fmt;
use std::path::{Path, PathBuf};

/// Split on both separator styles, skipping empty and `.` segments
fn split(text: &str) -> impl Iterator<Item = &str> {
    text.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
}

/// A normalized, root-relative path
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstallPath {
    segments: Vec<String>,
}

impl InstallPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a stored path, discarding any traversal segment
    pub fn parse(text: &str) -> Self {
        let mut path = Self::new();
        path.push(text);
        path
    }

    /// Resolve `parts` as one run: `..` removes the previous segment of
    /// the run and is ignored once the run is empty.
    ///
    /// ```
    /// use plugpack::filesystem::InstallPath;
    ///
    /// let tail = InstallPath::resolve(["Category", "../../file.lua"]);
    /// assert_eq!(tail.to_string(), "file.lua");
    /// ```
    pub fn resolve<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut segments: Vec<String> = Vec::new();
        for part in parts {
            for segment in split(part) {
                if segment == ".." {
                    segments.pop();
                } else {
                    segments.push(segment.to_string());
                }
            }
        }
        Self { segments }
    }

    /// Append the segments of `text`, dropping `..`
    pub fn push(&mut self, text: &str) {
        self.segments.extend(
            split(text)
                .filter(|segment| *segment != "..")
                .map(str::to_string),
        );
    }

    pub fn extend(&mut self, other: &InstallPath) {
        self.segments.extend(other.segments.iter().cloned());
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, or "" for an empty path
    pub fn basename(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Everything but the last segment
    pub fn dirname(&self) -> InstallPath {
        let keep = self.segments.len().saturating_sub(1);
        Self {
            segments: self.segments[..keep].to_vec(),
        }
    }

    /// Whether the first segment equals `segment`
    pub fn starts_with(&self, segment: &str) -> bool {
        self.segments.first().is_some_and(|first| first == segment)
    }

    /// Join under a filesystem root
    pub fn under(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in &self.segments {
            path.push(segment);
        }
        path
    }
}

impl fmt::Display for InstallPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl From<&str> for InstallPath {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}
