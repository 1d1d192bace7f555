// src/version/mod.rs

//! Version codes for index packages
//!
//! A version string such as `1.2.3` or `v2.0-beta1` is reduced to up to four
//! numeric segments plus a prerelease flag. Missing trailing segments count
//! as zero, so `1` and `1.0.0.0` are the same version. At equal segments a
//! prerelease orders before the final release.
//!
//! Segments are compared one by one rather than folded into a single
//! base-1000 number, so `1.1000` correctly sorts after `1.999`.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Maximum number of numeric segments in a version string
pub const MAX_SEGMENTS: usize = 4;

/// Parsed, comparable form of a version string
///
/// Equality, ordering and hashing look only at the numeric segments and the
/// prerelease flag. The text of a prerelease suffix is not compared, so
/// `1.0-alpha1`, `1.0-alpha2` and `1.0-rc` are all equal: they sort
/// together, a package can hold only one of them, and moving between them
/// is not an update. [`VersionCode::as_str`] still returns the original
/// text.
#[derive(Debug, Clone)]
pub struct VersionCode {
    text: String,
    segments: [u64; MAX_SEGMENTS],
    count: usize,
    prerelease: bool,
}

impl VersionCode {
    /// Parse a version string
    ///
    /// An optional leading `v` is ignored. The numeric part is made of digit
    /// runs separated by `.`; the first other character ends it and marks
    /// the version as a prerelease.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let body = trimmed
            .strip_prefix(['v', 'V'])
            .unwrap_or(trimmed);

        let numeric_end = body
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(body.len());
        let (numeric, suffix) = body.split_at(numeric_end);

        let groups: Vec<&str> = numeric.split('.').filter(|g| !g.is_empty()).collect();
        if groups.is_empty() || groups.len() > MAX_SEGMENTS {
            return Err(Error::InvalidVersion(text.to_string()));
        }

        let mut segments = [0u64; MAX_SEGMENTS];
        for (slot, group) in segments.iter_mut().zip(&groups) {
            // Only digits reach this point, so a failure means overflow
            *slot = group
                .parse()
                .map_err(|_| Error::VersionSegmentOverflow(text.to_string()))?;
        }

        Ok(Self {
            text: trimmed.to_string(),
            segments,
            count: groups.len(),
            prerelease: !suffix.is_empty(),
        })
    }

    /// Non-failing variant of [`VersionCode::parse`]
    pub fn try_parse(text: &str) -> Option<Self> {
        Self::parse(text).ok()
    }

    /// The text this code was parsed from
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// All four segments, zero padded
    pub fn segments(&self) -> &[u64; MAX_SEGMENTS] {
        &self.segments
    }

    /// Number of segments present in the original text
    pub fn segment_count(&self) -> usize {
        self.count
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease
    }
}

impl PartialEq for VersionCode {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments && self.prerelease == other.prerelease
    }
}

impl Eq for VersionCode {}

impl Hash for VersionCode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
        self.prerelease.hash(state);
    }
}

impl Ord for VersionCode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments
            .cmp(&other.segments)
            // false < true, so invert: a prerelease sorts first
            .then_with(|| other.prerelease.cmp(&self.prerelease))
    }
}

impl PartialOrd for VersionCode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for VersionCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for VersionCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for VersionCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
