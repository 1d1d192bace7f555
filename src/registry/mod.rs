// src/registry/mod.rs

//! Install registry
//!
//! SQLite record of every installed package and the files it owns. The
//! registry is opened inside a database transaction that stays open until
//! [`Registry::commit`]; dropping the registry without committing discards
//! every change made since the last commit. Per-entry savepoints let a
//! caller undo one package's changes without losing the others.

pub mod schema;

use crate::error::{Error, Result};
use crate::filesystem::InstallPath;
use crate::index::{PackageType, Sections, Version};
use crate::version::VersionCode;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

const ENTRY_COLUMNS: &str =
    "id, remote, category, package, description, type, version, author, pinned";

/// One installed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub id: i64,
    pub remote: String,
    pub category: String,
    pub package: String,
    pub description: String,
    pub kind: PackageType,
    pub version: VersionCode,
    pub author: String,
    pub pinned: bool,
}

impl RegistryEntry {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let kind: String = row.get(5)?;
        let version: String = row.get(6)?;
        let version = VersionCode::parse(&version)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

        Ok(Self {
            id: row.get(0)?,
            remote: row.get(1)?,
            category: row.get(2)?,
            package: row.get(3)?,
            description: row.get(4)?,
            kind: PackageType::parse(&kind),
            version,
            author: row.get(7)?,
            pinned: row.get::<_, i32>(8)? != 0,
        })
    }

    /// Whether this entry is the install of `remote/category/package`
    pub fn matches(&self, remote: &str, category: &str, package: &str) -> bool {
        self.remote == remote && self.category == category && self.package == package
    }
}

impl fmt::Display for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.description.is_empty() {
            &self.package
        } else {
            &self.description
        };
        write!(f, "{}/{}/{} v{}", self.remote, self.category, name, self.version)
    }
}

/// One file owned by an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryFile {
    pub path: InstallPath,
    pub sections: Sections,
    pub kind: PackageType,
}

impl RegistryFile {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let path: String = row.get(0)?;
        let kind: String = row.get(2)?;

        Ok(Self {
            path: InstallPath::parse(&path),
            sections: Sections::from_bits(row.get(1)?),
            kind: PackageType::parse(&kind),
        })
    }
}

pub struct Registry {
    conn: Connection,
}

impl Registry {
    /// Open (creating if needed) the registry database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::setup(Connection::open(path)?)
    }

    /// Registry backed by memory, for dry runs and tests
    pub fn open_in_memory() -> Result<Self> {
        Self::setup(Connection::open_in_memory()?)
    }

    fn setup(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::migrate(&conn)?;
        conn.execute_batch("BEGIN")?;
        Ok(Self { conn })
    }

    pub fn get_entry(
        &self,
        remote: &str,
        category: &str,
        package: &str,
    ) -> Result<Option<RegistryEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries
             WHERE remote = ?1 AND category = ?2 AND package = ?3"
        ))?;

        let entry = stmt
            .query_row(params![remote, category, package], RegistryEntry::from_row)
            .optional()?;
        Ok(entry)
    }

    /// Entries installed from `remote`
    pub fn get_entries(&self, remote: &str) -> Result<Vec<RegistryEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE remote = ?1 ORDER BY category, package"
        ))?;

        let entries = stmt
            .query_map([remote], RegistryEntry::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn all_entries(&self) -> Result<Vec<RegistryEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries ORDER BY remote, category, package"
        ))?;

        let entries = stmt
            .query_map([], RegistryEntry::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Names of every remote with at least one installed package
    pub fn remotes(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT remote FROM entries ORDER BY remote")?;

        let remotes = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(remotes)
    }

    pub fn get_files(&self, entry: &RegistryEntry) -> Result<Vec<RegistryFile>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, sections, type FROM files WHERE entry = ?1 ORDER BY path")?;

        let files = stmt
            .query_map([entry.id], RegistryFile::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// Files registered in at least one host section
    pub fn get_main_files(&self, entry: &RegistryEntry) -> Result<Vec<RegistryFile>> {
        Ok(self
            .get_files(entry)?
            .into_iter()
            .filter(|file| !file.sections.is_empty())
            .collect())
    }

    /// Entry owning `path`, if any
    pub fn file_owner(&self, path: &InstallPath) -> Result<Option<RegistryEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM entries WHERE id = (SELECT entry FROM files WHERE path = ?1)",
            ENTRY_COLUMNS
        ))?;

        let owner = stmt
            .query_row([path.to_string()], RegistryEntry::from_row)
            .optional()?;
        Ok(owner)
    }

    /// Files of `version` already owned by a different package
    pub fn conflicts(&self, version: &Version) -> Result<Vec<(InstallPath, RegistryEntry)>> {
        let (remote, category, package) = identity(version)?;
        let mut conflicts = Vec::new();

        for path in version.files()? {
            if let Some(owner) = self.file_owner(&path)?
                && !owner.matches(remote, category, package)
            {
                conflicts.push((path, owner));
            }
        }

        Ok(conflicts)
    }

    /// Record `version` as installed, replacing any previous version's
    /// file list
    pub fn push(&self, version: &Version, description: &str) -> Result<RegistryEntry> {
        let (remote, category, package) = identity(version)?;

        let id = match self.get_entry(remote, category, package)? {
            Some(existing) => {
                self.conn.execute(
                    "UPDATE entries SET description = ?1, type = ?2, version = ?3, author = ?4
                     WHERE id = ?5",
                    params![
                        description,
                        version.package_type().as_str(),
                        version.name(),
                        version.author(),
                        existing.id,
                    ],
                )?;
                self.conn
                    .execute("DELETE FROM files WHERE entry = ?1", [existing.id])?;
                existing.id
            }
            None => {
                self.conn.execute(
                    "INSERT INTO entries (remote, category, package, description, type, version, author)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        remote,
                        category,
                        package,
                        description,
                        version.package_type().as_str(),
                        version.name(),
                        version.author(),
                    ],
                )?;
                self.conn.last_insert_rowid()
            }
        };

        for source in version.sources() {
            let path = source.target_path()?;

            if let Some(owner) = self.file_owner(&path)?
                && owner.id != id
            {
                return Err(Error::Conflict {
                    path: path.to_string(),
                    owner: owner.to_string(),
                });
            }

            self.conn.execute(
                "INSERT INTO files (entry, path, sections, type) VALUES (?1, ?2, ?3, ?4)",
                params![
                    id,
                    path.to_string(),
                    source.sections()?.bits(),
                    source.effective_type().as_str(),
                ],
            )?;
        }

        debug!("Registered {}", version.full_name());

        self.get_entry(remote, category, package)?
            .ok_or_else(|| Error::NotFound(version.full_name()))
    }

    /// Exclude an entry from (or re-include it in) updates
    pub fn set_pinned(&self, entry: &RegistryEntry, pinned: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE entries SET pinned = ?1 WHERE id = ?2",
            params![pinned as i32, entry.id],
        )?;
        Ok(())
    }

    /// Drop an entry and its file list
    pub fn forget(&self, entry: &RegistryEntry) -> Result<()> {
        self.conn
            .execute("DELETE FROM entries WHERE id = ?1", [entry.id])?;
        Ok(())
    }

    pub fn savepoint(&self) -> Result<()> {
        self.conn.execute_batch("SAVEPOINT entry")?;
        Ok(())
    }

    /// Undo everything since the last [`Registry::savepoint`]
    pub fn restore(&self) -> Result<()> {
        self.conn
            .execute_batch("ROLLBACK TO SAVEPOINT entry; RELEASE SAVEPOINT entry")?;
        Ok(())
    }

    /// Keep everything since the last [`Registry::savepoint`]
    pub fn release(&self) -> Result<()> {
        self.conn.execute_batch("RELEASE SAVEPOINT entry")?;
        Ok(())
    }

    /// Persist all pending changes
    pub fn commit(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT; BEGIN")?;
        Ok(())
    }
}

/// (remote, category, package) of a version with full context
fn identity(version: &Version) -> Result<(&str, &str, &str)> {
    let package = version.package_name().ok_or(Error::NoPackage)?;
    let category = version.category_name().ok_or(Error::MissingContext)?;
    let remote = version.remote_name().ok_or(Error::MissingContext)?;
    Ok((remote, category, package))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Category, Index, Package, Source};
    use tempfile::tempdir;

    fn version(remote: &str, package: &str, name: &str, files: &[&str]) -> Version {
        let index = Index::new(remote).unwrap();
        let cat = Category::new("Category", Some(&index)).unwrap();
        let pack = Package::new(PackageType::Script, package, Some(&cat)).unwrap();
        let mut ver = Version::new(name, Some(&pack)).unwrap();
        ver.set_author("author");
        for file in files {
            let mut src = Source::new(file, "https://example.com", Some(&ver)).unwrap();
            if file.is_empty() {
                src.set_sections(Sections::MAIN);
            }
            ver.add_source(src).unwrap();
        }
        ver
    }

    #[test]
    fn test_push_and_query() {
        let reg = Registry::open_in_memory().unwrap();
        assert!(reg.get_entry("Remote", "Category", "pkg").unwrap().is_none());

        let entry = reg
            .push(&version("Remote", "pkg", "1.0", &["", "lib.lua"]), "Package")
            .unwrap();
        assert_eq!(entry.remote, "Remote");
        assert_eq!(entry.category, "Category");
        assert_eq!(entry.package, "pkg");
        assert_eq!(entry.description, "Package");
        assert_eq!(entry.kind, PackageType::Script);
        assert_eq!(entry.version, VersionCode::parse("1.0").unwrap());
        assert_eq!(entry.author, "author");
        assert!(!entry.pinned);

        let files = reg.get_files(&entry).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].path.to_string(), "Scripts/Remote/Category/pkg");
        assert_eq!(files[1].sections, Sections::MAIN);

        let main = reg.get_main_files(&entry).unwrap();
        assert_eq!(main.len(), 1);

        assert_eq!(reg.get_entries("Remote").unwrap(), vec![entry.clone()]);
        assert_eq!(reg.all_entries().unwrap().len(), 1);
        assert_eq!(reg.remotes().unwrap(), vec!["Remote".to_string()]);
    }

    #[test]
    fn test_update_replaces_files_and_keeps_pin() {
        let reg = Registry::open_in_memory().unwrap();
        let entry = reg
            .push(&version("Remote", "pkg", "1.0", &["old.lua"]), "")
            .unwrap();
        reg.set_pinned(&entry, true).unwrap();

        let updated = reg
            .push(&version("Remote", "pkg", "2.0", &["new.lua"]), "")
            .unwrap();
        assert_eq!(updated.id, entry.id);
        assert_eq!(updated.version, VersionCode::parse("2.0").unwrap());
        assert!(updated.pinned);

        let paths: Vec<String> = reg
            .get_files(&updated)
            .unwrap()
            .iter()
            .map(|f| f.path.to_string())
            .collect();
        assert_eq!(paths, ["Scripts/Remote/Category/new.lua"]);
    }

    #[test]
    fn test_file_conflict() {
        let reg = Registry::open_in_memory().unwrap();
        let first = version("Remote", "one", "1.0", &["shared.lua"]);
        reg.push(&first, "").unwrap();

        let second = version("Remote", "two", "1.0", &["shared.lua"]);
        let conflicts = reg.conflicts(&second).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].1.package, "one");

        assert!(reg.conflicts(&first).unwrap().is_empty());

        reg.savepoint().unwrap();
        let err = reg.push(&second, "").unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        reg.restore().unwrap();
        assert!(reg.get_entry("Remote", "Category", "two").unwrap().is_none());
    }

    #[test]
    fn test_forget() {
        let reg = Registry::open_in_memory().unwrap();
        let entry = reg
            .push(&version("Remote", "pkg", "1.0", &["a.lua"]), "")
            .unwrap();
        reg.forget(&entry).unwrap();

        assert!(reg.get_entry("Remote", "Category", "pkg").unwrap().is_none());
        assert!(reg
            .file_owner(&InstallPath::parse("Scripts/Remote/Category/a.lua"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_savepoint_release() {
        let reg = Registry::open_in_memory().unwrap();
        reg.savepoint().unwrap();
        reg.push(&version("Remote", "pkg", "1.0", &["a.lua"]), "")
            .unwrap();
        reg.release().unwrap();
        assert!(reg.get_entry("Remote", "Category", "pkg").unwrap().is_some());
    }

    #[test]
    fn test_uncommitted_changes_are_discarded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.db");

        {
            let reg = Registry::open(&path).unwrap();
            reg.push(&version("Remote", "kept", "1.0", &["a.lua"]), "")
                .unwrap();
            reg.commit().unwrap();
            reg.push(&version("Remote", "lost", "1.0", &["b.lua"]), "")
                .unwrap();
        }

        let reg = Registry::open(&path).unwrap();
        assert!(reg.get_entry("Remote", "Category", "kept").unwrap().is_some());
        assert!(reg.get_entry("Remote", "Category", "lost").unwrap().is_none());
    }
}
