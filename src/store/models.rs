// src/store/models.rs

//! Records read from createrepo SQLite databases
//!
//! `PkgKey` is the per-file `pkgKey` column and is meaningless outside the
//! file it came from. `PkgId` is the package checksum stored as `pkgId`; it is
//! the same in the primary, filelists and other databases of one generation
//! and is what every cross-file lookup goes through.

use crate::error::Result;
use rusqlite::{Connection, Row, params};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use strum_macros::{AsRefStr, Display, EnumString};

/// Synthetic per-file package key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PkgKey(pub i64);

/// Content identifier shared by sibling files of one generation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PkgId(pub String);

impl PkgId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PkgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PkgId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Dependency tables of the primary database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum RelationKind {
    Provides,
    Requires,
    Obsoletes,
    Conflicts,
    Enhances,
    Recommends,
    Suggests,
    Supplements,
}

impl RelationKind {
    pub const ALL: [RelationKind; 8] = [
        RelationKind::Provides,
        RelationKind::Requires,
        RelationKind::Obsoletes,
        RelationKind::Conflicts,
        RelationKind::Enhances,
        RelationKind::Recommends,
        RelationKind::Suggests,
        RelationKind::Supplements,
    ];

    /// Table holding this relation; never derived from user input
    pub const fn table(&self) -> &'static str {
        match self {
            Self::Provides => "provides",
            Self::Requires => "requires",
            Self::Obsoletes => "obsoletes",
            Self::Conflicts => "conflicts",
            Self::Enhances => "enhances",
            Self::Recommends => "recommends",
            Self::Suggests => "suggests",
            Self::Supplements => "supplements",
        }
    }
}

/// Row of the primary `packages` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub key: PkgKey,
    pub id: PkgId,
    pub name: String,
    pub source_rpm: Option<String>,
    pub epoch: Option<String>,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
}

/// Column list matching [`PackageRecord::from_row`]
pub(crate) const PACKAGE_COLUMNS: &str = "p.pkgKey, p.pkgId, p.name, p.rpm_sourcerpm, p.epoch, \
     p.version, p.release, p.arch, p.summary, p.description, p.url";

/// Newest first, the way lookups pick a single package
pub(crate) const PACKAGE_ORDER: &str = "ORDER BY p.epoch DESC, p.version DESC, p.release DESC";

impl PackageRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: PkgKey(row.get(0)?),
            id: PkgId(row.get(1)?),
            name: row.get(2)?,
            source_rpm: row.get(3)?,
            epoch: row.get(4)?,
            version: row.get(5)?,
            release: row.get(6)?,
            arch: row.get(7)?,
            summary: row.get(8)?,
            description: row.get(9)?,
            url: row.get(10)?,
        })
    }

    /// Source package name: the source rpm minus its version and release
    pub fn basename(&self) -> Option<&str> {
        self.source_rpm
            .as_deref()
            .and_then(|srpm| srpm.rsplitn(3, '-').last())
    }
}

/// Row of one of the dependency tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationRecord {
    pub name: String,
    pub epoch: Option<String>,
    pub version: Option<String>,
    pub release: Option<String>,
    pub flags: Option<String>,
}

impl RelationRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            epoch: row.get(1)?,
            version: row.get(2)?,
            release: row.get(3)?,
            flags: row.get(4)?,
        })
    }

    /// Dependencies of kind `kind` declared by the package with content id `id`
    pub fn for_package(conn: &Connection, kind: RelationKind, id: &PkgId) -> Result<Vec<Self>> {
        let sql = format!(
            "SELECT r.name, r.epoch, r.version, r.release, r.flags
             FROM {} r JOIN packages p ON p.pkgKey = r.pkgKey
             WHERE p.pkgId = ?1 ORDER BY r.rowid",
            kind.table()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([id.as_str()], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Row of the filelists `filelist` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub dirname: String,
    pub filenames: String,
    pub filetypes: String,
}

impl FileEntry {
    pub fn for_package(conn: &Connection, id: &PkgId) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT f.dirname, f.filenames, f.filetypes
             FROM filelist f JOIN packages p ON p.pkgKey = f.pkgKey
             WHERE p.pkgId = ?1 ORDER BY f.filenames",
        )?;
        let rows = stmt
            .query_map(params![id.as_str()], |row| {
                Ok(Self {
                    dirname: row.get(0)?,
                    filenames: row.get(1)?,
                    filetypes: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Row of the other `changelog` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogEntry {
    pub author: String,
    #[serde(rename = "changelog")]
    pub text: String,
    pub date: i64,
}

impl ChangelogEntry {
    pub fn for_package(conn: &Connection, id: &PkgId) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT c.author, c.changelog, c.date
             FROM changelog c JOIN packages p ON p.pkgKey = c.pkgKey
             WHERE p.pkgId = ?1 ORDER BY c.date DESC",
        )?;
        let rows = stmt
            .query_map(params![id.as_str()], |row| {
                Ok(Self {
                    author: row.get(0)?,
                    text: row.get(1)?,
                    date: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Package as returned by the pkg, srcpkg and relation endpoints
#[derive(Debug, Clone, Serialize)]
pub struct PackageInfo {
    pub arch: String,
    pub epoch: Option<String>,
    pub version: String,
    pub release: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub basename: Option<String>,
    pub url: Option<String>,
    /// One list per [`RelationKind`], keyed by its table name
    #[serde(flatten)]
    pub relations: BTreeMap<&'static str, Vec<RelationRecord>>,
    #[serde(rename = "co-packages")]
    pub co_packages: Vec<String>,
    pub repo: String,
}

/// Body of the files endpoint
#[derive(Debug, Clone, Serialize)]
pub struct FileList {
    pub files: Vec<FileEntry>,
    pub repo: String,
}

/// Body of the changelog endpoint
#[derive(Debug, Clone, Serialize)]
pub struct Changelog {
    pub changelogs: Vec<ChangelogEntry>,
    pub repo: String,
}
