// src/store/resolver.rs

//! Variant resolution and per-request snapshot reads
//!
//! A request resolves its branch to exactly one variant, the first in
//! [`RepoVariant::PRECEDENCE`] whose primary database answers the query. The
//! returned [`Snapshot`] pins that variant; every follow-up read (relations,
//! co-packages, files, changelog) goes through it, so one response never mixes
//! data from two variants.
//!
//! Each read opens the database read-only under a shared [`FileLock`], which
//! keeps the synchronizer from renaming a new generation in mid-read.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::lock::FileLock;
use crate::store::layout::{DbKind, RepoVariant, SnapshotLayout};
use crate::store::models::{
    Changelog, ChangelogEntry, FileEntry, FileList, PACKAGE_COLUMNS, PACKAGE_ORDER, PackageInfo,
    PackageRecord, RelationKind, RelationRecord,
};
use regex::Regex;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// What a request is looking for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageQuery {
    /// Newest binary package with this name
    ByName(String),
    /// Every package whose relation table has an entry named `token`
    ByRelation(RelationKind, String),
    /// A package built from the source package with this name
    BySource(String),
}

impl PackageQuery {
    fn run(&self, conn: &Connection) -> Result<Vec<PackageRecord>> {
        match self {
            Self::ByName(name) => {
                let sql = format!(
                    "SELECT {PACKAGE_COLUMNS} FROM packages p WHERE p.name = ?1 {PACKAGE_ORDER} LIMIT 1"
                );
                let record = conn
                    .query_row(&sql, [name], PackageRecord::from_row)
                    .optional()?;
                Ok(record.into_iter().collect())
            }
            Self::ByRelation(kind, token) => {
                let sql = format!(
                    "SELECT {PACKAGE_COLUMNS} FROM packages p
                     JOIN {} t ON t.pkgKey = p.pkgKey
                     WHERE t.name = ?1 {PACKAGE_ORDER}",
                    kind.table()
                );
                let mut stmt = conn.prepare(&sql)?;
                let records = stmt
                    .query_map([token], PackageRecord::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(records)
            }
            Self::BySource(src) => {
                let sql = format!(
                    "SELECT {PACKAGE_COLUMNS} FROM packages p
                     WHERE p.rpm_sourcerpm LIKE ?1 {PACKAGE_ORDER}"
                );
                let mut stmt = conn.prepare(&sql)?;
                let candidates = stmt
                    .query_map([format!("{src}-%")], PackageRecord::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(pick_source_match(src, candidates)?.into_iter().collect())
            }
        }
    }
}

/// Prefer the package named like its source, else the first whose source
/// rpm is `{src}-{digit}...`
fn pick_source_match(src: &str, candidates: Vec<PackageRecord>) -> Result<Option<PackageRecord>> {
    if let Some(pos) = candidates.iter().position(|p| p.name == src) {
        return Ok(candidates.into_iter().nth(pos));
    }

    let pattern = Regex::new(&format!("^{}-[0-9]", regex::escape(src)))?;
    Ok(candidates.into_iter().find(|p| {
        p.source_rpm
            .as_deref()
            .is_some_and(|srpm| pattern.is_match(srpm))
    }))
}

/// Read access to the installed snapshots of every branch
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    layout: SnapshotLayout,
    lock_timeout: Duration,
    lock_poll: Duration,
}

impl SnapshotStore {
    pub fn new(config: &Config) -> Self {
        Self::with_layout(
            SnapshotLayout::new(&config.db_folder),
            config.lock_timeout(),
            config.lock_poll(),
        )
    }

    pub fn with_layout(layout: SnapshotLayout, lock_timeout: Duration, lock_poll: Duration) -> Self {
        Self {
            layout,
            lock_timeout,
            lock_poll,
        }
    }

    /// Branch names with at least one installed database
    pub fn branches(&self) -> Result<Vec<String>> {
        Ok(self.layout.list_branches()?)
    }

    /// Pick the first variant of `branch` that answers `query`
    ///
    /// Fails with [`Error::UnknownBranch`] when the branch has no primary
    /// database in any variant, and with [`Error::NotFound`] when it has some
    /// but none of them matches.
    pub fn resolve(&self, branch: &str, query: &PackageQuery) -> Result<(Snapshot, Vec<PackageRecord>)> {
        let mut branch_exists = false;

        for variant in RepoVariant::PRECEDENCE {
            let snapshot = Snapshot {
                layout: self.layout.clone(),
                branch: branch.to_string(),
                variant,
                lock_timeout: self.lock_timeout,
                lock_poll: self.lock_poll,
            };

            if !snapshot.path(DbKind::Primary).is_file() {
                continue;
            }
            branch_exists = true;

            let records = snapshot.read(DbKind::Primary, |conn| query.run(conn))?;
            if !records.is_empty() {
                debug!("[{}] {:?} resolved in {}", branch, query, variant);
                return Ok((snapshot, records));
            }
        }

        if branch_exists {
            Err(Error::NotFound(format!("{query:?} in {branch}")))
        } else {
            Err(Error::UnknownBranch(branch.to_string()))
        }
    }
}

/// One branch variant chosen for the lifetime of a request
#[derive(Debug, Clone)]
pub struct Snapshot {
    layout: SnapshotLayout,
    branch: String,
    variant: RepoVariant,
    lock_timeout: Duration,
    lock_poll: Duration,
}

impl Snapshot {
    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn variant(&self) -> RepoVariant {
        self.variant
    }

    pub fn path(&self, kind: DbKind) -> PathBuf {
        self.layout.variant_path(&self.branch, self.variant, kind)
    }

    /// Run `f` on one database of this variant under its shared lock
    fn read<T>(&self, kind: DbKind, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let path = self.path(kind);
        if !path.is_file() {
            return Err(Error::MissingSnapshot(path.display().to_string()));
        }

        let _guard = FileLock::shared(&path, self.lock_timeout, self.lock_poll)?;
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        f(&conn)
    }

    /// Attach relations, co-packages and the variant name to each package
    pub fn expand(&self, packages: &[PackageRecord]) -> Result<Vec<PackageInfo>> {
        self.read(DbKind::Primary, |conn| {
            packages
                .iter()
                .map(|pkg| self.expand_one(conn, pkg))
                .collect()
        })
    }

    fn expand_one(&self, conn: &Connection, pkg: &PackageRecord) -> Result<PackageInfo> {
        let mut relations = BTreeMap::new();
        for kind in RelationKind::ALL {
            relations.insert(kind.table(), RelationRecord::for_package(conn, kind, &pkg.id)?);
        }

        let co_packages = match pkg.source_rpm.as_deref() {
            Some(srpm) if !srpm.is_empty() => co_packages(conn, srpm)?,
            _ => Vec::new(),
        };

        Ok(PackageInfo {
            arch: pkg.arch.clone(),
            epoch: pkg.epoch.clone(),
            version: pkg.version.clone(),
            release: pkg.release.clone(),
            summary: pkg.summary.clone(),
            description: pkg.description.clone(),
            basename: pkg.basename().map(String::from),
            url: pkg.url.clone(),
            relations,
            co_packages,
            repo: self.variant.to_string(),
        })
    }

    /// File list of `pkg`, read from this variant's filelists database
    pub fn files(&self, pkg: &PackageRecord) -> Result<FileList> {
        let files = self.read(DbKind::Filelists, |conn| FileEntry::for_package(conn, &pkg.id))?;
        Ok(FileList {
            files,
            repo: self.variant.to_string(),
        })
    }

    /// Changelog of `pkg`, newest first, read from this variant's other database
    pub fn changelog(&self, pkg: &PackageRecord) -> Result<Changelog> {
        let changelogs =
            self.read(DbKind::Other, |conn| ChangelogEntry::for_package(conn, &pkg.id))?;
        Ok(Changelog {
            changelogs,
            repo: self.variant.to_string(),
        })
    }
}

/// Distinct package names built from the same source rpm
fn co_packages(conn: &Connection, source_rpm: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT name FROM packages WHERE rpm_sourcerpm = ?1 ORDER BY name",
    )?;
    let names = stmt
        .query_map([source_rpm], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}
