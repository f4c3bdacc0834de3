// src/diff/mod.rs

//! Change-set extraction between two generations of a database
//!
//! Both generations are read in full, table by table, and the symmetric
//! difference of their row sets is mapped back to package names. The result
//! is the set of packages whose metadata changed in any way.
//!
//! # Keys across generations
//!
//! `pkgKey` is renumbered on every createrepo run, so rows are never compared
//! on it:
//! - relation and `files` rows are joined to the package name in-file
//! - `filelist` and `changelog` rows are joined to `pkgId`, which is then
//!   translated to a name through a [`ContentIdCache`] built from the
//!   matching generation's primary `packages` table
//! - the `packages` tables of the filelists and other databases are skipped;
//!   they hold nothing but keys

use crate::error::{Error, Result};
use crate::store::{DbKind, PkgId};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Names of packages whose data differs between two generations
pub type ChangeSet = BTreeSet<String>;

/// Bookkeeping table present in every createrepo database
const DB_INFO_TABLE: &str = "db_info";

/// Tables whose leading `pkgId` must go through a cache
const CACHE_DEPENDENT_TABLES: [&str; 2] = ["filelist", "changelog"];

/// Table that fills the caches
const CACHE_PRODUCING_TABLE: &str = "packages";

const RELATION_TABLES: [&str; 8] = [
    "provides",
    "requires",
    "obsoletes",
    "conflicts",
    "enhances",
    "recommends",
    "suggests",
    "supplements",
];

/// `pkgId -> name` map for one generation
#[derive(Debug, Clone, Default)]
pub struct ContentIdCache(HashMap<PkgId, String>);

impl ContentIdCache {
    pub fn get(&self, id: &PkgId) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add every package of a primary database
    fn fill(&mut self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare("SELECT pkgId, name FROM packages")?;
        let rows = stmt.query_map([], |row| {
            Ok((PkgId(row.get::<_, String>(0)?), row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (id, name) = row?;
            self.0.insert(id, name);
        }
        Ok(())
    }
}

/// The pair of caches used while one source is synchronized
#[derive(Debug, Clone, Default)]
pub struct GenerationCaches {
    pub candidate: ContentIdCache,
    pub installed: ContentIdCache,
}

impl GenerationCaches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed both caches from an installed primary database
    ///
    /// Used when the primary did not change: both generations of the
    /// filelists and other databases then refer to the same packages.
    pub fn seed_from(&mut self, primary: &Path) -> Result<()> {
        if !primary.is_file() {
            return Ok(());
        }
        let conn = open_read_only(primary)?;
        self.installed.fill(&conn)?;
        self.candidate = self.installed.clone();
        debug!(
            "Seeded content-id caches with {} packages from {}",
            self.installed.len(),
            primary.display()
        );
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.candidate.is_empty() && self.installed.is_empty()
    }
}

/// SQLite value usable as a set member
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Cell {
    Null,
    Integer(i64),
    /// Stored by bit pattern so rows stay hashable
    Real(u64),
    Text(String),
    Blob(Vec<u8>),
}

impl Cell {
    fn from_value(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Integer(i),
            ValueRef::Real(f) => Self::Real(f.to_bits()),
            ValueRef::Text(t) => Self::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Self::Blob(b.to_vec()),
        }
    }

    fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Integer(i) => i.to_string(),
            Self::Real(bits) => f64::from_bits(*bits).to_string(),
            Self::Text(t) => t.clone(),
            Self::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }
}

type RowValues = Vec<Cell>;

/// Tables compared for a database kind
fn should_compare(kind: DbKind, table: &str) -> bool {
    !matches!(
        (kind, table),
        (DbKind::Filelists, "packages") | (DbKind::Other, "packages")
    )
}

/// Query reading the comparable shape of a table
fn table_query(table: &str) -> String {
    if RELATION_TABLES.contains(&table) {
        return format!(
            "SELECT t.name, t.flags, t.epoch, t.version, t.release, p.name
             FROM {table} t JOIN packages p ON t.pkgKey = p.pkgKey"
        );
    }
    match table {
        "files" => "SELECT t.name, t.type, p.name
             FROM files t JOIN packages p ON t.pkgKey = p.pkgKey"
            .to_string(),
        "packages" => "SELECT name, version, release, epoch, arch FROM packages".to_string(),
        "changelog" => "SELECT p.pkgId, t.author, t.date, t.changelog
             FROM changelog t JOIN packages p ON t.pkgKey = p.pkgKey"
            .to_string(),
        "filelist" => "SELECT p.pkgId, t.dirname, t.filenames, t.filetypes
             FROM filelist t JOIN packages p ON t.pkgKey = p.pkgKey"
            .to_string(),
        other => format!("SELECT * FROM \"{}\"", other.replace('"', "\"\"")),
    }
}

fn open_read_only(path: &Path) -> Result<Connection> {
    Ok(Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?)
}

/// User tables of a database, `db_info` excluded; a missing file has none
pub fn table_names(path: &Path) -> Result<BTreeSet<String>> {
    if !path.is_file() {
        return Ok(BTreeSet::new());
    }
    let conn = open_read_only(path)?;
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<BTreeSet<_>, _>>()?;
    Ok(names.into_iter().filter(|n| n != DB_INFO_TABLE).collect())
}

/// Every comparable row of `table`, with content ids translated to names
fn read_rows(
    conn: &Connection,
    table: &str,
    cache: &ContentIdCache,
    path: &Path,
) -> Result<HashSet<RowValues>> {
    let translate = CACHE_DEPENDENT_TABLES.contains(&table);
    let mut stmt = conn.prepare(&table_query(table))?;
    let columns = stmt.column_count();
    let mut rows = stmt.query([])?;

    let mut out = HashSet::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns);
        for i in 0..columns {
            values.push(Cell::from_value(row.get_ref(i)?));
        }

        if translate {
            let id = PkgId(values[0].to_text());
            match cache.get(&id) {
                Some(name) => values[0] = Cell::Text(name.to_string()),
                None => {
                    debug!(
                        "{} does not appear in the {} cache for {}, dropping from comparison",
                        id,
                        table,
                        path.display()
                    );
                    continue;
                }
            }
        }

        out.insert(values);
    }
    Ok(out)
}

/// Package a differing row belongs to
///
/// File paths lead `files` rows; the owning package is the last column there.
/// Everything else leads with a package or capability name, whose `(...)`
/// clause is stripped.
fn row_to_package(row: &[Cell]) -> String {
    let leading = row.first().map(Cell::to_text).unwrap_or_default();
    let name = if leading.contains('/') {
        row.last().map(Cell::to_text).unwrap_or_default()
    } else {
        leading
    };
    match name.split_once('(') {
        Some((head, _)) => head.to_string(),
        None => name,
    }
}

/// Compare a freshly decoded `candidate` with the `installed` generation
///
/// A missing or empty installed generation is a first sight and yields an
/// empty change-set. The caches are filled from `packages` tables as they are
/// met, so the primary database must be compared before its siblings.
pub fn compare(
    kind: DbKind,
    candidate: &Path,
    installed: &Path,
    caches: &mut GenerationCaches,
) -> Result<ChangeSet> {
    info!("Comparing {} against {}", candidate.display(), installed.display());

    let candidate_tables = table_names(candidate)?;
    let installed_tables = table_names(installed)?;

    if candidate_tables.is_empty() && installed_tables.is_empty() {
        return Err(Error::InconsistentDatabases {
            candidate: candidate.display().to_string(),
            installed: installed.display().to_string(),
        });
    }

    if installed_tables.is_empty() {
        warn!("{} is empty or missing, nothing to compare against", installed.display());
        return Ok(ChangeSet::new());
    }

    if candidate_tables != installed_tables {
        return Err(Error::SchemaMismatch {
            candidate: candidate.display().to_string(),
            installed: installed.display().to_string(),
            tables: candidate_tables
                .symmetric_difference(&installed_tables)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        });
    }

    let candidate_conn = open_read_only(candidate)?;
    let installed_conn = open_read_only(installed)?;

    let mut changed = ChangeSet::new();
    for table in installed_tables.iter().filter(|t| should_compare(kind, t)) {
        if table == CACHE_PRODUCING_TABLE {
            caches.candidate.fill(&candidate_conn)?;
            caches.installed.fill(&installed_conn)?;
        }

        let candidate_rows = read_rows(&candidate_conn, table, &caches.candidate, candidate)?;
        let installed_rows = read_rows(&installed_conn, table, &caches.installed, installed)?;

        let before = changed.len();
        changed.extend(
            candidate_rows
                .symmetric_difference(&installed_rows)
                .map(|row| row_to_package(row)),
        );
        debug!("{}: {} changed packages", table, changed.len() - before);
    }

    Ok(changed)
}
