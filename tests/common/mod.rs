// tests/common/mod.rs

//! Shared test utilities: createrepo-shaped primary, filelists and other databases.

#![allow(dead_code)]

use rusqlite::{Connection, params};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const RELATIONS: [&str; 8] = [
    "provides",
    "requires",
    "obsoletes",
    "conflicts",
    "enhances",
    "recommends",
    "suggests",
    "supplements",
];

/// One package of a fixture repository
#[derive(Debug, Clone)]
pub struct Pkg {
    pub key: i64,
    pub id: String,
    pub name: String,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub source_rpm: String,
    pub provides: Vec<String>,
    pub requires: Vec<String>,
    pub files: Vec<String>,
    pub changelog: Vec<(String, i64, String)>,
}

impl Pkg {
    /// Package built from a source rpm of the same name
    pub fn new(key: i64, name: &str, version: &str) -> Self {
        Self {
            key,
            id: format!("{name}-{version}-id"),
            name: name.to_string(),
            version: version.to_string(),
            release: "1.fc40".to_string(),
            arch: "x86_64".to_string(),
            source_rpm: format!("{name}-{version}-1.fc40.src.rpm"),
            provides: Vec::new(),
            requires: Vec::new(),
            files: Vec::new(),
            changelog: Vec::new(),
        }
    }

    pub fn source(mut self, srpm: &str) -> Self {
        self.source_rpm = srpm.to_string();
        self
    }

    pub fn provides(mut self, names: &[&str]) -> Self {
        self.provides = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn requires(mut self, names: &[&str]) -> Self {
        self.requires = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn files(mut self, paths: &[&str]) -> Self {
        self.files = paths.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn changelog(mut self, author: &str, date: i64, text: &str) -> Self {
        self.changelog
            .push((author.to_string(), date, text.to_string()));
        self
    }

    /// Same content under another pkgKey, the way createrepo renumbers
    pub fn rekeyed(&self, key: i64) -> Self {
        Self {
            key,
            ..self.clone()
        }
    }
}

fn db_info(conn: &Connection) {
    conn.execute_batch(
        "CREATE TABLE db_info (dbversion INTEGER, checksum TEXT);
         INSERT INTO db_info VALUES (10, 'fixture');",
    )
    .unwrap();
}

/// Write a primary database holding `pkgs`
pub fn write_primary(path: &Path, pkgs: &[Pkg]) {
    let conn = Connection::open(path).unwrap();
    db_info(&conn);
    conn.execute_batch(
        "CREATE TABLE packages (
            pkgKey INTEGER PRIMARY KEY, pkgId TEXT, name TEXT, arch TEXT,
            version TEXT, epoch TEXT, release TEXT, summary TEXT,
            description TEXT, url TEXT, rpm_license TEXT, rpm_sourcerpm TEXT
         );
         CREATE TABLE files (name TEXT, type TEXT, pkgKey INTEGER);",
    )
    .unwrap();
    for table in RELATIONS {
        conn.execute_batch(&format!(
            "CREATE TABLE {table} (name TEXT, flags TEXT, epoch TEXT, version TEXT, release TEXT, pkgKey INTEGER);"
        ))
        .unwrap();
    }

    for pkg in pkgs {
        conn.execute(
            "INSERT INTO packages VALUES (?1, ?2, ?3, ?4, ?5, '0', ?6, ?7, ?8, ?9, 'MIT', ?10)",
            params![
                pkg.key,
                pkg.id,
                pkg.name,
                pkg.arch,
                pkg.version,
                pkg.release,
                format!("The {} package", pkg.name),
                format!("{} does things.", pkg.name),
                format!("https://example.org/{}", pkg.name),
                pkg.source_rpm,
            ],
        )
        .unwrap();
        for (table, names) in [("provides", &pkg.provides), ("requires", &pkg.requires)] {
            for name in names {
                conn.execute(
                    &format!("INSERT INTO {table} VALUES (?1, NULL, NULL, NULL, NULL, ?2)"),
                    params![name, pkg.key],
                )
                .unwrap();
            }
        }
        for file in &pkg.files {
            conn.execute(
                "INSERT INTO files VALUES (?1, 'file', ?2)",
                params![file, pkg.key],
            )
            .unwrap();
        }
    }
}

fn key_table(conn: &Connection, pkgs: &[Pkg]) {
    conn.execute_batch("CREATE TABLE packages (pkgKey INTEGER PRIMARY KEY, pkgId TEXT);")
        .unwrap();
    for pkg in pkgs {
        conn.execute(
            "INSERT INTO packages VALUES (?1, ?2)",
            params![pkg.key, pkg.id],
        )
        .unwrap();
    }
}

/// Write a filelists database holding `pkgs`, one row per file
pub fn write_filelists(path: &Path, pkgs: &[Pkg]) {
    let conn = Connection::open(path).unwrap();
    db_info(&conn);
    key_table(&conn, pkgs);
    conn.execute_batch(
        "CREATE TABLE filelist (pkgKey INTEGER, dirname TEXT, filenames TEXT, filetypes TEXT);",
    )
    .unwrap();
    for pkg in pkgs {
        for file in &pkg.files {
            let (dir, base) = file.rsplit_once('/').unwrap();
            conn.execute(
                "INSERT INTO filelist VALUES (?1, ?2, ?3, 'f')",
                params![pkg.key, dir, base],
            )
            .unwrap();
        }
    }
}

/// Write an other database holding `pkgs`
pub fn write_other(path: &Path, pkgs: &[Pkg]) {
    let conn = Connection::open(path).unwrap();
    db_info(&conn);
    key_table(&conn, pkgs);
    conn.execute_batch(
        "CREATE TABLE changelog (pkgKey INTEGER, author TEXT, date INTEGER, changelog TEXT);",
    )
    .unwrap();
    for pkg in pkgs {
        for (author, date, text) in &pkg.changelog {
            conn.execute(
                "INSERT INTO changelog VALUES (?1, ?2, ?3, ?4)",
                params![pkg.key, author, date, text],
            )
            .unwrap();
        }
    }
}

/// Installed path of a database, as the synchronizer names it
pub fn installed_path(folder: &Path, label: &str, kind: &str) -> PathBuf {
    folder.join(format!("mdapi-{label}-{kind}.sqlite"))
}

/// Install all three databases of a labelled repository
pub fn install_repo(folder: &Path, label: &str, pkgs: &[Pkg]) {
    write_primary(&installed_path(folder, label, "primary"), pkgs);
    write_filelists(&installed_path(folder, label, "filelists"), pkgs);
    write_other(&installed_path(folder, label, "other"), pkgs);
}

/// Gzip `src` into `dest`
pub fn gzip(src: &Path, dest: &Path) {
    let mut encoder =
        flate2::write::GzEncoder::new(File::create(dest).unwrap(), flate2::Compression::default());
    io::copy(&mut File::open(src).unwrap(), &mut encoder).unwrap();
    encoder.finish().unwrap().flush().unwrap();
}

/// `repomd.xml` announcing `(href, open-checksum)` entries as sha256
pub fn manifest(entries: &[(&str, &str)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<repomd xmlns="http://linux.duke.edu/metadata/repo">
  <revision>1712345678</revision>
"#,
    );
    for (href, open_checksum) in entries {
        xml.push_str(&format!(
            r#"  <data type="db">
    <checksum type="sha256">0000</checksum>
    <open-checksum type="sha256">{open_checksum}</open-checksum>
    <location href="repodata/{href}"/>
  </data>
"#
        ));
    }
    xml.push_str("</repomd>\n");
    xml
}
