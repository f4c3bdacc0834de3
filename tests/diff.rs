// tests/diff.rs

//! Change-set extraction between database generations.

mod common;

use common::{Pkg, write_filelists, write_other, write_primary};
use mdapi::diff::{self, GenerationCaches};
use mdapi::{DbKind, Error};
use rusqlite::Connection;
use std::collections::BTreeSet;
use tempfile::TempDir;

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn baseline() -> Vec<Pkg> {
    vec![
        Pkg::new(1, "foo", "1.0")
            .files(&["/usr/bin/foo"])
            .changelog("Ann <ann@example.org>", 100, "- Initial import"),
        Pkg::new(2, "bar", "1.0")
            .files(&["/usr/bin/bar"])
            .changelog("Bob <bob@example.org>", 200, "- Initial import"),
    ]
}

#[test]
fn test_identical_generations_have_no_changes() {
    let dir = TempDir::new().unwrap();
    let candidate = dir.path().join("candidate.sqlite");
    let installed = dir.path().join("installed.sqlite");
    write_primary(&candidate, &baseline());
    write_primary(&installed, &baseline());

    let mut caches = GenerationCaches::new();
    let changes = diff::compare(DbKind::Primary, &candidate, &installed, &mut caches).unwrap();

    assert!(changes.is_empty());
    assert_eq!(caches.candidate.len(), 2);
    assert_eq!(caches.installed.len(), 2);
}

#[test]
fn test_first_sight_is_empty_change_set() {
    let dir = TempDir::new().unwrap();
    let candidate = dir.path().join("candidate.sqlite");
    write_primary(&candidate, &baseline());

    let mut caches = GenerationCaches::new();
    let changes = diff::compare(
        DbKind::Primary,
        &candidate,
        &dir.path().join("missing.sqlite"),
        &mut caches,
    )
    .unwrap();

    assert!(changes.is_empty());
}

#[test]
fn test_renumbered_keys_are_not_changes() {
    let dir = TempDir::new().unwrap();
    let installed_pkgs = baseline();
    let candidate_pkgs: Vec<Pkg> = installed_pkgs
        .iter()
        .enumerate()
        .map(|(i, p)| p.rekeyed(100 + i as i64))
        .collect();

    let mut caches = GenerationCaches::new();
    for (kind, write) in [
        (DbKind::Primary, write_primary as fn(&std::path::Path, &[Pkg])),
        (DbKind::Filelists, write_filelists),
        (DbKind::Other, write_other),
    ] {
        let candidate = dir.path().join(format!("candidate-{kind}.sqlite"));
        let installed = dir.path().join(format!("installed-{kind}.sqlite"));
        write(&candidate, &candidate_pkgs);
        write(&installed, &installed_pkgs);

        let changes = diff::compare(kind, &candidate, &installed, &mut caches).unwrap();
        assert!(changes.is_empty(), "{kind}: {changes:?}");
    }
}

#[test]
fn test_updated_and_added_packages_are_reported() {
    let dir = TempDir::new().unwrap();
    let candidate = dir.path().join("candidate.sqlite");
    let installed = dir.path().join("installed.sqlite");

    write_primary(&installed, &baseline());
    write_primary(
        &candidate,
        &[
            Pkg::new(7, "foo", "1.0").files(&["/usr/bin/foo"]),
            Pkg::new(8, "bar", "2.0").files(&["/usr/bin/bar"]),
            Pkg::new(9, "baz", "0.1").files(&["/usr/bin/baz"]),
        ],
    );

    let mut caches = GenerationCaches::new();
    let changes = diff::compare(DbKind::Primary, &candidate, &installed, &mut caches).unwrap();

    assert_eq!(changes, names(&["bar", "baz"]));
}

#[test]
fn test_removed_package_is_reported() {
    let dir = TempDir::new().unwrap();
    let candidate = dir.path().join("candidate.sqlite");
    let installed = dir.path().join("installed.sqlite");

    write_primary(&installed, &baseline());
    write_primary(&candidate, &baseline()[..1]);

    let mut caches = GenerationCaches::new();
    let changes = diff::compare(DbKind::Primary, &candidate, &installed, &mut caches).unwrap();

    assert_eq!(changes, names(&["bar"]));
}

#[test]
fn test_relation_rows_report_capability_without_clause() {
    let dir = TempDir::new().unwrap();
    let candidate = dir.path().join("candidate.sqlite");
    let installed = dir.path().join("installed.sqlite");

    write_primary(&installed, &[Pkg::new(1, "foo", "1.0")]);
    write_primary(
        &candidate,
        &[Pkg::new(1, "foo", "1.0").requires(&["libbar.so.1()(64bit)"])],
    );

    let mut caches = GenerationCaches::new();
    let changes = diff::compare(DbKind::Primary, &candidate, &installed, &mut caches).unwrap();

    assert_eq!(changes, names(&["libbar.so.1"]));
}

#[test]
fn test_filelists_translate_content_ids_through_primary() {
    let dir = TempDir::new().unwrap();
    let installed_pkgs = baseline();
    let candidate_pkgs = vec![
        Pkg::new(11, "foo", "1.0").files(&["/usr/bin/foo", "/usr/share/foo/data"]),
        installed_pkgs[1].rekeyed(12),
    ];

    let mut caches = GenerationCaches::new();
    write_primary(&dir.path().join("c-primary.sqlite"), &candidate_pkgs);
    write_primary(&dir.path().join("i-primary.sqlite"), &installed_pkgs);
    let primary_changes = diff::compare(
        DbKind::Primary,
        &dir.path().join("c-primary.sqlite"),
        &dir.path().join("i-primary.sqlite"),
        &mut caches,
    )
    .unwrap();
    assert_eq!(primary_changes, names(&["foo"]));

    write_filelists(&dir.path().join("c-filelists.sqlite"), &candidate_pkgs);
    write_filelists(&dir.path().join("i-filelists.sqlite"), &installed_pkgs);
    let changes = diff::compare(
        DbKind::Filelists,
        &dir.path().join("c-filelists.sqlite"),
        &dir.path().join("i-filelists.sqlite"),
        &mut caches,
    )
    .unwrap();

    assert_eq!(changes, names(&["foo"]));
}

#[test]
fn test_rows_unknown_to_the_caches_are_dropped() {
    let dir = TempDir::new().unwrap();
    let candidate = dir.path().join("candidate.sqlite");
    let installed = dir.path().join("installed.sqlite");

    write_other(
        &candidate,
        &[Pkg::new(1, "foo", "1.0").changelog("Ann", 300, "- Rebuilt")],
    );
    write_other(&installed, &baseline());

    let mut caches = GenerationCaches::new();
    let changes = diff::compare(DbKind::Other, &candidate, &installed, &mut caches).unwrap();

    assert!(changes.is_empty());
}

#[test]
fn test_seeded_caches_cover_unchanged_primary() {
    let dir = TempDir::new().unwrap();
    let primary = dir.path().join("primary.sqlite");
    let candidate = dir.path().join("candidate.sqlite");
    let installed = dir.path().join("installed.sqlite");

    let pkgs = baseline();
    write_primary(&primary, &pkgs);

    let mut rebuilt = pkgs.clone();
    rebuilt[0] = rebuilt[0].clone().changelog("Ann", 300, "- Rebuilt");
    write_other(&candidate, &rebuilt);
    write_other(&installed, &pkgs);

    let mut caches = GenerationCaches::new();
    caches.seed_from(&primary).unwrap();
    assert!(!caches.is_empty());

    let changes = diff::compare(DbKind::Other, &candidate, &installed, &mut caches).unwrap();

    assert_eq!(changes, names(&["foo"]));
}

#[test]
fn test_different_table_sets_are_a_schema_mismatch() {
    let dir = TempDir::new().unwrap();
    let candidate = dir.path().join("candidate.sqlite");
    let installed = dir.path().join("installed.sqlite");

    write_primary(&candidate, &baseline());
    write_primary(&installed, &baseline());
    Connection::open(&candidate)
        .unwrap()
        .execute_batch("CREATE TABLE weak_deps (name TEXT, pkgKey INTEGER);")
        .unwrap();

    let mut caches = GenerationCaches::new();
    let err = diff::compare(DbKind::Primary, &candidate, &installed, &mut caches).unwrap_err();

    assert!(matches!(err, Error::SchemaMismatch { .. }), "{err}");
}

#[test]
fn test_renamed_table_is_a_schema_mismatch() {
    let dir = TempDir::new().unwrap();
    let candidate = dir.path().join("candidate.sqlite");
    let installed = dir.path().join("installed.sqlite");

    write_primary(&candidate, &baseline());
    write_primary(&installed, &baseline());
    Connection::open(&candidate)
        .unwrap()
        .execute_batch("ALTER TABLE suggests RENAME TO weak_suggests;")
        .unwrap();

    let mut caches = GenerationCaches::new();
    let err = diff::compare(DbKind::Primary, &candidate, &installed, &mut caches).unwrap_err();

    match err {
        Error::SchemaMismatch { tables, .. } => assert_eq!(tables, "suggests, weak_suggests"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_two_empty_generations_are_inconsistent() {
    let dir = TempDir::new().unwrap();

    let mut caches = GenerationCaches::new();
    let err = diff::compare(
        DbKind::Primary,
        &dir.path().join("a.sqlite"),
        &dir.path().join("b.sqlite"),
        &mut caches,
    )
    .unwrap_err();

    assert!(matches!(err, Error::InconsistentDatabases { .. }), "{err}");
}

#[test]
fn test_key_tables_of_sibling_databases_are_ignored() {
    let dir = TempDir::new().unwrap();
    let candidate = dir.path().join("candidate.sqlite");
    let installed = dir.path().join("installed.sqlite");

    write_other(&candidate, &baseline());
    write_other(&installed, &baseline());
    Connection::open(&candidate)
        .unwrap()
        .execute("INSERT INTO packages VALUES (99, 'stray-id')", [])
        .unwrap();

    let primary = dir.path().join("primary.sqlite");
    write_primary(&primary, &baseline());
    let mut caches = GenerationCaches::new();
    caches.seed_from(&primary).unwrap();
    let changes = diff::compare(DbKind::Other, &candidate, &installed, &mut caches).unwrap();

    assert!(changes.is_empty(), "{changes:?}");
}

#[test]
fn test_added_package_and_dropped_changelog_across_databases() {
    let dir = TempDir::new().unwrap();
    let generation_a = baseline();
    let mut generation_b: Vec<Pkg> = generation_a
        .iter()
        .enumerate()
        .map(|(i, p)| p.rekeyed(20 + i as i64))
        .collect();
    generation_b[1].changelog.clear();
    generation_b.push(
        Pkg::new(22, "baz", "0.1")
            .files(&["/usr/bin/baz"])
            .changelog("Cy", 300, "- Initial import"),
    );

    let mut caches = GenerationCaches::new();
    let mut changes = mdapi::ChangeSet::new();
    for (kind, write) in [
        (DbKind::Primary, write_primary as fn(&std::path::Path, &[Pkg])),
        (DbKind::Other, write_other),
    ] {
        let candidate = dir.path().join(format!("b-{kind}.sqlite"));
        let installed = dir.path().join(format!("a-{kind}.sqlite"));
        write(&candidate, &generation_b);
        write(&installed, &generation_a);
        changes.extend(diff::compare(kind, &candidate, &installed, &mut caches).unwrap());
    }

    assert_eq!(changes, names(&["bar", "baz"]));
}
