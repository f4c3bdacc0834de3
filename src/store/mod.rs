// src/store/mod.rs
//! Installed snapshots: file layout, record types and the variant resolver

pub mod layout;
pub mod models;
mod resolver;

pub use layout::{DbKind, RepoVariant, SnapshotLayout};
pub use models::{
    Changelog, ChangelogEntry, FileEntry, FileList, PackageInfo, PackageRecord, PkgId, PkgKey,
    RelationKind, RelationRecord,
};
pub use resolver::{PackageQuery, Snapshot, SnapshotStore};
