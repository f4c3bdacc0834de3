// src/lib.rs

//! mdapi - repository metadata cache and query API
//!
//! Keeps local copies of the primary, filelists and other SQLite databases
//! of Fedora and EPEL repositories and answers package queries against them.
//!
//! # Architecture
//!
//! - Synchronization: manifest fetch, staleness check by open-checksum,
//!   decode in a scratch directory, optional diff + announcement, atomic
//!   rename under an exclusive advisory lock
//! - Query resolution: one variant (updates-testing, updates, testing,
//!   release) is picked per request and every read of that request goes to it
//! - Readers and the installer coordinate through `flock` on `{file}.lock`

pub mod compression;
pub mod config;
pub mod diff;
mod error;
pub mod hash;
pub mod lock;
pub mod publish;
pub mod repomd;
pub mod repository;
pub mod retry;
pub mod store;

#[cfg(feature = "server")]
pub mod server;

pub use config::Config;
pub use diff::{ChangeSet, GenerationCaches};
pub use error::{Error, Result};
pub use hash::HashAlgorithm;
pub use publish::{ChangePublisher, PublishError};
pub use repository::{RepoSource, SyncReport, Synchronizer};
pub use store::{DbKind, PackageQuery, RepoVariant, Snapshot, SnapshotStore};
