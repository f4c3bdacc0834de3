// src/repository/mod.rs

//! Upstream repository synchronization
//!
//! This module provides functionality for:
//! - Enumerating the branches to track and their repodata URLs
//! - Fetching manifests and database artifacts
//! - Installing new snapshot generations atomically

mod catalog;
mod client;
mod sync;

pub use catalog::{BodhiCatalog, Branch, BranchCatalog, build_sources};
pub use client::{Fetch, RepositoryClient};
pub use sync::{RepoSource, SCRATCH_PREFIX, SourceOutcome, SyncReport, Synchronizer};
