// src/repository/sync.rs

//! Repository synchronization
//!
//! One run per [`RepoSource`]:
//!
//! 1. fetch `{url}/repomd.xml` and pick its SQLite artifacts, primary first
//! 2. skip every artifact whose installed copy already has the announced
//!    open-checksum
//! 3. download and decode the rest inside a scratch directory under the
//!    database folder
//! 4. optionally diff the candidate against the installed generation and
//!    announce the changed packages
//! 5. rename the candidate over the installed file under its exclusive lock
//!
//! Readers therefore only ever see complete files. The three databases of a
//! source are installed one after the other, not as a unit.

use crate::compression;
use crate::config::Config;
use crate::diff::{self, ChangeSet, GenerationCaches};
use crate::error::{Error, Result};
use crate::hash;
use crate::lock::FileLock;
use crate::publish::ChangePublisher;
use crate::repomd::{self, ArtifactDescriptor};
use crate::retry::retry_with;
use crate::store::{DbKind, SnapshotLayout};
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

use super::client::{Fetch, RepositoryClient};

/// Prefix of scratch directories created inside the database folder
pub const SCRATCH_PREFIX: &str = "mdapi-scratch-";

/// An upstream repodata directory and the label it is installed under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSource {
    pub url: String,
    pub label: String,
}

impl RepoSource {
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
        }
    }

    fn artifact_url(&self, filename: &str) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), filename)
    }
}

/// What one run did for a source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub label: String,
    /// Databases replaced by a new generation
    pub installed: Vec<DbKind>,
    /// Databases whose installed copy was already current
    pub unchanged: Vec<DbKind>,
    /// Packages that changed, when change publishing is enabled
    pub changes: ChangeSet,
}

impl SyncReport {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Default::default()
        }
    }
}

/// Result of synchronizing one source as part of a batch
#[derive(Debug)]
pub struct SourceOutcome {
    pub label: String,
    pub result: Result<SyncReport>,
}

/// Fetches, decodes, diffs and installs new snapshot generations
pub struct Synchronizer {
    config: Config,
    layout: SnapshotLayout,
    fetcher: Box<dyn Fetch>,
    publisher: ChangePublisher,
}

impl Synchronizer {
    pub fn new(config: Config, fetcher: Box<dyn Fetch>, publisher: ChangePublisher) -> Self {
        let layout = SnapshotLayout::new(&config.db_folder);
        Self {
            config,
            layout,
            fetcher,
            publisher,
        }
    }

    /// Synchronizer talking to the real network
    pub fn from_config(config: Config) -> Result<Self> {
        let fetcher = RepositoryClient::new(config.http_timeout())?;
        let publisher = ChangePublisher::from_config(&config)
            .map_err(|e| Error::Config(format!("cannot set up publisher: {e}")))?;
        Ok(Self::new(config, Box::new(fetcher), publisher))
    }

    /// Synchronize every source, in parallel when more than one worker is configured
    ///
    /// A failing source does not stop the others.
    pub fn sync_all(&self, sources: &[RepoSource]) -> Vec<SourceOutcome> {
        let run = |source: &RepoSource| SourceOutcome {
            label: source.label.clone(),
            result: self.sync_source(source),
        };

        let workers = self.config.sync.workers;
        if workers <= 1 {
            return sources.iter().map(run).collect();
        }

        match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(|| sources.par_iter().map(run).collect()),
            Err(e) => {
                warn!("Cannot start {} sync workers ({}), running serially", workers, e);
                sources.iter().map(run).collect()
            }
        }
    }

    /// [`Self::process_source`] with whole-source retry on transient failures
    pub fn sync_source(&self, source: &RepoSource) -> Result<SyncReport> {
        let result = retry_with(self.config.retry_policy(), Error::is_transient, |attempt| {
            if attempt > 1 {
                info!("[{}] Attempt {}", source.label, attempt);
            }
            self.process_source(source)
        });

        if let Err(e) = &result {
            error!("[{}] Synchronization failed: {}", source.label, e);
        }
        result
    }

    /// One pass over a source; safe to re-run
    pub fn process_source(&self, source: &RepoSource) -> Result<SyncReport> {
        let label = source.label.as_str();
        let mut report = SyncReport::new(label);

        let manifest_url = source.artifact_url("repomd.xml");
        let manifest = match self.fetcher.fetch_text(&manifest_url) {
            Ok(manifest) => manifest,
            Err(e @ Error::Http { .. }) if !e.is_transient() => {
                error!("[{}] Failed to obtain {}: {}", label, manifest_url, e);
                return Ok(report);
            }
            Err(e) => return Err(e),
        };

        let artifacts = repomd::parse_manifest(&manifest)?;
        if artifacts.is_empty() {
            warn!("[{}] No SQLite database could be found in {}", label, source.url);
            return Ok(report);
        }

        // Generation-scoped pkgId -> name maps, filled by the primary
        let mut caches = GenerationCaches::new();

        for artifact in &artifacts {
            let Some(kind) = artifact.kind() else {
                debug!("[{}] Ignoring {}", label, artifact.filename);
                continue;
            };

            let artifact_url = source.artifact_url(&artifact.filename);
            let dest = self.layout.path(label, kind);

            if !hash::needs_update(&dest, &artifact.checksum, artifact.algorithm)? {
                info!("[{}] No change detected from {}", label, artifact_url);
                if kind == DbKind::Primary && self.config.sync.publish_changes {
                    caches.seed_from(&dest)?;
                }
                report.unchanged.push(kind);
                continue;
            }

            let changes = self.install_artifact(label, artifact, kind, &artifact_url, &dest, &mut caches)?;
            report.changes.extend(changes);
            report.installed.push(kind);
        }

        Ok(report)
    }

    fn install_artifact(
        &self,
        label: &str,
        artifact: &ArtifactDescriptor,
        kind: DbKind,
        artifact_url: &str,
        dest: &Path,
        caches: &mut GenerationCaches,
    ) -> Result<ChangeSet> {
        // Same filesystem as dest, so the final rename is atomic
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(self.layout.root())?;

        let archive_name = Path::new(&artifact.filename)
            .file_name()
            .ok_or_else(|| Error::Manifest(format!("bad location {}", artifact.filename)))?;
        let archive = scratch.path().join(archive_name);
        let candidate = scratch.path().join(format!("candidate-{kind}.sqlite"));

        info!("[{}] Downloading {} to {}", label, artifact_url, archive.display());
        self.fetcher.download(artifact_url, &archive)?;

        info!("[{}] Extracting {} to {}", label, archive.display(), candidate.display());
        compression::decode_archive(&archive, &candidate)?;

        if self.config.sync.verify_checksums {
            let actual = artifact.algorithm.hexdigest_path(&candidate)?;
            if !actual.eq_ignore_ascii_case(&artifact.checksum) {
                return Err(Error::ChecksumMismatch {
                    path: artifact_url.to_string(),
                    expected: artifact.checksum.clone(),
                    actual,
                });
            }
        }

        let mut changes = ChangeSet::new();
        if self.config.sync.publish_changes {
            match diff::compare(kind, &candidate, dest, caches) {
                Ok(found) => {
                    self.publisher.announce(label, &found, artifact_url);
                    changes = found;
                }
                Err(e) => error!("[{}] Cannot compare {} databases: {}", label, kind, e),
            }
        } else {
            debug!("[{}] Change publishing disabled, not comparing databases", label);
        }

        info!("[{}] Installing {} to {}", label, candidate.display(), dest.display());
        let _lock = FileLock::exclusive(dest, self.config.lock_timeout(), self.config.lock_poll())?;
        fs::rename(&candidate, dest)?;

        Ok(changes)
    }
}
