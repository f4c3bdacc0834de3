// src/store/layout.rs
//! On-disk naming of installed snapshots
//!
//! Every installed database lives directly in the database folder as
//! `mdapi-{branch}[-{variant}]-{kind}.sqlite`. The `release` variant carries
//! no suffix.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use strum_macros::{AsRefStr, Display, EnumString};

const FILE_PREFIX: &str = "mdapi-";
const FILE_SUFFIX: &str = ".sqlite";

/// The three sibling databases of one repository snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum DbKind {
    /// Packages plus the relation tables
    Primary,
    /// Per-package file lists
    Filelists,
    /// Changelogs
    Other,
}

impl DbKind {
    /// Classify a repodata artifact by its file name
    pub fn from_artifact_name(filename: &str) -> Option<Self> {
        if filename.contains("primary.sqlite") {
            Some(Self::Primary)
        } else if filename.contains("filelists.sqlite") {
            Some(Self::Filelists)
        } else if filename.contains("other.sqlite") {
            Some(Self::Other)
        } else {
            None
        }
    }
}

/// Repository sub-channel of a branch, in lookup precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum RepoVariant {
    UpdatesTesting,
    Updates,
    Testing,
    Release,
}

impl RepoVariant {
    /// All variants, highest precedence first
    pub const PRECEDENCE: [RepoVariant; 4] = [
        RepoVariant::UpdatesTesting,
        RepoVariant::Updates,
        RepoVariant::Testing,
        RepoVariant::Release,
    ];

    /// Suffix appended to the branch name in file names
    pub fn suffix(&self) -> Option<&'static str> {
        match self {
            Self::UpdatesTesting => Some("updates-testing"),
            Self::Updates => Some("updates"),
            Self::Testing => Some("testing"),
            Self::Release => None,
        }
    }

    /// Label under which this variant of `branch` is installed
    pub fn label(&self, branch: &str) -> String {
        match self.suffix() {
            Some(suffix) => format!("{branch}-{suffix}"),
            None => branch.to_string(),
        }
    }
}

/// Path derivation for the database folder
#[derive(Debug, Clone)]
pub struct SnapshotLayout {
    root: PathBuf,
}

impl SnapshotLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The database folder itself
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Installed path of one database of a labelled repository
    pub fn path(&self, label: &str, kind: DbKind) -> PathBuf {
        self.root.join(format!("{FILE_PREFIX}{label}-{kind}{FILE_SUFFIX}"))
    }

    /// Installed path of one database of a branch variant
    pub fn variant_path(&self, branch: &str, variant: RepoVariant, kind: DbKind) -> PathBuf {
        self.path(&variant.label(branch), kind)
    }

    /// Branch names that have at least one installed database
    pub fn list_branches(&self) -> io::Result<Vec<String>> {
        let mut branches = BTreeSet::new();
        for entry in fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            if let Some(branch) = name.to_str().and_then(branch_from_file_name) {
                branches.insert(branch.to_string());
            }
        }
        Ok(branches.into_iter().collect())
    }
}

/// Extract the branch from `mdapi-{branch}[-{variant}]-{kind}.sqlite`
fn branch_from_file_name(name: &str) -> Option<&str> {
    let label = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    let (label, kind) = label.rsplit_once('-')?;
    kind.parse::<DbKind>().ok()?;

    let branch = RepoVariant::PRECEDENCE
        .iter()
        .filter_map(|v| v.suffix())
        .find_map(|suffix| label.strip_suffix(suffix)?.strip_suffix('-'))
        .unwrap_or(label);

    (!branch.is_empty()).then_some(branch)
}
