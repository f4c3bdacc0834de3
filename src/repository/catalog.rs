// src/repository/catalog.rs

//! Branch catalog and source list construction
//!
//! Bodhi knows which Fedora and EPEL releases are active. Each active branch
//! expands into a fixed set of repodata directories on the download server:
//!
//! | Branch kind | Installed labels |
//! |-------------|------------------|
//! | rawhide, frozen Fedora | `{b}` |
//! | current Fedora | `{b}`, `{b}-updates`, `{b}-updates-testing` |
//! | EPEL, EPEL Next | `{b}`, `{b}-testing` |
//!
//! Every one of those gets a `src_`-prefixed source-tree twin, and the koji
//! rawhide repo comes last.

use crate::config::UpstreamSection;
use crate::error::Result;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use super::client::RepositoryClient;
use super::sync::RepoSource;

/// Bodhi id prefixes of the releases mdapi tracks
const TRACKED_PREFIXES: [&str; 3] = ["FEDORA", "FEDORA-EPEL", "FEDORA-EPEL-NEXT"];

/// Release number of a Fedora branch name such as `f41`
fn fedora_version(branch: &str) -> Option<&str> {
    branch
        .strip_prefix('f')
        .filter(|v| !v.is_empty() && v.bytes().all(|c| c.is_ascii_digit()))
}

/// First `N` or `N.M` in a branch name: `epel9-next` -> `9`, `epel10.1` -> `10.1`
fn branch_version(branch: &str) -> Option<&str> {
    let start = branch.find(|c: char| c.is_ascii_digit())?;
    let rest = &branch[start..];
    let major = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let end = match rest[major..].strip_prefix('.') {
        Some(minor) => {
            let digits = minor.find(|c: char| !c.is_ascii_digit()).unwrap_or(minor.len());
            if digits > 0 { major + 1 + digits } else { major }
        }
        None => major,
    };
    Some(&rest[..end])
}

/// A release as reported by Bodhi
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Branch {
    pub branch: String,
    pub state: String,
    pub version: String,
    pub id_prefix: String,
}

/// Source of active branches
pub trait BranchCatalog {
    /// Tracked branches in `state` (`current`, `frozen`, `pending`), sorted by name
    fn list_branches(&self, state: &str) -> Result<Vec<Branch>>;
}

#[derive(Debug, Deserialize)]
struct ReleasesPage {
    releases: Vec<Branch>,
    #[serde(default = "one")]
    pages: u32,
}

fn one() -> u32 {
    1
}

/// Catalog backed by the Bodhi releases API
pub struct BodhiCatalog {
    base_url: String,
    client: RepositoryClient,
}

impl BodhiCatalog {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            client: RepositoryClient::new(timeout)?,
        })
    }
}

impl BranchCatalog for BodhiCatalog {
    fn list_branches(&self, state: &str) -> Result<Vec<Branch>> {
        let url = format!("{}/releases/", self.base_url.trim_end_matches('/'));

        let mut branches = Vec::new();
        let mut page = 1;
        loop {
            let page_param = page.to_string();
            let body: ReleasesPage = self
                .client
                .fetch_json(&url, &[("state", state), ("page", &page_param)])?;
            branches.extend(
                body.releases
                    .into_iter()
                    .filter(|b| TRACKED_PREFIXES.contains(&b.id_prefix.as_str())),
            );
            if page >= body.pages {
                break;
            }
            page += 1;
        }

        branches.sort_by(|a, b| a.branch.cmp(&b.branch));
        info!("Acquired {} {} branches", branches.len(), state);
        Ok(branches)
    }
}

/// Source-tree twin of a binary repodata URL
fn source_tree_url(url: &str) -> String {
    if url.contains("/x86_64/os/") {
        url.replace("/x86_64/os/", "/source/tree/")
    } else {
        url.replace("/x86_64/", "/source/tree/")
    }
}

fn push_with_source_twin(sources: &mut Vec<RepoSource>, url: String, label: String) {
    let src_url = source_tree_url(&url);
    let src_label = format!("src_{label}");
    sources.push(RepoSource::new(url, label));
    sources.push(RepoSource::new(src_url, src_label));
}

/// Every repository to synchronize, in processing order
pub fn build_sources(catalog: &dyn BranchCatalog, upstream: &UpstreamSection) -> Result<Vec<RepoSource>> {
    let dl = upstream.dl_server.trim_end_matches('/');
    let mut sources = Vec::new();

    // Development trees: rawhide plus a branched release, if any
    let frozen = catalog.list_branches("frozen")?;
    let development = std::iter::once("rawhide".to_string()).chain(frozen.into_iter().map(|b| b.branch));
    for name in development {
        let version = if name == "rawhide" {
            name.clone()
        } else if let Some(version) = fedora_version(&name) {
            version.to_string()
        } else {
            warn!("Skipping unexpected development branch {}", name);
            continue;
        };
        let url = format!("{dl}/pub/fedora/linux/development/{version}/Everything/x86_64/os/repodata/");
        info!("Acquired repo for {}/{} branch at {}", name, version, url);
        push_with_source_twin(&mut sources, url, name);
    }

    for branch in catalog.list_branches("current")? {
        let Some(version) = branch_version(&branch.branch).map(String::from) else {
            warn!("Skipping branch {} without a version", branch.branch);
            continue;
        };
        let b = &branch.branch;

        let repos: Vec<(String, String)> = match branch.id_prefix.as_str() {
            "FEDORA" => vec![
                (
                    format!("{dl}/pub/fedora/linux/releases/{version}/Everything/x86_64/os/repodata/"),
                    b.clone(),
                ),
                (
                    format!("{dl}/pub/fedora/linux/updates/{version}/Everything/x86_64/repodata/"),
                    format!("{b}-updates"),
                ),
                (
                    format!("{dl}/pub/fedora/linux/updates/testing/{version}/Everything/x86_64/repodata/"),
                    format!("{b}-updates-testing"),
                ),
            ],
            "FEDORA-EPEL" => vec![
                (format!("{dl}/pub/epel/{version}/Everything/x86_64/repodata/"), b.clone()),
                (
                    format!("{dl}/pub/epel/testing/{version}/Everything/x86_64/repodata/"),
                    format!("{b}-testing"),
                ),
            ],
            "FEDORA-EPEL-NEXT" => vec![
                (format!("{dl}/pub/epel/next/{version}/Everything/x86_64/repodata/"), b.clone()),
                (
                    format!("{dl}/pub/epel/next/testing/{version}/Everything/x86_64/repodata/"),
                    format!("{b}-testing"),
                ),
            ],
            other => {
                warn!("Skipping branch {} with unknown prefix {}", b, other);
                continue;
            }
        };

        for (url, label) in repos {
            push_with_source_twin(&mut sources, url, label);
        }
    }

    let koji = upstream.koji_repo.trim_end_matches('/');
    sources.push(RepoSource::new(
        format!("{koji}/rawhide/latest/x86_64/repodata/"),
        "koji",
    ));

    Ok(sources)
}
