// src/config.rs
//! Configuration file parsing for mdapi
//!
//! Supports TOML configuration files with the following sections:
//! - top level: `db_folder`, `log_level`
//! - [upstream] - Bodhi, download server and koji URLs
//! - [sync] - Change publishing, checksum verification, retry, workers
//! - [publish] - Message endpoint and topic
//! - [server] - Bind address, lock timeouts
//!
//! Every key has a default, so an empty file is a valid configuration.

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// TOML configuration file structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Folder holding every installed snapshot
    #[serde(default = "default_db_folder")]
    pub db_folder: PathBuf,

    /// Default log filter (RUST_LOG takes precedence)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub upstream: UpstreamSection,

    #[serde(default)]
    pub sync: SyncSection,

    #[serde(default)]
    pub publish: PublishSection,

    #[serde(default)]
    pub server: ServerSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_folder: default_db_folder(),
            log_level: default_log_level(),
            upstream: UpstreamSection::default(),
            sync: SyncSection::default(),
            publish: PublishSection::default(),
            server: ServerSection::default(),
        }
    }
}

fn default_db_folder() -> PathBuf {
    PathBuf::from("/var/tmp")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Upstream servers
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamSection {
    /// Bodhi instance used to enumerate branches
    #[serde(default = "default_bodhi_url")]
    pub bodhi_url: String,

    /// Master mirror serving repodata
    #[serde(default = "default_dl_server")]
    pub dl_server: String,

    /// Koji repos root
    #[serde(default = "default_koji_repo")]
    pub koji_repo: String,
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            bodhi_url: default_bodhi_url(),
            dl_server: default_dl_server(),
            koji_repo: default_koji_repo(),
        }
    }
}

fn default_bodhi_url() -> String {
    "https://bodhi.fedoraproject.org".to_string()
}

fn default_dl_server() -> String {
    "https://dl.fedoraproject.org".to_string()
}

fn default_koji_repo() -> String {
    "https://kojipkgs.fedoraproject.org/repos".to_string()
}

/// Synchronizer settings
#[derive(Debug, Clone, Deserialize)]
pub struct SyncSection {
    /// Diff new generations and announce the changed packages
    #[serde(default)]
    pub publish_changes: bool,

    /// Check decoded artifacts against the manifest's open-checksum
    #[serde(default = "default_true")]
    pub verify_checksums: bool,

    /// Total attempts per source, first one included
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Pause between attempts
    #[serde(default = "default_retry_sleep_secs")]
    pub retry_sleep_secs: u64,

    /// Per-request HTTP timeout
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Number of sources synchronized in parallel
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            publish_changes: false,
            verify_checksums: true,
            retry_attempts: default_retry_attempts(),
            retry_sleep_secs: default_retry_sleep_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            workers: default_workers(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_retry_attempts() -> u32 {
    4
}

fn default_retry_sleep_secs() -> u64 {
    30
}

fn default_http_timeout_secs() -> u64 {
    300
}

fn default_workers() -> usize {
    1
}

/// Change publisher settings
#[derive(Debug, Clone, Deserialize)]
pub struct PublishSection {
    /// HTTP endpoint accepting message envelopes; log-only when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_topic")]
    pub topic: String,
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            topic: default_topic(),
        }
    }
}

fn default_topic() -> String {
    "mdapi.repo.update".to_string()
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Public API bind address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// How long a reader waits for a snapshot lock
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Poll interval while waiting for a lock
    #[serde(default = "default_lock_poll_ms")]
    pub lock_poll_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            lock_timeout_secs: default_lock_timeout_secs(),
            lock_poll_ms: default_lock_poll_ms(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_lock_timeout_secs() -> u64 {
    30
}

fn default_lock_poll_ms() -> u64 {
    100
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        if self.sync.retry_attempts == 0 {
            return Err(Error::Config("sync.retry_attempts must be at least 1".into()));
        }
        if self.sync.workers == 0 {
            return Err(Error::Config("sync.workers must be at least 1".into()));
        }

        Ok(())
    }

    /// Parsed server bind address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server.bind.parse().map_err(|_| {
            Error::Config(format!("invalid server.bind address: {}", self.server.bind))
        })
    }

    /// Whole-source retry policy
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.sync.retry_attempts,
            Duration::from_secs(self.sync.retry_sleep_secs),
        )
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.http_timeout_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.server.lock_timeout_secs)
    }

    pub fn lock_poll(&self) -> Duration {
        Duration::from_millis(self.server.lock_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.db_folder, PathBuf::from("/var/tmp"));
        assert!(!config.sync.publish_changes);
        assert!(config.sync.verify_checksums);
        assert_eq!(config.sync.retry_attempts, 4);
        assert_eq!(config.retry_policy().max_attempts, 4);
        assert_eq!(config.lock_poll(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            db_folder = "/srv/mdapi"

            [upstream]
            dl_server = "https://mirror.example.org"

            [sync]
            publish_changes = true
            workers = 4

            [publish]
            endpoint = "http://localhost:8000/publish"

            [server]
            bind = "127.0.0.1:9000"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.db_folder, PathBuf::from("/srv/mdapi"));
        assert_eq!(config.upstream.dl_server, "https://mirror.example.org");
        assert_eq!(config.upstream.bodhi_url, "https://bodhi.fedoraproject.org");
        assert!(config.sync.publish_changes);
        assert_eq!(config.sync.workers, 4);
        assert_eq!(config.sync.retry_sleep_secs, 30);
        assert_eq!(
            config.publish.endpoint.as_deref(),
            Some("http://localhost:8000/publish")
        );
        assert_eq!(config.publish.topic, "mdapi.repo.update");
        assert_eq!(config.bind_addr().unwrap().port(), 9000);
    }

    #[test]
    fn test_load_rejects_bad_bind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mdapi.toml");
        std::fs::write(&path, "[server]\nbind = \"not-an-address\"\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/mdapi.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
