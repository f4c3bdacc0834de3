// src/error.rs

//! Crate-wide error type
//!
//! Errors fall into a few families that callers treat differently:
//! - transient transport/filesystem failures, retried at source granularity
//! - decode failures (unsupported or corrupt archives), never retried
//! - schema failures between two generations of a database
//! - lookup failures surfaced to HTTP clients as 400/404

use crate::compression::CompressionError;
use crate::hash::HashError;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network failure while talking to an upstream server
    #[error("download failed: {0}")]
    Download(String),

    /// Upstream answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// Decoded artifact does not match the checksum announced by the manifest
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Artifact extension is not one the archive codec knows
    #[error("unsupported archive: {0}")]
    UnsupportedArchive(String),

    /// Archive could not be decoded
    #[error(transparent)]
    Decompression(#[from] CompressionError),

    /// Manifest could not be parsed
    #[error("malformed manifest: {0}")]
    Manifest(String),

    /// Unknown or unsupported hash algorithm in a manifest
    #[error(transparent)]
    Hash(#[from] HashError),

    /// Two generations of a database have different table sets
    #[error("cannot compare disparate databases {candidate} and {installed}: tables differ ({tables})")]
    SchemaMismatch {
        candidate: String,
        installed: String,
        /// Tables present in only one of the two generations
        tables: String,
    },

    /// Neither generation of a database has any table
    #[error("neither {candidate} nor {installed} contains any table")]
    InconsistentDatabases { candidate: String, installed: String },

    /// SQLite failure
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No variant file of the branch exists
    #[error("unknown branch: {0}")]
    UnknownBranch(String),

    /// A sibling database of the chosen variant is missing
    #[error("missing snapshot file: {0}")]
    MissingSnapshot(String),

    /// Lookup missed in every existing variant
    #[error("not found: {0}")]
    NotFound(String),

    /// Advisory lock could not be acquired in time
    #[error("timed out waiting for lock {0}")]
    LockTimeout(String),

    /// Lookup pattern could not be compiled
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON decoding failure (catalog responses)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether retrying the whole source has a chance of succeeding
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io(_)
            | Self::Download(_)
            | Self::ChecksumMismatch { .. }
            | Self::LockTimeout(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::Http {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => Self::Download(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Download("reset".into()).is_transient());
        assert!(Error::Io(std::io::Error::other("disk")).is_transient());
        assert!(
            Error::Http {
                status: 503,
                url: "u".into()
            }
            .is_transient()
        );
        assert!(
            !Error::Http {
                status: 404,
                url: "u".into()
            }
            .is_transient()
        );
        assert!(Error::LockTimeout("primary.sqlite.lock".into()).is_transient());
        assert!(!Error::UnsupportedArchive("x.rar".into()).is_transient());
        assert!(!Error::NotFound("foo".into()).is_transient());
    }
}
