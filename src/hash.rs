// src/hash.rs

//! Checksums for repository metadata
//!
//! repomd.xml announces an `open-checksum` for every database: the digest of
//! the *decompressed* file. Comparing that digest against the installed copy
//! is how the synchronizer decides whether an artifact needs fetching at all.
//!
//! | Manifest name | Algorithm |
//! |---------------|-----------|
//! | `sha`, `sha1` | SHA-1 (`sha` is what very old EPEL repos emit) |
//! | `sha224` .. `sha512` | SHA-2 family |
//! | `md5` | MD5 |

use crate::error::Result;
use sha2::Digest;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Buffer size for streaming file digests
const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Hash algorithm announced by a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Get the algorithm name as a string
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Hex digest of everything `reader` yields
    pub fn hexdigest_reader<R: Read>(&self, reader: R) -> io::Result<String> {
        match self {
            Self::Md5 => digest_stream::<md5::Md5, _>(reader),
            Self::Sha1 => digest_stream::<sha1::Sha1, _>(reader),
            Self::Sha224 => digest_stream::<sha2::Sha224, _>(reader),
            Self::Sha256 => digest_stream::<sha2::Sha256, _>(reader),
            Self::Sha384 => digest_stream::<sha2::Sha384, _>(reader),
            Self::Sha512 => digest_stream::<sha2::Sha512, _>(reader),
        }
    }

    /// Hex digest of the file at `path`
    pub fn hexdigest_path(&self, path: &Path) -> io::Result<String> {
        self.hexdigest_reader(File::open(path)?)
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            // Legacy repomd files write plain "sha" for SHA-1
            "sha" | "sha1" | "sha-1" => Ok(Self::Sha1),
            "sha224" | "sha-224" => Ok(Self::Sha224),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "sha384" | "sha-384" => Ok(Self::Sha384),
            "sha512" | "sha-512" => Ok(Self::Sha512),
            _ => Err(HashError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Hash computation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Unknown hash algorithm name
    UnknownAlgorithm(String),
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAlgorithm(name) => write!(f, "unknown hash algorithm: {}", name),
        }
    }
}

impl std::error::Error for HashError {}

fn digest_stream<D: Digest, R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Staleness gate: does the installed file differ from the remote artifact?
///
/// A file that was never installed always needs an update.
pub fn needs_update(installed: &Path, remote_hex: &str, algorithm: HashAlgorithm) -> Result<bool> {
    if !installed.is_file() {
        debug!("{} not installed yet", installed.display());
        return Ok(true);
    }

    let local_hex = algorithm.hexdigest_path(installed)?;
    Ok(!local_hex.eq_ignore_ascii_case(remote_hex.trim()))
}
