// src/compression/mod.rs
//! Archive codec for repository metadata artifacts
//!
//! Upstream repodata ships its SQLite databases raw or wrapped in one of
//! several compression formats (gzip, bzip2, xz, zstd, or a gzip tarball).
//! This module turns such an artifact into a plain SQLite file on disk.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Compression-related errors
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("Failed to create {format} decoder: {source}")]
    DecoderCreation {
        format: &'static str,
        source: io::Error,
    },

    #[error("Failed to decompress {format} data: {source}")]
    Decompression {
        format: &'static str,
        source: io::Error,
    },

    #[error("No SQLite database inside tarball {0}")]
    EmptyTarball(String),
}

/// Supported artifact formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// No compression (raw SQLite file)
    None,
    /// Gzip compression (.gz)
    Gzip,
    /// Gzip-compressed tarball holding the database (.tar.gz)
    TarGz,
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// XZ/LZMA compression (.xz)
    Xz,
    /// Zstandard compression (.zst)
    Zstd,
}

impl CompressionFormat {
    /// Detect the format of a repodata artifact from its file name
    ///
    /// Returns `None` for names the codec cannot handle; callers treat that
    /// as a configuration error rather than a transient failure.
    ///
    /// # Examples
    /// ```
    /// use mdapi::compression::CompressionFormat;
    ///
    /// assert_eq!(CompressionFormat::from_extension("abc-primary.sqlite.xz"), Some(CompressionFormat::Xz));
    /// assert_eq!(CompressionFormat::from_extension("abc-primary.sqlite.tar.gz"), Some(CompressionFormat::TarGz));
    /// assert_eq!(CompressionFormat::from_extension("abc-primary.sqlite"), Some(CompressionFormat::None));
    /// assert_eq!(CompressionFormat::from_extension("abc-primary.sqlite.rar"), None);
    /// ```
    pub fn from_extension(path: &str) -> Option<Self> {
        if path.ends_with(".xz") {
            Some(Self::Xz)
        } else if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if path.ends_with(".gz") {
            Some(Self::Gzip)
        } else if path.ends_with(".bz2") {
            Some(Self::Bzip2)
        } else if path.ends_with(".zst") || path.ends_with(".zstd") {
            Some(Self::Zstd)
        } else if path.ends_with(".sqlite") {
            Some(Self::None)
        } else {
            None
        }
    }

    /// Detect compression format from magic bytes
    ///
    /// Magic bytes:
    /// - Gzip: `1f 8b`
    /// - Bzip2: `42 5a 68` ("BZh")
    /// - XZ: `fd 37 7a 58 5a 00` (FD + "7zXZ" + NUL)
    /// - Zstd: `28 b5 2f fd`
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if data.starts_with(b"BZh") {
            Self::Bzip2
        } else if data.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
            Self::Xz
        } else if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// Get a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::TarGz => "tar.gz",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Create a decompressing reader for the given stream format
///
/// `TarGz` is a container rather than a stream; it is handled by
/// [`decode_archive`] and decodes here as plain gzip.
pub fn create_decoder<'a, R: Read + 'a>(
    reader: R,
    format: CompressionFormat,
) -> std::result::Result<Box<dyn Read + 'a>, CompressionError> {
    match format {
        CompressionFormat::None => Ok(Box::new(reader)),
        CompressionFormat::Gzip | CompressionFormat::TarGz => {
            Ok(Box::new(flate2::read::GzDecoder::new(reader)))
        }
        CompressionFormat::Bzip2 => Ok(Box::new(bzip2::read::BzDecoder::new(reader))),
        CompressionFormat::Xz => Ok(Box::new(xz2::read::XzDecoder::new(reader))),
        CompressionFormat::Zstd => {
            let decoder =
                zstd::Decoder::new(reader).map_err(|e| CompressionError::DecoderCreation {
                    format: "zstd",
                    source: e,
                })?;
            Ok(Box::new(decoder))
        }
    }
}

/// Decode the artifact at `archive` into a plain database file at `dest`
///
/// The format is chosen from the artifact's file name. Returns the number of
/// bytes written.
pub fn decode_archive(archive: &Path, dest: &Path) -> Result<u64> {
    let name = archive.to_string_lossy();
    let mut format = CompressionFormat::from_extension(&name)
        .ok_or_else(|| Error::UnsupportedArchive(name.to_string()))?;

    let mut input = BufReader::new(File::open(archive)?);

    // A bare .sqlite name may still hide a compressed payload
    if format == CompressionFormat::None {
        let detected = CompressionFormat::from_magic_bytes(input.fill_buf()?);
        if detected != CompressionFormat::None {
            debug!("{} has no compression suffix but looks like {}", name, detected);
            format = detected;
        }
    }

    debug!("Decoding {} ({}) to {}", archive.display(), format, dest.display());

    let mut output = BufWriter::new(File::create(dest)?);

    let written = if format == CompressionFormat::TarGz {
        extract_database_from_tarball(input, &mut output, &name)?
    } else {
        let mut decoder = create_decoder(input, format)?;
        io::copy(&mut decoder, &mut output).map_err(|e| CompressionError::Decompression {
            format: format.name(),
            source: e,
        })?
    };

    output.flush()?;
    Ok(written)
}

/// Copy the first `.sqlite` member of a gzip tarball into `output`
fn extract_database_from_tarball<R: Read, W: Write>(
    input: R,
    output: &mut W,
    name: &str,
) -> std::result::Result<u64, CompressionError> {
    let corrupt = |e| CompressionError::Decompression {
        format: "tar.gz",
        source: e,
    };

    let mut tarball = tar::Archive::new(flate2::read::GzDecoder::new(input));
    for entry in tarball.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let is_database = entry
            .path()
            .map_err(corrupt)?
            .to_string_lossy()
            .ends_with(".sqlite");
        if is_database {
            return io::copy(&mut entry, output).map_err(corrupt);
        }
    }

    Err(CompressionError::EmptyTarball(name.to_string()))
}
