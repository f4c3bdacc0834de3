// src/lock.rs

//! Advisory locks guarding installed snapshot files
//!
//! Every installed database `X` has a sibling lock file `X.lock`. The
//! synchronizer holds it exclusively around the rename that installs a new
//! generation; readers hold it shared around each read transaction.
//!
//! # Lock Strategy
//!
//! - Acquisition polls a non-blocking `flock` until a timeout expires
//! - After locking, the lock file's inode is compared with the one currently
//!   at the path. A holder that unlinked the file in between leaves us with a
//!   stale inode, in which case we start over
//! - On release the lock file is unlinked, but only if no one else holds it
//!
//! # Example
//!
//! ```ignore
//! use mdapi::lock::FileLock;
//!
//! let _guard = FileLock::shared(&db_path, timeout, poll)?;
//! // ... read db_path ...
//! // Lock released (and lock file possibly removed) on drop
//! ```

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// How a lock is held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Held advisory lock on a snapshot file
#[derive(Debug)]
pub struct FileLock {
    /// The lock file handle (kept open to maintain lock)
    file: File,
    /// Path to the lock file
    path: PathBuf,
    mode: LockMode,
}

impl FileLock {
    /// Lock file guarding `target`
    pub fn lock_path(target: &Path) -> PathBuf {
        let mut name = target.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Acquire a shared lock, waiting up to `timeout`
    pub fn shared(target: &Path, timeout: Duration, poll: Duration) -> Result<Self> {
        Self::acquire(target, LockMode::Shared, timeout, poll)
    }

    /// Acquire an exclusive lock, waiting up to `timeout`
    pub fn exclusive(target: &Path, timeout: Duration, poll: Duration) -> Result<Self> {
        Self::acquire(target, LockMode::Exclusive, timeout, poll)
    }

    fn acquire(target: &Path, mode: LockMode, timeout: Duration, poll: Duration) -> Result<Self> {
        let path = Self::lock_path(target);
        let deadline = Instant::now() + timeout;

        loop {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?;

            let attempt = match mode {
                LockMode::Shared => FileExt::try_lock_shared(&file),
                LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
            };

            match attempt {
                Ok(()) => {
                    if is_current_inode(&file, &path)? {
                        trace!("Acquired {:?} lock on {}", mode, path.display());
                        return Ok(Self { file, path, mode });
                    }
                    // Previous holder unlinked the file while we waited on it
                    debug!("Lock file {} was replaced, retrying", path.display());
                    let _ = FileExt::unlock(&file);
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(Error::LockTimeout(path.display().to_string()));
                    }
                    std::thread::sleep(poll);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Get the path to the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Only remove the lock file when nobody else holds or waits on it
        if FileExt::try_lock_exclusive(&self.file).is_ok()
            && matches!(is_current_inode(&self.file, &self.path), Ok(true))
        {
            let _ = fs::remove_file(&self.path);
        }
        let _ = FileExt::unlock(&self.file);
        trace!("Released lock on {}", self.path.display());
    }
}

#[cfg(unix)]
fn is_current_inode(file: &File, path: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(held.ino() == current.ino() && held.dev() == current.dev()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn is_current_inode(_file: &File, path: &Path) -> Result<bool> {
    Ok(path.exists())
}
