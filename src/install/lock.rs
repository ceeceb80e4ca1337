// src/install/lock.rs

//! Per-build advisory locks
//!
//! Each build acquires an exclusive flock on `<store>/locks/<hash>.lock`
//! before touching its prefix, so concurrent processes installing
//! overlapping DAGs never build the same node twice. The lock is
//! released when the guard drops.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Exclusive lock on one build hash, released on drop
pub struct BuildLock {
    file: File,
    path: PathBuf,
    hash: String,
}

impl BuildLock {
    /// Acquire the lock for `hash`, retrying with exponential backoff
    /// until `timeout_ms` has elapsed
    pub fn acquire(lock_dir: &Path, hash: &str, timeout_ms: u64) -> Result<BuildLock> {
        fs::create_dir_all(lock_dir)?;
        let path = lock_dir.join(format!("{}.lock", hash));
        let file = File::create(&path)?;

        let start = Instant::now();
        let mut delay = Duration::from_millis(50);
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!("Acquired build lock for {}", hash);
                    return Ok(BuildLock {
                        file,
                        path,
                        hash: hash.to_string(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    let waited = start.elapsed();
                    if waited.as_millis() as u64 >= timeout_ms {
                        return Err(Error::LockTimeout {
                            hash: hash.to_string(),
                            waited_ms: waited.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(delay.min(Duration::from_millis(
                        timeout_ms.saturating_sub(waited.as_millis() as u64).max(1),
                    )));
                    delay = (delay * 2).min(Duration::from_secs(2));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Try once without waiting; None when another process holds it
    pub fn try_acquire(lock_dir: &Path, hash: &str) -> Result<Option<BuildLock>> {
        fs::create_dir_all(lock_dir)?;
        let path = lock_dir.join(format!("{}.lock", hash));
        let file = File::create(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(BuildLock {
                file,
                path,
                hash: hash.to_string(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            debug!("Failed to release build lock for {}: {}", self.hash, e);
        }
    }
}
