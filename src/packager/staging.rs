// src/packager/staging.rs

//! Scoped temporary build trees
//!
//! A [`StagingDir`] is removed when dropped, on success and on error alike,
//! unless it was created with `keep` set.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

#[derive(Debug)]
pub struct StagingDir {
    dir: TempDir,
    keep: bool,
}

impl StagingDir {
    /// Create a staging directory in the system temp dir
    pub fn new(prefix: &str, keep: bool) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).keep(keep).tempdir()?;
        debug!("Created temporary dir {}", dir.path().display());
        Ok(Self { dir, keep })
    }

    /// Create a staging directory under `parent`
    pub fn new_in(parent: &Path, prefix: &str, keep: bool) -> Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .keep(keep)
            .tempdir_in(parent)?;
        debug!("Created temporary dir {}", dir.path().display());
        Ok(Self { dir, keep })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(path)
    }

    /// Create (if needed) and return a subdirectory
    pub fn subdir(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = self.join(path);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.keep {
            info!("Temporary build directory is at {}", self.dir.path().display());
        } else {
            info!("Removing temporary dir {}", self.dir.path().display());
        }
    }
}
