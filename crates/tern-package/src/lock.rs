//! Exclusive project lock held while the manifest and lockfile are written

use crate::Result;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Directory for tern's own state inside a project
pub const STATE_DIR: &str = ".tern";

const LOCK_FILE: &str = "project.lock";

/// Advisory lock on a project; released on drop
#[derive(Debug)]
pub struct ProjectLock {
    file: File,
    path: PathBuf,
}

impl ProjectLock {
    /// Block until the project at `root` can be mutated exclusively
    pub fn acquire(root: &Path) -> Result<Self> {
        let dir = root.join(STATE_DIR);
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;

        tracing::debug!(path = %path.display(), "waiting for project lock");
        file.lock_exclusive()?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release project lock");
        }
    }
}
