use crate::traits::FileSystem;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Temporary working directory removed when dropped, on success and error paths alike
pub struct ScratchDir {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl ScratchDir {
    pub fn create(fs: Arc<dyn FileSystem>, parent: &Path, prefix: &str) -> Result<Self> {
        let path = fs.create_scratch_dir(parent, &format!("{}-", prefix))?;
        tracing::debug!(path = %path.display(), "scratch directory created");
        Ok(Self { fs, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match self.fs.remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "scratch directory removed"),
            Err(err) => tracing::warn!(path = %self.path.display(), %err, "failed to remove scratch directory"),
        }
    }
}
