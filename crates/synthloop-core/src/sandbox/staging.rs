//! Scoped per-call staging area.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A private working directory, removed when dropped.
///
/// Each sandbox call owns exactly one; nothing in it is visible to any other
/// call, and cleanup runs on every exit path including cancellation (the
/// owning future being dropped).
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Create a fresh, uniquely named directory under `root`
    /// (the system temp dir when `None`).
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("synthloop-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `name` inside the area.
    pub fn write(&self, name: &str, contents: &str) -> io::Result<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Remove the directory now, reporting any failure.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}
