//! Working-directory lifecycle.
//!
//! Each sync run owns one working directory. With caching enabled the path
//! is stable across runs (`.remora` under the process working directory),
//! trading disk usage for incremental speed; otherwise each run gets a
//! fresh UUID-suffixed directory that is removed when the run finishes.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Directory name used under the process working directory.
const WORKDIR_NAME: &str = ".remora";

/// A working directory owned by exactly one sync invocation.
#[derive(Debug)]
pub struct Workdir {
    path: PathBuf,
    cached: bool,
}

impl Workdir {
    /// Allocate a working directory under the process working directory.
    pub fn create(use_cache: bool) -> io::Result<Self> {
        Self::create_in(&std::env::current_dir()?, use_cache)
    }

    /// Allocate a working directory under an explicit root: `<root>/.remora`
    /// when cached, `<root>/.remora/<uuid>` otherwise.
    pub fn create_in(root: &Path, use_cache: bool) -> io::Result<Self> {
        let base = root.join(WORKDIR_NAME);
        let path = if use_cache {
            base
        } else {
            base.join(Uuid::new_v4().to_string())
        };
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            path,
            cached: use_cache,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory unless it is the long-lived cache.
    ///
    /// Dropping a `Workdir` removes the directory too (with the error
    /// swallowed), so a run that bails out early cannot leak disk; the
    /// explicit call is for the success path, where the error matters.
    pub fn cleanup(mut self) -> io::Result<()> {
        self.remove()
    }

    fn remove(&mut self) -> io::Result<()> {
        if !self.cached && self.path.exists() {
            std::fs::remove_dir_all(&self.path)?;
        }
        Ok(())
    }
}

impl Drop for Workdir {
    fn drop(&mut self) {
        let _ = self.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncached_workdir_is_unique_and_removed() {
        let root = tempfile::tempdir().unwrap();
        let a = Workdir::create_in(root.path(), false).unwrap();
        let b = Workdir::create_in(root.path(), false).unwrap();
        assert_ne!(a.path(), b.path());

        let a_path = a.path().to_path_buf();
        std::fs::write(a_path.join("file"), b"x").unwrap();
        a.cleanup().unwrap();
        assert!(!a_path.exists());
        b.cleanup().unwrap();
    }

    #[test]
    fn dropped_uncached_workdir_is_removed() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let w = Workdir::create_in(root.path(), false).unwrap();
            std::fs::write(w.path().join("partial"), b"x").unwrap();
            w.path().to_path_buf()
            // Dropped here without cleanup(), as on an error path.
        };
        assert!(!path.exists());
    }

    #[test]
    fn dropped_cached_workdir_survives() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let w = Workdir::create_in(root.path(), true).unwrap();
            w.path().to_path_buf()
        };
        assert!(path.exists());
    }

    #[test]
    fn cached_workdir_is_stable_and_survives_cleanup() {
        let root = tempfile::tempdir().unwrap();
        let a = Workdir::create_in(root.path(), true).unwrap();
        let path = a.path().to_path_buf();
        assert_eq!(path, root.path().join(WORKDIR_NAME));
        a.cleanup().unwrap();
        assert!(path.exists());

        let b = Workdir::create_in(root.path(), true).unwrap();
        assert_eq!(b.path(), path);
    }
}
