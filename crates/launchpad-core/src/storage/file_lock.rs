//! Advisory file locks shared between processes

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use tracing::debug;

/// Exclusive lock on a file; released when dropped
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until the lock at `path` is ours
    pub fn acquire(path: &Path) -> io::Result<Self> {
        let file = open(path)?;
        file.lock_exclusive()?;
        debug!(path = %path.display(), "file lock taken");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Take the lock at `path` if nobody else holds it
    pub fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        let file = open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.raw_os_error() == fs4::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // closing the handle releases the lock as well
        let _ = FileExt::unlock(&self.file);
    }
}

fn open(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
}
