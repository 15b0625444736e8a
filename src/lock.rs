use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LOCK_FILE_NAME: &str = "autopublish.lock";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Another autopublish run holds {}", path.display())]
    AlreadyRunning { path: PathBuf },
    #[error("Failed to lock {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Advisory lock that keeps two publish runs from sharing one index
///
/// The lock file lives inside the git directory so it never appears as a
/// working tree change.
pub struct RunLock {
    lock: RwLock<File>,
    path: PathBuf,
}

impl RunLock {
    pub fn open(git_dir: &Path) -> Result<Self, LockError> {
        let path = git_dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| LockError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            lock: RwLock::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the lock without blocking; the lock is released when the guard drops
    pub fn try_acquire(&mut self) -> Result<RwLockWriteGuard<'_, File>, LockError> {
        let path = self.path.clone();
        self.lock.try_write().map_err(|source| match source.kind() {
            io::ErrorKind::WouldBlock => LockError::AlreadyRunning { path },
            _ => LockError::Io { path, source },
        })
    }
}
