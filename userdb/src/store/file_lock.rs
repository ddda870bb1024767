//! Advisory file locking for database access
//!
//! Wraps `flock(2)` so that every record-store operation holds the right
//! advisory lock for exactly the lifetime of one file open/close cycle:
//! exclusive for appends and rewrites, shared for scans. The lock releases
//! automatically when dropped.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Lock flavor to acquire on a database file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared lock, held while scanning
    Shared,
    /// Exclusive lock, held while appending or rewriting
    Exclusive,
}

/// An advisory lock on an open file, released on drop
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    locked: bool,
    // Keeps the locked descriptor alive; flock releases on close.
    file: File,
}

impl FileLock {
    /// Acquire a lock on an already-open file, retrying until the timeout
    /// elapses. The file handle is borrowed for locking only; callers keep
    /// using their own handle for I/O.
    pub fn acquire<P: AsRef<Path>>(
        file: &File,
        path: P,
        mode: LockMode,
        timeout: Duration,
    ) -> Result<Self, std::io::Error> {
        let path = path.as_ref();
        debug!("Acquiring {:?} lock: {:?}", mode, path);

        let start = std::time::Instant::now();
        loop {
            match try_lock(file, mode) {
                Ok(()) => {
                    debug!("Acquired {:?} lock: {:?}", mode, path);
                    return Ok(Self {
                        path: path.to_path_buf(),
                        locked: true,
                        file: file.try_clone()?,
                    });
                }
                Err(_) if start.elapsed() < timeout => {
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Release the lock explicitly (usually not needed due to Drop)
    pub fn unlock(&mut self) -> Result<(), std::io::Error> {
        if !self.locked {
            return Ok(());
        }

        use std::os::unix::io::AsRawFd;
        let result = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
        if result == 0 {
            self.locked = false;
            debug!("Released lock: {:?}", self.path);
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.unlock() {
            warn!("Failed to unlock {:?} on drop: {}", self.path, e);
        }
    }
}

/// Attempt a non-blocking flock in the requested mode
fn try_lock(file: &File, mode: LockMode) -> Result<(), std::io::Error> {
    use std::os::unix::io::AsRawFd;

    let op = match mode {
        LockMode::Shared => libc::LOCK_SH,
        LockMode::Exclusive => libc::LOCK_EX,
    };

    let result = unsafe { libc::flock(file.as_raw_fd(), op | libc::LOCK_NB) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_exclusive_lock_basic() {
        let temp = NamedTempFile::new().unwrap();
        let file = File::open(temp.path()).unwrap();
        let lock = FileLock::acquire(&file, temp.path(), LockMode::Exclusive, Duration::from_secs(1));
        assert!(lock.is_ok());
    }

    #[test]
    fn test_shared_locks_coexist() {
        let temp = NamedTempFile::new().unwrap();
        let file_a = File::open(temp.path()).unwrap();
        let file_b = File::open(temp.path()).unwrap();

        let _lock_a =
            FileLock::acquire(&file_a, temp.path(), LockMode::Shared, Duration::from_secs(1))
                .unwrap();
        let lock_b =
            FileLock::acquire(&file_b, temp.path(), LockMode::Shared, Duration::from_millis(200));
        assert!(lock_b.is_ok());
    }

    #[test]
    fn test_exclusive_blocks_shared() {
        let temp = NamedTempFile::new().unwrap();
        let file_a = File::open(temp.path()).unwrap();
        let file_b = File::open(temp.path()).unwrap();

        let _exclusive =
            FileLock::acquire(&file_a, temp.path(), LockMode::Exclusive, Duration::from_secs(1))
                .unwrap();
        let shared =
            FileLock::acquire(&file_b, temp.path(), LockMode::Shared, Duration::from_millis(300));
        assert!(shared.is_err());
    }

    #[test]
    fn test_auto_unlock_on_drop() {
        let temp = NamedTempFile::new().unwrap();
        let file_a = File::open(temp.path()).unwrap();

        {
            let _lock = FileLock::acquire(
                &file_a,
                temp.path(),
                LockMode::Exclusive,
                Duration::from_secs(1),
            )
            .unwrap();
        } // Released here

        let file_b = File::open(temp.path()).unwrap();
        let relock = FileLock::acquire(
            &file_b,
            temp.path(),
            LockMode::Exclusive,
            Duration::from_millis(300),
        );
        assert!(relock.is_ok());
    }
}
