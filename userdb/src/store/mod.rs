//! File-backed record storage
//!
//! A `RecordStore` is a durable, ordered sequence of one-per-line text
//! records in a single flat file. It offers exactly three primitives:
//! append a record under an exclusive advisory lock, scan all records
//! under a shared lock, and rewrite the file without the records matching
//! a predicate. The rewrite goes through a fixed sibling temp file and a
//! remove-then-rename, so a crash mid-rewrite leaves the original file
//! untouched.
//!
//! Line reading is bounds-checked and growable: a line longer than the
//! configured maximum is rejected as `RecordTooLong`, never truncated.

mod file_lock;

pub use file_lock::{FileLock, LockMode};

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::temp_sibling;
use crate::error::{UserDbError, UserDbResult};

/// Result of a filtered rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteOutcome {
    /// Number of records written back
    pub kept: usize,
    /// Number of records excluded
    pub removed: usize,
}

impl RewriteOutcome {
    /// Whether the rewrite actually removed anything
    pub fn removed_any(&self) -> bool {
        self.removed > 0
    }
}

/// A durable, file-backed ordered sequence of text records
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
    temp_path: PathBuf,
    max_line_length: usize,
    lock_timeout: Duration,
}

impl RecordStore {
    /// Create a store over the given file. The companion temp file used by
    /// rewrites lives at the fixed sibling path `<path>_tmp`.
    pub fn new<P: AsRef<Path>>(path: P, max_line_length: usize, lock_timeout: Duration) -> Self {
        let path = path.as_ref().to_path_buf();
        let temp_path = temp_sibling(&path);
        Self {
            path,
            temp_path,
            max_line_length,
            lock_timeout,
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recover from a rewrite that crashed mid-replacement. Two cases:
    ///
    /// - Temp file and original both present: the crash happened before the
    ///   original was removed, so the original is authoritative and the
    ///   temp copy is discarded.
    /// - Temp file present, original absent: the crash happened between
    ///   remove and rename, so the fully written temp file holds the only
    ///   copy of every surviving record. The rename is completed.
    pub fn recover(&self) -> UserDbResult<()> {
        if !self.temp_path.exists() {
            return Ok(());
        }

        if self.path.exists() {
            warn!(
                "Removing stale rewrite temp file: {:?}",
                self.temp_path
            );
            std::fs::remove_file(&self.temp_path)?;
        } else {
            warn!(
                "Completing interrupted rewrite: {:?} -> {:?}",
                self.temp_path, self.path
            );
            std::fs::rename(&self.temp_path, &self.path)?;
        }
        Ok(())
    }

    /// Append one record as a single line, under an exclusive lock scoped
    /// to this call. Creates the file if it does not exist yet.
    pub fn append(&self, line: &str) -> UserDbResult<()> {
        if line.contains('\n') || line.contains('\r') {
            return Err(UserDbError::invalid("record contains a line break"));
        }
        if line.len() > self.max_line_length {
            return Err(UserDbError::RecordTooLong {
                limit: self.max_line_length,
                actual: line.len(),
            });
        }

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| self.open_error(e, &self.path))?;

        let _lock = FileLock::acquire(&file, &self.path, LockMode::Exclusive, self.lock_timeout)
            .map_err(|e| self.open_error(e, &self.path))?;

        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        debug!("Appended record to {:?}", self.path);
        Ok(())
    }

    /// Open a scan over all records, in file order. The returned scanner
    /// holds a shared lock for its lifetime; a fresh call re-opens the
    /// file. An absent file and an unreadable file are the same condition
    /// for this store: both are `AccessDenied`.
    pub fn scan(&self) -> UserDbResult<RecordScanner> {
        let file = File::open(&self.path)
            .map_err(|e| self.open_error(e, &self.path))?;

        let lock = FileLock::acquire(&file, &self.path, LockMode::Shared, self.lock_timeout)
            .map_err(|e| self.open_error(e, &self.path))?;

        Ok(RecordScanner {
            reader: BufReader::new(file),
            max_line_length: self.max_line_length,
            done: false,
            _lock: lock,
        })
    }

    /// Rewrite the file, dropping every record for which `predicate`
    /// returns true. All surviving records are written to the fixed temp
    /// path; only if at least one record was excluded is the original file
    /// replaced via remove-then-rename. The rename is atomic, so a crash
    /// anywhere before it leaves the original untouched.
    pub fn rewrite_excluding<F>(&self, mut predicate: F) -> UserDbResult<RewriteOutcome>
    where
        F: FnMut(&str) -> bool,
    {
        let scanner = self.scan()?;

        let temp_file = File::create(&self.temp_path)
            .map_err(|e| self.open_error(e, &self.temp_path))?;
        let mut writer = BufWriter::new(temp_file);

        let mut outcome = RewriteOutcome { kept: 0, removed: 0 };
        for line in scanner {
            let line = line?;
            if predicate(&line) {
                outcome.removed += 1;
            } else {
                writer.write_all(line.as_bytes())?;
                writer.write_all(b"\n")?;
                outcome.kept += 1;
            }
        }

        writer.flush()?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        if outcome.removed_any() {
            std::fs::remove_file(&self.path)?;
            std::fs::rename(&self.temp_path, &self.path)?;
            debug!(
                "Rewrote {:?}: kept {}, removed {}",
                self.path, outcome.kept, outcome.removed
            );
        } else {
            // Nothing excluded; the original stays and the temp copy goes.
            std::fs::remove_file(&self.temp_path)?;
        }

        Ok(outcome)
    }

    /// Map an open/lock failure to the store's error taxonomy
    fn open_error(&self, e: std::io::Error, path: &Path) -> UserDbError {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied | ErrorKind::WouldBlock => {
                UserDbError::AccessDenied {
                    path: path.to_path_buf(),
                }
            }
            _ => UserDbError::Io(e),
        }
    }
}

/// An in-progress scan of a record store. Yields raw lines in file order
/// and holds a shared advisory lock until dropped. Each caller owns its
/// own scanner; there is no shared iteration state.
#[derive(Debug)]
pub struct RecordScanner {
    reader: BufReader<File>,
    max_line_length: usize,
    done: bool,
    _lock: FileLock,
}

impl Iterator for RecordScanner {
    type Item = UserDbResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        // Accumulate chunk by chunk so an oversized line is rejected as
        // soon as it crosses the bound, not after being fully buffered.
        let mut buf = Vec::new();
        loop {
            let (consumed, line_complete) = {
                let chunk = match self.reader.fill_buf() {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        self.done = true;
                        return Some(Err(UserDbError::Io(e)));
                    }
                };
                if chunk.is_empty() {
                    if buf.is_empty() {
                        self.done = true;
                        return None;
                    }
                    // Final line without a trailing newline
                    (0, true)
                } else if let Some(pos) = chunk.iter().position(|&b| b == b'\n') {
                    buf.extend_from_slice(&chunk[..pos]);
                    (pos + 1, true)
                } else {
                    buf.extend_from_slice(chunk);
                    (chunk.len(), false)
                }
            };
            self.reader.consume(consumed);

            if buf.len() > self.max_line_length {
                self.done = true;
                return Some(Err(UserDbError::RecordTooLong {
                    limit: self.max_line_length,
                    actual: buf.len(),
                }));
            }
            if line_complete {
                break;
            }
        }

        match String::from_utf8(buf) {
            Ok(line) => Some(Ok(line)),
            Err(_) => {
                self.done = true;
                Some(Err(UserDbError::invalid(
                    "database line is not valid UTF-8",
                )))
            }
        }
    }
}
