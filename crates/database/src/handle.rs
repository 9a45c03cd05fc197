//! Store handles: one DuckDB connection opened in an explicit access mode.
//!
//! DuckDB arbitrates between processes with its own file lock. Inside a process, the
//! holder table below enforces the same contract before the engine is asked: at most one
//! read-write handle per database file, and no read-only handle alongside it.

use crate::error::{Result, StoreError, is_lock_conflict_message};
use duckdb::{AccessMode, Config, Connection};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Default)]
struct Holders {
    readers: usize,
    writer: bool,
}

static HOLDERS: LazyLock<Mutex<HashMap<PathBuf, Holders>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Normalize a database path so that `./a.duckdb` and `/abs/a.duckdb` share one entry.
/// The file itself may not exist yet, so only the parent directory is canonicalized.
fn holder_key(path: &Path) -> PathBuf {
    let file = path.file_name().map(PathBuf::from).unwrap_or_default();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    match parent.canonicalize() {
        Ok(dir) => dir.join(file),
        Err(_) => path.to_path_buf(),
    }
}

fn claim(key: &Path, mode: HandleMode) -> Result<()> {
    let mut holders = HOLDERS.lock();
    let entry = holders.entry(key.to_path_buf()).or_default();
    match mode {
        HandleMode::ReadOnly if entry.writer => Err(StoreError::unavailable(
            key,
            "a read-write handle is open in this process",
        )),
        HandleMode::ReadOnly => {
            entry.readers += 1;
            Ok(())
        }
        HandleMode::ReadWrite if entry.writer || entry.readers > 0 => Err(StoreError::StoreBusy {
            path: key.to_path_buf(),
        }),
        HandleMode::ReadWrite => {
            entry.writer = true;
            Ok(())
        }
    }
}

fn release(key: &Path, mode: HandleMode) {
    let mut holders = HOLDERS.lock();
    if let Some(entry) = holders.get_mut(key) {
        match mode {
            HandleMode::ReadOnly => entry.readers = entry.readers.saturating_sub(1),
            HandleMode::ReadWrite => entry.writer = false,
        }
        if entry.readers == 0 && !entry.writer {
            holders.remove(key);
        }
    }
}

/// An open (or closed) connection to the on-disk store in one access mode.
pub struct StoreHandle {
    path: PathBuf,
    key: PathBuf,
    mode: HandleMode,
    conn: Option<Connection>,
}

impl StoreHandle {
    /// Open a connection restricted to reads.
    ///
    /// Fails with `StoreUnavailable` when the file is missing (the schema was never
    /// initialized) or is locked by a writer.
    pub fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StoreError::unavailable(
                path,
                "database file does not exist; initialize it with a writer first",
            ));
        }
        let key = holder_key(path);
        claim(&key, HandleMode::ReadOnly)?;

        let opened = Config::default()
            .access_mode(AccessMode::ReadOnly)
            .and_then(|config| Connection::open_with_flags(path, config));
        match opened {
            Ok(conn) => {
                debug!(path = %path.display(), "opened read-only handle");
                Ok(Self {
                    path: path.to_path_buf(),
                    key,
                    mode: HandleMode::ReadOnly,
                    conn: Some(conn),
                })
            }
            Err(e) => {
                release(&key, HandleMode::ReadOnly);
                Err(StoreError::unavailable(path, e))
            }
        }
    }

    /// Open the exclusive read-write connection, creating the file if needed.
    ///
    /// Fails with `StoreBusy` when another read-write handle holds the store, in this
    /// process or in another one.
    pub fn open_readwrite(path: &Path) -> Result<Self> {
        let key = holder_key(path);
        claim(&key, HandleMode::ReadWrite)?;

        let opened = Config::default()
            .access_mode(AccessMode::ReadWrite)
            .and_then(|config| Connection::open_with_flags(path, config));
        match opened {
            Ok(conn) => {
                debug!(path = %path.display(), "opened read-write handle");
                Ok(Self {
                    path: path.to_path_buf(),
                    key,
                    mode: HandleMode::ReadWrite,
                    conn: Some(conn),
                })
            }
            Err(e) => {
                release(&key, HandleMode::ReadWrite);
                if is_lock_conflict_message(&e.to_string()) {
                    Err(StoreError::StoreBusy {
                        path: path.to_path_buf(),
                    })
                } else {
                    Err(StoreError::unavailable(path, e))
                }
            }
        }
    }

    /// Release the connection. Calling it again is a no-op.
    pub fn close(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if let Err((_conn, e)) = conn.close() {
            // the connection is dropped here regardless, which releases the file
            warn!(path = %self.path.display(), error = %e, "duckdb close reported an error");
        }
        release(&self.key, self.mode);
        debug!(path = %self.path.display(), mode = ?self.mode, "closed handle");
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    pub fn mode(&self) -> HandleMode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The live connection, or `StoreUnavailable` once the handle has been closed.
    pub fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| StoreError::unavailable(&self.path, "handle is closed"))
    }
}

impl Drop for StoreHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readonly_open_of_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = StoreHandle::open_readonly(&dir.path().join("nope.duckdb")).unwrap_err();
        assert!(matches!(err, StoreError::StoreUnavailable { .. }));
    }

    #[test]
    fn second_writer_in_process_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("busy.duckdb");
        let mut first = StoreHandle::open_readwrite(&path).unwrap();
        assert_eq!(first.mode(), HandleMode::ReadWrite);

        let err = StoreHandle::open_readwrite(&path).unwrap_err();
        assert!(matches!(err, StoreError::StoreBusy { .. }));
        assert!(err.is_retryable());

        // readers are refused while the writer is open
        let err = StoreHandle::open_readonly(&path).unwrap_err();
        assert!(matches!(err, StoreError::StoreUnavailable { .. }));

        first.close();
        let again = StoreHandle::open_readwrite(&path).unwrap();
        assert!(again.is_open());
    }

    #[test]
    fn close_is_idempotent_and_releases_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("close.duckdb");
        let mut rw = StoreHandle::open_readwrite(&path).unwrap();
        rw.close();
        rw.close();
        assert!(!rw.is_open());
        assert!(matches!(rw.conn(), Err(StoreError::StoreUnavailable { .. })));

        let ro1 = StoreHandle::open_readonly(&path).unwrap();
        let ro2 = StoreHandle::open_readonly(&path).unwrap();
        assert_eq!(ro1.mode(), HandleMode::ReadOnly);
        assert!(ro2.is_open());

        // a writer cannot join while readers are open in this process
        assert!(matches!(
            StoreHandle::open_readwrite(&path),
            Err(StoreError::StoreBusy { .. })
        ));
    }

    #[test]
    fn holder_key_is_stable_across_relative_and_absolute_forms() {
        let dir = tempfile::tempdir().unwrap();
        let abs = dir.path().join("k.duckdb");
        let dotted = dir.path().join(".").join("k.duckdb");
        assert_eq!(holder_key(&abs), holder_key(&dotted));
    }
}
