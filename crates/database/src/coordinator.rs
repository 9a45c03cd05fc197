//! Write coordination: the only place a store changes connection mode.
//!
//! A coordinator owns the process's long-lived read-only handle. A write scope closes it,
//! opens the exclusive read-write handle, runs the body, closes the read-write handle and
//! reopens the read-only one, on every exit path, before the body's result is returned.

use crate::config::{StoreConfig, StoreRole};
use crate::error::{Result, StoreError};
use crate::handle::StoreHandle;
use crate::schema::ensure_schema;
use crate::stats::StoreStats;
use duckdb::Connection;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, info, warn};

/// Proof that a read-write handle is open. Only [`WriteCoordinator::with_write`] makes one.
pub struct WriteScope<'a> {
    conn: &'a Connection,
}

impl<'a> WriteScope<'a> {
    pub fn conn(&self) -> &'a Connection {
        self.conn
    }

    /// Run `f` in one transaction: committed when it returns `Ok`, rolled back otherwise.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&WriteScope<'a>) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }
}

/// Decrements the active scope count even if the body unwinds.
struct ActiveScope<'a>(&'a AtomicUsize);

impl<'a> ActiveScope<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        let prev = counter.fetch_add(1, Ordering::SeqCst);
        debug_assert_eq!(prev, 0, "overlapping write scopes");
        Self(counter)
    }
}

impl Drop for ActiveScope<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct WriteCoordinator {
    path: PathBuf,
    role: StoreRole,
    reader: Mutex<StoreHandle>,
    active_scopes: AtomicUsize,
    stats: StoreStats,
}

impl WriteCoordinator {
    /// Open the store for `config.role`.
    ///
    /// A writer first opens read-write to create the schema, then drops to read-only.
    /// A reader only ever opens read-only and needs the schema to already exist.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let path = config.path.clone();
        if config.role == StoreRole::Writer {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::unavailable(&path, e))?;
            }
            let rw = StoreHandle::open_readwrite(&path)?;
            ensure_schema(&rw)?;
            drop(rw);
        }
        let reader = StoreHandle::open_readonly(&path)?;
        info!(path = %path.display(), role = ?config.role, "store opened");
        Ok(Self {
            path,
            role: config.role,
            reader: Mutex::new(reader),
            active_scopes: AtomicUsize::new(0),
            stats: StoreStats::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn role(&self) -> StoreRole {
        self.role
    }

    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Number of write scopes currently in their read-write phase. Never above one.
    pub fn active_write_scopes(&self) -> usize {
        self.active_scopes.load(Ordering::SeqCst)
    }

    /// Run `f` against the read-only handle.
    ///
    /// If a previous write scope unwound before restoring the handle, it is reopened here.
    pub fn with_read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut reader = self.reader.lock();
        if !reader.is_open() {
            warn!(path = %self.path.display(), "read-only handle was closed; reopening");
            *reader = StoreHandle::open_readonly(&self.path)?;
        }
        f(reader.conn()?)
    }

    /// Run `body` with the exclusive read-write handle.
    ///
    /// The read-only handle is closed before the read-write handle opens and is reopened
    /// after it closes, whatever `body` returns. A body error is returned only after that
    /// restoration; a failed restoration is returned as `StoreUnavailable` instead.
    pub fn with_write<T>(&self, body: impl FnOnce(&WriteScope<'_>) -> Result<T>) -> Result<T> {
        if self.role == StoreRole::ReaderOnly {
            return Err(StoreError::WriteNotPermitted);
        }

        let mut reader = self.reader.lock();
        reader.close();

        let outcome = match StoreHandle::open_readwrite(&self.path) {
            Ok(mut rw) => {
                self.stats.record_write_scope();
                let out = {
                    let _active = ActiveScope::enter(&self.active_scopes);
                    match rw.conn() {
                        Ok(conn) => body(&WriteScope { conn }),
                        Err(e) => Err(e),
                    }
                };
                rw.close();
                out
            }
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "could not enter write scope");
                Err(e)
            }
        };

        match StoreHandle::open_readonly(&self.path) {
            Ok(ro) => *reader = ro,
            Err(restore) => {
                if let Err(body_err) = &outcome {
                    error!(error = %body_err, "write scope failed before restoration");
                }
                error!(path = %self.path.display(), error = %restore, "could not restore read-only handle");
                return Err(StoreError::unavailable(
                    &self.path,
                    format!("read-only handle not restored after write: {restore}"),
                ));
            }
        }
        outcome
    }
}

impl std::fmt::Debug for WriteCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteCoordinator")
            .field("path", &self.path)
            .field("role", &self.role)
            .field("active_scopes", &self.active_write_scopes())
            .finish()
    }
}
