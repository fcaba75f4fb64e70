//! `DuckDB` connection pooling.
//!
//! The warehouse hands out short-lived connections keyed by access mode.
//! Write paths (upserts, migrations) and read paths (report queries, the
//! update loop's watermark lookups) pool separately so a long write never
//! starves reads of a warm connection.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::duckdb::Connection;

/// Access mode for database connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Default)]
struct IdleConnections {
    read_only: Vec<Connection>,
    read_write: Vec<Connection>,
}

impl IdleConnections {
    fn slot(&mut self, mode: AccessMode) -> &mut Vec<Connection> {
        match mode {
            AccessMode::ReadOnly => &mut self.read_only,
            AccessMode::ReadWrite => &mut self.read_write,
        }
    }
}

struct PoolInner {
    db_path: PathBuf,
    max_pool_size: usize,
    idle: Mutex<IdleConnections>,
}

/// Connection pool keyed by access mode. Connections return to the pool on
/// drop, up to `max_pool_size` per mode.
#[derive(Clone)]
pub struct DuckDbConnectionManager {
    inner: Arc<PoolInner>,
}

impl DuckDbConnectionManager {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_pool_size: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                db_path: path.into(),
                max_pool_size: max_pool_size.max(1),
                idle: Mutex::new(IdleConnections::default()),
            }),
        }
    }

    /// Acquire a connection, reusing an idle one when available.
    ///
    /// # Panics
    /// Panics if the pool mutex is poisoned.
    pub fn acquire(&self, mode: AccessMode) -> Result<PooledConnection, ::duckdb::Error> {
        let reused = self
            .inner
            .idle
            .lock()
            .expect("duckdb connection pool mutex poisoned")
            .slot(mode)
            .pop();

        let connection = match reused {
            Some(connection) => connection,
            None => open_session(self.inner.db_path.as_path(), mode)?,
        };

        Ok(PooledConnection {
            mode,
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.inner.db_path.as_path()
    }
}

/// A pooled connection that returns to the pool when dropped.
pub struct PooledConnection {
    mode: AccessMode,
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection unexpectedly missing")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection unexpectedly missing")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut idle = self
            .pool
            .idle
            .lock()
            .expect("duckdb connection pool mutex poisoned");
        let slot = idle.slot(self.mode);
        if slot.len() < self.pool.max_pool_size {
            slot.push(connection);
        }
    }
}

/// All sessions open the file read-write; the embedded engine rejects mixing
/// file-level access modes within one process. The mode therefore only picks
/// the idle slot a connection parks in, keeping query-path connections warm
/// independently of the upsert paths.
fn open_session(path: &Path, _mode: AccessMode) -> Result<Connection, ::duckdb::Error> {
    let connection = Connection::open(path)?;
    connection.execute_batch("PRAGMA disable_progress_bar;")?;
    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn connections_are_reused_per_mode() {
        let temp = tempdir().expect("tempdir");
        let manager = DuckDbConnectionManager::new(temp.path().join("pool.duckdb"), 2);

        {
            let writer = manager.acquire(AccessMode::ReadWrite).expect("writer");
            writer
                .execute_batch("CREATE TABLE IF NOT EXISTS marker (n INTEGER);")
                .expect("create table");
        }

        // The returned connection already has the table in its catalog.
        let writer = manager.acquire(AccessMode::ReadWrite).expect("writer again");
        writer
            .execute_batch("INSERT INTO marker VALUES (1);")
            .expect("insert through reused connection");
    }

    #[test]
    fn pool_size_is_clamped_to_at_least_one() {
        let temp = tempdir().expect("tempdir");
        let manager = DuckDbConnectionManager::new(temp.path().join("pool.duckdb"), 0);
        drop(manager.acquire(AccessMode::ReadWrite).expect("connection"));
        let again = manager.acquire(AccessMode::ReadWrite).expect("connection");
        drop(again);
    }
}
