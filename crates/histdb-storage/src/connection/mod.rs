//! Connection management: one serialized writer, a round-robin read pool.

pub mod pragmas;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags};

use histdb_core::errors::StorageError;
use histdb_core::HistResult;

use crate::to_storage_err;

/// The single write connection. All writes are serialized through its mutex.
pub struct WriteConnection {
    conn: Mutex<Connection>,
}

impl WriteConnection {
    pub fn open(path: &Path, busy_timeout_ms: u64) -> HistResult<Self> {
        let conn = Connection::open(path).map_err(to_storage_err)?;
        pragmas::apply_pragmas(&conn, busy_timeout_ms)?;
        Ok(Self::new(conn))
    }

    pub fn open_in_memory() -> HistResult<Self> {
        let conn = Connection::open_in_memory().map_err(to_storage_err)?;
        pragmas::apply_pragmas(&conn, 0)?;
        Ok(Self::new(conn))
    }

    fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn with_conn<F, T>(&self, f: F) -> HistResult<T>
    where
        F: FnOnce(&Connection) -> HistResult<T>,
    {
        let guard = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        f(&guard)
    }
}

/// Read-only connections handed out round-robin.
pub struct ReadPool {
    conns: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl ReadPool {
    /// Open `size` read-only connections. The database must already exist.
    pub fn open(path: &Path, size: usize, busy_timeout_ms: u64) -> HistResult<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        let conns = (0..size.max(1))
            .map(|_| {
                let conn = Connection::open_with_flags(path, flags).map_err(to_storage_err)?;
                pragmas::apply_read_pragmas(&conn, busy_timeout_ms)?;
                Ok(Mutex::new(conn))
            })
            .collect::<HistResult<Vec<_>>>()?;
        Ok(Self {
            conns,
            next: AtomicUsize::new(0),
        })
    }

    pub fn size(&self) -> usize {
        self.conns.len()
    }

    pub fn with_conn<F, T>(&self, f: F) -> HistResult<T>
    where
        F: FnOnce(&Connection) -> HistResult<T>,
    {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        let guard = self.conns[idx]
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?;
        f(&guard)
    }
}
