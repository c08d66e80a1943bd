//! `StorageEngine`: owns the write connection and the read pool.
//!
//! All reads go through `with_reader()`, all writes through `with_writer()`
//! or `in_transaction()`. Nothing outside this crate holds a raw connection
//! beyond the closure it is handed.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, Transaction};
use tracing::{debug, info};

use histdb_core::config::StorageConfig;
use histdb_core::models::TableSchema;
use histdb_core::{HistError, HistResult};

use crate::connection::{ReadPool, WriteConnection};
use crate::queries::{audit_ops, catalog_ops, versioned_ops};
use crate::{migrations, to_storage_err};

pub struct StorageEngine {
    writer: WriteConnection,
    /// `None` for in-memory databases, whose readers go through the writer.
    readers: Option<ReadPool>,
    path: Option<PathBuf>,
}

impl StorageEngine {
    /// Open a file-backed engine with default pool settings.
    pub fn open(path: &Path) -> HistResult<Self> {
        Self::from_config(&StorageConfig {
            path: Some(path.to_path_buf()),
            ..StorageConfig::default()
        })
    }

    /// Open an in-memory engine (for testing).
    pub fn open_in_memory() -> HistResult<Self> {
        let writer = WriteConnection::open_in_memory()?;
        writer.with_conn(|conn| migrations::run_migrations(conn).map(|_| ()))?;
        Ok(Self {
            writer,
            readers: None,
            path: None,
        })
    }

    /// Open according to `config`; `path = None` means in-memory.
    pub fn from_config(config: &StorageConfig) -> HistResult<Self> {
        let Some(path) = &config.path else {
            return Self::open_in_memory();
        };
        let writer = WriteConnection::open(path, config.busy_timeout_ms)?;
        writer.with_conn(|conn| migrations::run_migrations(conn).map(|_| ()))?;
        let readers = ReadPool::open(path, config.read_pool_size, config.busy_timeout_ms)?;
        info!(path = %path.display(), readers = readers.size(), "storage engine opened");
        Ok(Self {
            writer,
            readers: Some(readers),
            path: Some(path.clone()),
        })
    }

    /// Database file path (None for in-memory).
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn with_reader<F, T>(&self, f: F) -> HistResult<T>
    where
        F: FnOnce(&Connection) -> HistResult<T>,
    {
        match &self.readers {
            Some(pool) => pool.with_conn(f),
            None => self.writer.with_conn(f),
        }
    }

    pub fn with_writer<F, T>(&self, f: F) -> HistResult<T>
    where
        F: FnOnce(&Connection) -> HistResult<T>,
    {
        self.writer.with_conn(f)
    }

    /// Run `f` in one write transaction. Any error rolls back everything `f` wrote.
    pub fn in_transaction<F, T>(&self, f: F) -> HistResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> HistResult<T>,
    {
        self.writer.with_conn(|conn| {
            let mut tx = conn.unchecked_transaction().map_err(to_storage_err)?;
            let out = f(&mut tx)?;
            tx.commit().map_err(to_storage_err)?;
            Ok(out)
        })
    }

    /// Create the table pair for `schema` if needed and record it in the catalog.
    ///
    /// Returns `true` if the tables were created. A schema that differs from the
    /// catalogued one is a `ConfigError`.
    pub fn ensure_table(&self, schema: &TableSchema) -> HistResult<bool> {
        schema.validate()?;
        self.in_transaction(|tx| {
            if let Some(existing) = catalog_ops::get_schema(tx, &schema.name)? {
                if &existing != schema {
                    return Err(HistError::ConfigError(format!(
                        "schema for '{}' differs from the catalogued definition",
                        schema.name
                    )));
                }
                debug!(table = %schema.name, "table already exists");
                return Ok(false);
            }
            versioned_ops::create_tables(tx, schema)?;
            catalog_ops::upsert_schema(tx, schema)?;
            info!(table = %schema.name, keys = ?schema.key_columns, "created versioned table");
            Ok(true)
        })
    }

    /// Drop a table pair, its catalog entry, and its audit entries.
    pub fn drop_table(&self, name: &str) -> HistResult<()> {
        self.in_transaction(|tx| {
            let schema = catalog_ops::get_schema(tx, name)?.ok_or_else(|| {
                HistError::TableNotFound {
                    name: name.to_string(),
                }
            })?;
            versioned_ops::drop_tables(tx, &schema.name, &schema.history_table())?;
            catalog_ops::delete_schema(tx, name)?;
            let purged = audit_ops::purge_table(tx, name)?;
            info!(table = name, audit_entries = purged, "dropped versioned table");
            Ok(())
        })
    }

    /// Catalogued schema of `name`.
    pub fn table_schema(&self, name: &str) -> HistResult<TableSchema> {
        self.with_reader(|conn| catalog_ops::get_schema(conn, name))?
            .ok_or_else(|| HistError::TableNotFound {
                name: name.to_string(),
            })
    }

    pub fn list_tables(&self) -> HistResult<Vec<String>> {
        self.with_reader(catalog_ops::list_tables)
    }

    /// WAL checkpoint (TRUNCATE).
    pub fn checkpoint(&self) -> HistResult<()> {
        self.with_writer(|conn| {
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                .map_err(to_storage_err)
        })
    }
}
