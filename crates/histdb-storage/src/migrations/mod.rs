//! Migration runner: version tracking, forward-only, transactional per migration.

mod v001_audit_log;
mod v002_table_catalog;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use histdb_core::errors::StorageError;
use histdb_core::HistResult;

use crate::to_storage_err;

/// Latest schema version.
pub const LATEST_VERSION: u32 = 2;

type MigrationFn = fn(&Connection) -> HistResult<()>;

const MIGRATIONS: [(u32, &str, MigrationFn); 2] = [
    (1, "audit_log", v001_audit_log::migrate),
    (2, "table_catalog", v002_table_catalog::migrate),
];

/// Current schema version; 0 if `schema_version` does not exist yet.
pub fn current_version(conn: &Connection) -> HistResult<u32> {
    let exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version'")
        .and_then(|mut stmt| stmt.exists([]))
        .map_err(to_storage_err)?;

    if !exists {
        return Ok(0);
    }

    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(to_storage_err)
}

/// Run all pending migrations, each in its own `BEGIN IMMEDIATE` transaction.
/// Returns the number applied.
pub fn run_migrations(conn: &Connection) -> HistResult<u32> {
    let current = current_version(conn)?;
    if current >= LATEST_VERSION {
        debug!("database schema is up to date (v{current})");
        return Ok(0);
    }

    info!("running migrations: v{current} → v{LATEST_VERSION}");
    let mut applied = 0;

    for &(version, name, migrate_fn) in &MIGRATIONS {
        if version <= current {
            continue;
        }

        debug!("applying migration v{version:03}: {name}");
        conn.execute_batch("BEGIN IMMEDIATE").map_err(to_storage_err)?;

        let result = migrate_fn(conn).and_then(|()| {
            conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
                .map(|_| ())
                .map_err(to_storage_err)
        });

        match result {
            Ok(()) => {
                conn.execute_batch("COMMIT").map_err(to_storage_err)?;
                info!("applied migration v{version:03}: {name}");
                applied += 1;
            }
            Err(e) => {
                warn!("migration v{version:03} failed: {e}, rolling back");
                let _ = conn.execute_batch("ROLLBACK");
                return Err(StorageError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                }
                .into());
            }
        }
    }

    info!("applied {applied} migration(s), now at v{LATEST_VERSION}");
    Ok(applied)
}
