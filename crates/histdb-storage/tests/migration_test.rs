//! Migrations: fresh database reaches the latest version, reruns are no-ops.

use histdb_storage::connection::pragmas::apply_pragmas;
use histdb_storage::migrations;
use histdb_storage::StorageEngine;
use rusqlite::Connection;
use tempfile::TempDir;

fn get_table_columns(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info(\"{table}\")"))
        .unwrap();
    stmt.query_map([], |row| row.get::<_, String>(1))
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
}

#[test]
fn fresh_database_reaches_latest_version() {
    let conn = Connection::open_in_memory().unwrap();
    apply_pragmas(&conn, 1000).unwrap();
    assert_eq!(migrations::current_version(&conn).unwrap(), 0);

    let applied = migrations::run_migrations(&conn).unwrap();
    assert_eq!(applied, migrations::LATEST_VERSION);
    assert_eq!(
        migrations::current_version(&conn).unwrap(),
        migrations::LATEST_VERSION
    );

    let columns = get_table_columns(&conn, "__audit_log");
    for c in ["audit_id", "table_name", "source_kind", "locator", "source_time", "recorded_at"] {
        assert!(columns.contains(&c.to_string()), "missing audit column {c}");
    }
    let columns = get_table_columns(&conn, "__table_catalog");
    assert!(columns.contains(&"schema_json".to_string()));
}

#[test]
fn rerunning_migrations_is_a_noop() {
    let conn = Connection::open_in_memory().unwrap();
    migrations::run_migrations(&conn).unwrap();
    assert_eq!(migrations::run_migrations(&conn).unwrap(), 0);
}

#[test]
fn reopening_a_file_keeps_its_version() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hist.db");
    {
        let _engine = StorageEngine::open(&path).unwrap();
    }
    let engine = StorageEngine::open(&path).unwrap();
    let version = engine
        .with_reader(|conn| migrations::current_version(conn))
        .unwrap();
    assert_eq!(version, migrations::LATEST_VERSION);
}

#[test]
fn audit_locator_length_is_bounded_in_sql() {
    let conn = Connection::open_in_memory().unwrap();
    migrations::run_migrations(&conn).unwrap();
    let long = "x".repeat(1024);
    let result = conn.execute(
        "INSERT INTO __audit_log (table_name, source_kind, locator, source_time, recorded_at)
         VALUES ('t', 'file', ?1, '2024-01-01T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z')",
        [long],
    );
    assert!(result.is_err());
}
