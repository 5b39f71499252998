//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Migration to version 1: Initial schema
fn migrate_v1(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS records (
            id TEXT PRIMARY KEY NOT NULL CHECK (id <> ''),
            owner_id TEXT NOT NULL DEFAULT '',
            fields TEXT NOT NULL DEFAULT '{}',
            sync_status INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_records_owner ON records(owner_id);
        INSERT INTO schema_version (version) VALUES (1);",
    )?;

    tx.commit()?;
    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: sync status lookup and range guard
fn migrate_v2(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_records_sync_status ON records(sync_status);
        CREATE TRIGGER IF NOT EXISTS records_status_insert_guard BEFORE INSERT ON records
        FOR EACH ROW
        WHEN NEW.sync_status NOT BETWEEN 0 AND 3
        BEGIN
            SELECT RAISE(ABORT, 'invalid sync_status');
        END;
        CREATE TRIGGER IF NOT EXISTS records_status_update_guard BEFORE UPDATE ON records
        FOR EACH ROW
        WHEN NEW.sync_status NOT BETWEEN 0 AND 3
        BEGIN
            SELECT RAISE(ABORT, 'invalid sync_status');
        END;
        INSERT INTO schema_version (version) VALUES (2);",
    )?;

    tx.commit()?;
    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_migrations() {
        let conn = setup();
        run(&conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = setup();
        run(&conn).unwrap();
        run(&conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_records_reject_empty_id() {
        let conn = setup();
        run(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO records (id, owner_id, fields, sync_status) VALUES ('', 'u1', '{}', 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_records_reject_unknown_status() {
        let conn = setup();
        run(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO records (id, owner_id, fields, sync_status) VALUES ('b1', 'u1', '{}', 9)",
            [],
        );
        assert!(result.is_err());
    }
}
