//! Schema management: table layout, version detection, the one-shot upgrade
//!
//! The day table is normalized to one row per recorded day, keyed by the
//! packed `MonthDay` integer, so chronological range scans are ordinary
//! indexed range reads. Version 1 stores only the scale weight; version 2
//! adds the fat weight and note columns.

use rusqlite::Connection;

use crate::error::Result;

/// Schema version this build reads and writes.
pub const SCHEMA_VERSION: i32 = 2;

/// Default busy timeout (ms).
const BUSY_TIMEOUT_MS: u64 = 5_000;

const CREATE_SQL: &str = "
CREATE TABLE IF NOT EXISTS metadata (
    name  TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS days (
    monthday   INTEGER PRIMARY KEY,
    weight     REAL,
    fat_weight REAL,
    flags      INTEGER NOT NULL DEFAULT 0,
    note       TEXT
);
CREATE TABLE IF NOT EXISTS equivalents (
    position INTEGER PRIMARY KEY,
    name     TEXT NOT NULL,
    unit     TEXT NOT NULL,
    value    REAL NOT NULL
);
";

/// Apply connection pragmas before any other statement.
pub fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "wal")?;
    conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Prepare a freshly opened connection: create the current schema on a new
/// database, or record the legacy version marker on an old one.
pub fn initialize(conn: &Connection) -> Result<()> {
    let has_days = table_exists(conn, "days")?;
    let has_metadata = table_exists(conn, "metadata")?;

    if !has_days {
        conn.execute_batch(CREATE_SQL)?;
        set_version(conn, SCHEMA_VERSION)?;
        tracing::debug!(version = SCHEMA_VERSION, "created fresh schema");
        return Ok(());
    }

    if !has_metadata {
        // Pre-versioning database: treat as version 1 and let the caller
        // decide when to run the upgrade.
        conn.execute_batch(
            "CREATE TABLE metadata (name TEXT PRIMARY KEY, value INTEGER NOT NULL)",
        )?;
        set_version(conn, 1)?;
        tracing::debug!("tagged legacy database as schema version 1");
    }

    Ok(())
}

/// Read the stored schema version.
pub fn version(conn: &Connection) -> Result<i32> {
    let v = conn.query_row(
        "SELECT value FROM metadata WHERE name = 'schema_version'",
        [],
        |row| row.get(0),
    )?;
    Ok(v)
}

/// True when the on-disk schema is older than this build requires.
pub fn needs_upgrade(conn: &Connection) -> Result<bool> {
    Ok(version(conn)? < SCHEMA_VERSION)
}

/// Run the single upgrade step. Idempotent: the version is re-checked
/// inside the transaction, so a second call is a no-op.
pub fn upgrade(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    let found = {
        let v: i32 = tx.query_row(
            "SELECT value FROM metadata WHERE name = 'schema_version'",
            [],
            |row| row.get(0),
        )?;
        v
    };
    if found >= SCHEMA_VERSION {
        return Ok(());
    }

    tx.execute_batch(
        "ALTER TABLE days ADD COLUMN fat_weight REAL;
         ALTER TABLE days ADD COLUMN note TEXT;
         CREATE TABLE IF NOT EXISTS equivalents (
             position INTEGER PRIMARY KEY,
             name     TEXT NOT NULL,
             unit     TEXT NOT NULL,
             value    REAL NOT NULL
         );",
    )?;
    tx.execute(
        "UPDATE metadata SET value = ?1 WHERE name = 'schema_version'",
        [SCHEMA_VERSION],
    )?;
    tx.commit()?;
    tracing::info!(from = found, to = SCHEMA_VERSION, "schema upgraded");
    Ok(())
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn set_version(conn: &Connection, v: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (name, value) VALUES ('schema_version', ?1)",
        [v],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_v1() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE days (
                 monthday INTEGER PRIMARY KEY,
                 weight   REAL,
                 flags    INTEGER NOT NULL DEFAULT 0
             );",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_fresh_database_is_current() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        assert_eq!(version(&conn).unwrap(), SCHEMA_VERSION);
        assert!(!needs_upgrade(&conn).unwrap());
    }

    #[test]
    fn test_legacy_database_needs_upgrade() {
        let mut conn = legacy_v1();
        initialize(&conn).unwrap();
        assert_eq!(version(&conn).unwrap(), 1);
        assert!(needs_upgrade(&conn).unwrap());

        upgrade(&mut conn).unwrap();
        assert_eq!(version(&conn).unwrap(), SCHEMA_VERSION);

        // New columns are live after the upgrade.
        conn.execute(
            "INSERT INTO days (monthday, weight, fat_weight, flags, note)
             VALUES (1, 70.0, 20.0, 0, 'ok')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_upgrade_is_idempotent() {
        let mut conn = legacy_v1();
        initialize(&conn).unwrap();
        upgrade(&mut conn).unwrap();
        upgrade(&mut conn).unwrap();
        assert_eq!(version(&conn).unwrap(), SCHEMA_VERSION);
    }
}
