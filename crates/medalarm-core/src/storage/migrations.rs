//! Database schema migrations for medalarm.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Current schema version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: medications, alarms and history.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS medications (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            pill_count  INTEGER NOT NULL DEFAULT 0 CHECK (pill_count >= 0),
            active      INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS alarms (
            id              TEXT PRIMARY KEY,
            medication_id   TEXT NOT NULL REFERENCES medications(id) ON DELETE CASCADE,
            medication_name TEXT NOT NULL,
            time            TEXT NOT NULL,
            days            TEXT NOT NULL DEFAULT '[]',
            enabled         INTEGER NOT NULL DEFAULT 1,
            position        INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS history (
            id              TEXT PRIMARY KEY,
            medication_id   TEXT NOT NULL,
            medication_name TEXT NOT NULL,
            taken_at        TEXT NOT NULL,
            alarm_id        TEXT,
            on_time         INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_alarms_medication ON alarms(medication_id, position);
        CREATE INDEX IF NOT EXISTS idx_history_medication_taken ON history(medication_id, taken_at);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: smart-light settings on alarms.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "ALTER TABLE alarms ADD COLUMN light_color TEXT;
         ALTER TABLE alarms ADD COLUMN light_ids TEXT NOT NULL DEFAULT '[]';",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(schema_version(&conn), SCHEMA_VERSION);

        let light_column: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('alarms') WHERE name = 'light_ids'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(light_column, 1);
    }
}
