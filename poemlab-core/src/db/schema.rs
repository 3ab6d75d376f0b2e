//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: session snapshots and the summary appendix
    r#"
    -- ============================================
    -- Session snapshots (overwritten on every save)
    -- ============================================

    CREATE TABLE IF NOT EXISTS study_sessions (
        id               TEXT PRIMARY KEY,
        participant_id   TEXT NOT NULL,
        status           TEXT NOT NULL,
        stage            TEXT NOT NULL,
        saved_at         TEXT NOT NULL,

        -- Full SessionRecord
        record           JSON NOT NULL
    );

    -- ============================================
    -- Summary appendix (one row per finalized session)
    -- ============================================

    CREATE TABLE IF NOT EXISTS session_summaries (
        seq              INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id       TEXT NOT NULL UNIQUE,
        saved_at         TEXT NOT NULL,
        participant_id   TEXT NOT NULL,
        anthro_level     TEXT NOT NULL,
        pov              TEXT NOT NULL,
        error_type       TEXT NOT NULL,
        poem_attempts    INTEGER NOT NULL,
        timer_expired    INTEGER NOT NULL,
        ended_by_user    INTEGER NOT NULL,
        difficulty       INTEGER NOT NULL,
        ai_helpful       INTEGER NOT NULL,
        noticed_error    TEXT NOT NULL
    );

    -- ============================================
    -- Indexes
    -- ============================================

    CREATE INDEX IF NOT EXISTS idx_study_sessions_saved_at ON study_sessions(saved_at DESC);
    CREATE INDEX IF NOT EXISTS idx_study_sessions_status ON study_sessions(status);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run migrations twice - should be idempotent
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in ["study_sessions", "session_summaries"] {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }
}
