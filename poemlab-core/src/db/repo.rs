//! Database repository layer
//!
//! Stores session snapshots and the summary appendix.

use crate::error::{Error, Result};
use crate::recorder::SessionRecorder;
use crate::types::*;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

/// Database handle (single connection, serialized by a mutex)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL and a busy timeout for concurrent study processes
        conn.execute_batch(
            "
            PRAGMA busy_timeout = 5000;
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        super::schema::run_migrations(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    // ============================================
    // Session snapshots
    // ============================================

    /// Insert or overwrite a session snapshot.
    ///
    /// Returns false if the stored snapshot is newer and was kept.
    pub fn upsert_session_record(&self, record: &SessionRecord) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            r#"
            INSERT INTO study_sessions (id, participant_id, status, stage, saved_at, record)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                participant_id = excluded.participant_id,
                status = excluded.status,
                stage = excluded.stage,
                saved_at = excluded.saved_at,
                record = excluded.record
            WHERE excluded.saved_at >= study_sessions.saved_at
            "#,
            params![
                record.session_id,
                record.participant_id,
                record.status.as_str(),
                record.stage.as_str(),
                timestamp_key(record.saved_at),
                serde_json::to_string(record)?,
            ],
        )?;

        if changed == 0 {
            tracing::warn!(
                session_id = %record.session_id,
                "Skipped stale session snapshot"
            );
        }
        Ok(changed > 0)
    }

    /// Get the latest snapshot of a session
    pub fn get_session_record(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let conn = self.lock()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT record FROM study_sessions WHERE id = ?",
                [session_id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// List stored sessions, most recently saved first
    pub fn list_sessions(&self) -> Result<Vec<SessionListing>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, participant_id, status, stage, saved_at
            FROM study_sessions
            ORDER BY saved_at DESC
            "#,
        )?;

        let sessions = stmt
            .query_map([], Self::row_to_listing)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    /// Session ids starting with `prefix`
    pub fn find_session_ids(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM study_sessions WHERE substr(id, 1, length(?1)) = ?1 ORDER BY id",
        )?;
        let ids = stmt
            .query_map([prefix], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    fn row_to_listing(row: &Row) -> rusqlite::Result<SessionListing> {
        Ok(SessionListing {
            session_id: row.get("id")?,
            participant_id: row.get("participant_id")?,
            status: parse_column(row, "status")?,
            stage: parse_column(row, "stage")?,
            saved_at: timestamp_column(row, "saved_at")?,
        })
    }

    // ============================================
    // Summary appendix
    // ============================================

    /// Append the summary row for a session.
    ///
    /// Runs in an immediate transaction so concurrent writers are serialized.
    pub fn insert_summary(&self, summary: &SummaryRow) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM session_summaries WHERE session_id = ?)",
            [&summary.session_id],
            |row| row.get(0),
        )?;
        if exists {
            return Err(Error::SummaryAlreadyRecorded(summary.session_id.clone()));
        }

        tx.execute(
            r#"
            INSERT INTO session_summaries (session_id, saved_at, participant_id, anthro_level,
                                           pov, error_type, poem_attempts, timer_expired,
                                           ended_by_user, difficulty, ai_helpful, noticed_error)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                summary.session_id,
                timestamp_key(summary.saved_at),
                summary.participant_id,
                summary.anthro_level.as_str(),
                summary.pov.as_str(),
                summary.error_type.as_str(),
                summary.poem_attempts,
                summary.timer_expired,
                summary.ended_by_user,
                summary.difficulty,
                summary.ai_helpful,
                summary.noticed_error.as_str(),
            ],
        )?;
        tx.commit()?;

        tracing::debug!(session_id = %summary.session_id, "Summary row appended");
        Ok(())
    }

    /// All summary rows in append order
    pub fn list_summaries(&self) -> Result<Vec<SummaryRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT * FROM session_summaries ORDER BY seq")?;
        let rows = stmt
            .query_map([], Self::row_to_summary)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn row_to_summary(row: &Row) -> rusqlite::Result<SummaryRow> {
        Ok(SummaryRow {
            saved_at: timestamp_column(row, "saved_at")?,
            session_id: row.get("session_id")?,
            participant_id: row.get("participant_id")?,
            anthro_level: parse_column(row, "anthro_level")?,
            pov: parse_column(row, "pov")?,
            error_type: parse_column(row, "error_type")?,
            poem_attempts: row.get("poem_attempts")?,
            timer_expired: row.get("timer_expired")?,
            ended_by_user: row.get("ended_by_user")?,
            difficulty: row.get("difficulty")?,
            ai_helpful: row.get("ai_helpful")?,
            noticed_error: parse_column(row, "noticed_error")?,
        })
    }
}

impl SessionRecorder for Database {
    fn save_session(&self, record: &SessionRecord) -> Result<()> {
        self.upsert_session_record(record).map(|_| ())
    }

    fn load_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        self.get_session_record(session_id)
    }

    fn append_summary(&self, row: &SummaryRow) -> Result<()> {
        self.insert_summary(row)
    }
}

/// Fixed-width UTC timestamp so text comparison matches time order
fn timestamp_key(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn timestamp_column(row: &Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(row, column, e.to_string()))
}

fn parse_column<T>(row: &Row, column: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let value: String = row.get(column)?;
    value
        .parse()
        .map_err(|e: String| conversion_error(row, column, e))
}

fn conversion_error(row: &Row, column: &str, message: String) -> rusqlite::Error {
    let index = row.as_ref().column_index(column).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Session, StudySettings};
    use chrono::{Duration, TimeZone};

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap()
    }

    fn registered_session() -> Session {
        let mut session = Session::new(StudySettings::default(), t0());
        session.register("Ada", Some("P-01"), true, t0()).unwrap();
        session
    }

    #[test]
    fn test_snapshot_overwrites_and_round_trips() {
        let db = test_db();
        let mut session = registered_session();
        db.upsert_session_record(&session.to_record(t0())).unwrap();

        session.submit_turn("ready", t0()).unwrap();
        let later = t0() + Duration::seconds(5);
        assert!(db.upsert_session_record(&session.to_record(later)).unwrap());

        let stored = db.get_session_record(session.id()).unwrap().unwrap();
        assert_eq!(stored, session.to_record(later));
        assert_eq!(db.list_sessions().unwrap().len(), 1);
    }

    #[test]
    fn test_stale_snapshot_is_ignored() {
        let db = test_db();
        let mut session = registered_session();
        let early = session.to_record(t0());
        session.submit_turn("ready", t0()).unwrap();
        let late = session.to_record(t0() + Duration::seconds(10));

        db.upsert_session_record(&late).unwrap();
        assert!(!db.upsert_session_record(&early).unwrap());

        let stored = db.get_session_record(session.id()).unwrap().unwrap();
        assert_eq!(stored.messages.len(), 3);
    }

    #[test]
    fn test_summary_appended_once() {
        let db = test_db();
        let mut session = registered_session();
        session.end_study(t0()).unwrap();
        session
            .submit_feedback(FeedbackResponses::default())
            .unwrap();
        let row = session.summary_row(t0()).unwrap();

        db.insert_summary(&row).unwrap();
        let err = db.insert_summary(&row).unwrap_err();
        assert!(matches!(err, Error::SummaryAlreadyRecorded(_)));

        let rows = db.list_summaries().unwrap();
        assert_eq!(rows, vec![row]);
    }

    #[test]
    fn test_find_session_ids_by_prefix() {
        let db = test_db();
        let session = registered_session();
        db.upsert_session_record(&session.to_record(t0())).unwrap();

        let prefix: String = session.id().chars().take(8).collect();
        assert_eq!(
            db.find_session_ids(&prefix).unwrap(),
            vec![session.id().to_string()]
        );
        assert!(db.find_session_ids("zzzz").unwrap().is_empty());
        assert!(db.get_session_record("zzzz").unwrap().is_none());
    }
}
