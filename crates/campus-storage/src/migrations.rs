//! Database schema migrations.
//!
//! Version 1 creates the faqs, conversations, users, and feedback tables
//! alongside the schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use campus_core::error::CampusError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), CampusError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| CampusError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| CampusError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema. Timestamps are Unix milliseconds.
fn apply_v1(conn: &Connection) -> Result<(), CampusError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS faqs (
            id              TEXT PRIMARY KEY NOT NULL,
            question        TEXT NOT NULL,
            answer          TEXT NOT NULL,
            keywords        TEXT NOT NULL DEFAULT '[]',
            category        TEXT NOT NULL,
            languages       TEXT NOT NULL DEFAULT '{}',
            is_active       INTEGER NOT NULL DEFAULT 1,
            priority        INTEGER NOT NULL DEFAULT 1,
            created_at      INTEGER NOT NULL,
            updated_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_faqs_category
            ON faqs (category, is_active);

        CREATE TABLE IF NOT EXISTS conversations (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id          TEXT NOT NULL,
            message_id          TEXT NOT NULL,
            user_id             TEXT,
            user_message        TEXT NOT NULL,
            bot_response        TEXT NOT NULL,
            detected_language   TEXT NOT NULL,
            confidence          REAL NOT NULL DEFAULT 0.0,
            category            TEXT,
            timestamp           INTEGER NOT NULL,
            fallback_triggered  INTEGER NOT NULL DEFAULT 0,
            response_time_ms    INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_session
            ON conversations (session_id, timestamp DESC);

        CREATE INDEX IF NOT EXISTS idx_conversations_timestamp
            ON conversations (timestamp DESC);

        CREATE TABLE IF NOT EXISTS users (
            user_id             TEXT PRIMARY KEY NOT NULL,
            name                TEXT,
            email               TEXT,
            preferred_language  TEXT NOT NULL DEFAULT 'en',
            created_at          INTEGER NOT NULL,
            last_active         INTEGER NOT NULL,
            total_conversations INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS feedback (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id  TEXT NOT NULL,
            message_id  TEXT NOT NULL,
            user_id     TEXT,
            rating      INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            comment     TEXT,
            timestamp   INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_feedback_session
            ON feedback (session_id);

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| CampusError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_conversations_table_exists() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO conversations (session_id, message_id, user_message, bot_response, detected_language, timestamp)
             VALUES ('s-1', 'm-1', 'hello', 'Hello!', 'en', 1700000000000)",
            [],
        )
        .unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_feedback_rating_check() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let bad = conn.execute(
            "INSERT INTO feedback (session_id, message_id, rating, timestamp)
             VALUES ('s-1', 'm-1', 9, 1700000000000)",
            [],
        );
        assert!(bad.is_err());

        conn.execute(
            "INSERT INTO feedback (session_id, message_id, rating, timestamp)
             VALUES ('s-1', 'm-1', 5, 1700000000000)",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_faqs_defaults() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO faqs (id, question, answer, category, created_at, updated_at)
             VALUES ('f-1', 'Q?', 'A.', 'fees', 0, 0)",
            [],
        )
        .unwrap();

        let (active, languages): (i64, String) = conn
            .query_row(
                "SELECT is_active, languages FROM faqs WHERE id = 'f-1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(active, 1);
        assert_eq!(languages, "{}");
    }
}
