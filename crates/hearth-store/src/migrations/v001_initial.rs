//! v001 -- Initial schema creation.
//!
//! Creates the single-row `session` table.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Session (at most one signed-in user per database)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS session (
    id           INTEGER PRIMARY KEY CHECK (id = 1),
    user_id      TEXT NOT NULL,
    display_name TEXT NOT NULL,
    avatar_url   TEXT,
    credential   TEXT NOT NULL,
    updated_at   TEXT NOT NULL                -- RFC-3339
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
