//! SQLite schema for the learning ledger
//!
//! Tables:
//! - ledger: one row per settled bet

use rusqlite::{Connection, Result};

/// Create the ledger table and its indexes
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS ledger (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            race_date TEXT NOT NULL,
            discipline TEXT NOT NULL,
            track TEXT NOT NULL DEFAULT '',
            runner_number TEXT NOT NULL,
            won INTEGER NOT NULL,
            edge_multiplier REAL NOT NULL,
            created_at TEXT DEFAULT (datetime('now'))
        )
        "#,
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_discipline ON ledger(discipline)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_track ON ledger(track)",
        [],
    )?;

    Ok(())
}
