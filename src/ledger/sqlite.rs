//! SQLite-backed ledger

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;

use super::schema::create_tables;
use super::{parse_date, parse_discipline, Ledger, LedgerEntry};

/// Ledger stored in a SQLite database
pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    /// Open the database, creating it and its tables if needed
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create ledger directory")?;
            }
        }

        let conn = Connection::open(db_path).context("Failed to open ledger database")?;
        create_tables(&conn)?;

        Ok(Self { conn })
    }

    /// Create an in-memory ledger (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        create_tables(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ledger", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl Ledger for SqliteLedger {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn append(&mut self, entry: &LedgerEntry) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO ledger
            (race_date, discipline, track, runner_number, won, edge_multiplier)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.date.to_string(),
                entry.discipline.name(),
                entry.track,
                entry.runner_number,
                entry.won,
                entry.edge_multiplier,
            ],
        )?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT race_date, discipline, track, runner_number, won, edge_multiplier
            FROM ledger
            ORDER BY id
            "#,
        )?;

        let entries = stmt
            .query_map([], |row| {
                let date: String = row.get(0)?;
                let discipline: String = row.get(1)?;
                Ok(LedgerEntry {
                    date: parse_date(&date),
                    discipline: parse_discipline(&discipline),
                    track: row.get(2)?,
                    runner_number: row.get(3)?,
                    won: row.get(4)?,
                    edge_multiplier: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn reset(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM ledger", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::sample_entry;
    use crate::types::Discipline;

    #[test]
    fn test_append_and_read_in_order() {
        let mut ledger = SqliteLedger::in_memory().unwrap();
        ledger.append(&sample_entry("3", true)).unwrap();
        ledger.append(&sample_entry("7", false)).unwrap();

        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], sample_entry("3", true));
        assert_eq!(entries[1].runner_number, "7");
        assert!(!entries[1].won);
        assert_eq!(entries[1].discipline, Discipline::Trot);
    }

    #[test]
    fn test_append_only_keeps_duplicates() {
        let mut ledger = SqliteLedger::in_memory().unwrap();
        let entry = sample_entry("3", true);
        ledger.append(&entry).unwrap();
        ledger.append(&entry).unwrap();
        assert_eq!(ledger.count().unwrap(), 2);
    }

    #[test]
    fn test_reset() {
        let mut ledger = SqliteLedger::in_memory().unwrap();
        ledger.append(&sample_entry("1", false)).unwrap();
        ledger.reset().unwrap();
        assert!(ledger.entries().unwrap().is_empty());
    }
}
