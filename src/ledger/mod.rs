//! Learning ledger: append-only table of past bet outcomes.
//!
//! Two backends share the [`Ledger`] trait:
//! - SQLite (`ledger` table, created on open)
//! - CSV file with a header row, read back with polars

pub mod csv;
pub mod schema;
pub mod sqlite;

pub use self::csv::CsvLedger;
pub use self::sqlite::SqliteLedger;

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{LedgerBackend, LedgerConfig};
use crate::types::Discipline;

/// One settled bet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub discipline: Discipline,
    /// Racecourse (hippodrome), empty when unknown
    pub track: String,
    pub runner_number: String,
    pub won: bool,
    pub edge_multiplier: f64,
}

/// Append-only outcome storage
pub trait Ledger: Send {
    /// Backend name for logs
    fn backend(&self) -> &'static str;

    /// Append one row
    fn append(&mut self, entry: &LedgerEntry) -> Result<()>;

    /// All rows, oldest first
    fn entries(&self) -> Result<Vec<LedgerEntry>>;

    /// Manual full reset
    fn reset(&mut self) -> Result<()>;
}

/// Open the ledger selected by configuration
pub fn open_ledger(config: &LedgerConfig) -> Result<Box<dyn Ledger>> {
    let path = config.resolved_path();
    tracing::debug!("Opening {:?} ledger at {}", config.backend, path);

    let ledger: Box<dyn Ledger> = match config.backend {
        LedgerBackend::Sqlite => Box::new(SqliteLedger::open(Path::new(&path))?),
        LedgerBackend::Csv => Box::new(CsvLedger::new(&path)),
    };
    Ok(ledger)
}

/// Parse a stored discipline name, falling back to the default
fn parse_discipline(raw: &str) -> Discipline {
    raw.parse().unwrap_or_else(|e| {
        tracing::warn!("Ledger row with {}, counted as {}", e, Discipline::default());
        Discipline::default()
    })
}

/// Parse a stored date, falling back to the epoch used for unreadable rows
fn parse_date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").unwrap_or_default()
}

#[cfg(test)]
pub(crate) fn sample_entry(number: &str, won: bool) -> LedgerEntry {
    LedgerEntry {
        date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        discipline: Discipline::Trot,
        track: "Vincennes".to_string(),
        runner_number: number.to_string(),
        won,
        edge_multiplier: 1.15,
    }
}
