//! CSV-backed ledger
//!
//! Columns: date, discipline, track, runner_number, won (0/1), edge_multiplier

use anyhow::{Context, Result};
use polars::prelude::*;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use super::{parse_date, parse_discipline, Ledger, LedgerEntry};

/// Ledger stored as a delimited text file
pub struct CsvLedger {
    path: PathBuf,
}

impl CsvLedger {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_empty_file(&self) -> bool {
        std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true)
    }
}

impl Ledger for CsvLedger {
    fn backend(&self) -> &'static str {
        "csv"
    }

    fn append(&mut self, entry: &LedgerEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create ledger directory")?;
            }
        }

        let write_header = self.is_empty_file();
        let date = entry.date.format("%Y-%m-%d").to_string();

        let mut df = df!(
            "date" => [date.as_str()],
            "discipline" => [entry.discipline.name()],
            "track" => [entry.track.as_str()],
            "runner_number" => [entry.runner_number.as_str()],
            "won" => [entry.won as i64],
            "edge_multiplier" => [entry.edge_multiplier],
        )?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open ledger file {}", self.path.display()))?;

        CsvWriter::new(&mut file)
            .include_header(write_header)
            .finish(&mut df)?;

        Ok(())
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>> {
        if self.is_empty_file() {
            return Ok(Vec::new());
        }

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(self.path.clone()))?
            .finish()?;

        if df.height() == 0 {
            return Ok(Vec::new());
        }

        // Inferred dtypes vary (e.g. numeric runner numbers), so cast explicitly
        let dates = df.column("date")?.cast(&DataType::String)?;
        let disciplines = df.column("discipline")?.cast(&DataType::String)?;
        let tracks = df.column("track")?.cast(&DataType::String)?;
        let numbers = df.column("runner_number")?.cast(&DataType::String)?;
        let won = df.column("won")?.cast(&DataType::Int64)?;
        let multipliers = df.column("edge_multiplier")?.cast(&DataType::Float64)?;

        let dates = dates.str()?;
        let disciplines = disciplines.str()?;
        let tracks = tracks.str()?;
        let numbers = numbers.str()?;
        let won = won.i64()?;
        let multipliers = multipliers.f64()?;

        let mut entries = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let Some(runner_number) = numbers.get(i) else {
                continue;
            };
            entries.push(LedgerEntry {
                date: parse_date(dates.get(i).unwrap_or("")),
                discipline: parse_discipline(disciplines.get(i).unwrap_or("")),
                track: tracks.get(i).unwrap_or("").to_string(),
                runner_number: runner_number.to_string(),
                won: won.get(i).unwrap_or(0) != 0,
                edge_multiplier: multipliers.get(i).unwrap_or(1.0),
            });
        }

        Ok(entries)
    }

    fn reset(&mut self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}
