//! Ledger-driven adjustment of the edge multiplier.
//!
//! The trailing win-rate over the most recent matching ledger rows selects
//! one of three buckets, each adding a fixed offset to the base multiplier.

use serde::{Deserialize, Serialize};

use crate::config::LearningConfig;
use crate::ledger::{Ledger, LedgerEntry};
use crate::types::{Discipline, StatsResponse};

const MIN_WINDOW: usize = 5;
const MAX_WINDOW: usize = 20;

/// Edge multiplier bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeBucket {
    Optimistic,
    #[default]
    Neutral,
    Cautious,
}

impl EdgeBucket {
    pub fn name(&self) -> &'static str {
        match self {
            EdgeBucket::Optimistic => "optimistic",
            EdgeBucket::Neutral => "neutral",
            EdgeBucket::Cautious => "cautious",
        }
    }

    /// Offset added to the discipline's base multiplier
    pub fn offset(&self, config: &LearningConfig) -> f64 {
        match self {
            EdgeBucket::Optimistic => config.optimistic_offset,
            EdgeBucket::Neutral => 0.0,
            EdgeBucket::Cautious => config.cautious_offset,
        }
    }
}

/// Row filter; `None` matches everything
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerFilter<'a> {
    pub discipline: Option<Discipline>,
    pub track: Option<&'a str>,
}

impl LedgerFilter<'_> {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        let discipline_ok = self.discipline.map_or(true, |d| entry.discipline == d);
        let track_ok = self
            .track
            .map_or(true, |t| entry.track.trim().eq_ignore_ascii_case(t.trim()));
        discipline_ok && track_ok
    }
}

/// Trailing outcome statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailingRate {
    pub rows: usize,
    pub wins: usize,
}

impl TrailingRate {
    pub fn win_rate(&self) -> Option<f64> {
        if self.rows > 0 {
            Some(self.wins as f64 / self.rows as f64)
        } else {
            None
        }
    }
}

/// Whole-ledger statistics
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LedgerSummary {
    pub total_rows: usize,
    pub wins: usize,
}

impl LedgerSummary {
    pub fn from_entries(entries: &[LedgerEntry]) -> Self {
        Self {
            total_rows: entries.len(),
            wins: entries.iter().filter(|e| e.won).count(),
        }
    }

    pub fn hit_rate(&self) -> f64 {
        if self.total_rows > 0 {
            self.wins as f64 / self.total_rows as f64
        } else {
            0.0
        }
    }
}

/// Result of assessing the ledger for one filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub trailing: TrailingRate,
    pub bucket: EdgeBucket,
    pub offset: f64,
}

/// Maps trailing win-rates to edge buckets
#[derive(Debug, Clone)]
pub struct LearningAdjuster {
    config: LearningConfig,
}

impl LearningAdjuster {
    pub fn new(config: LearningConfig) -> Self {
        Self { config }
    }

    /// Effective trailing window
    pub fn window(&self) -> usize {
        self.config.window.clamp(MIN_WINDOW, MAX_WINDOW)
    }

    /// Win-rate over the last `window` rows matching the filter
    pub fn trailing_rate(&self, entries: &[LedgerEntry], filter: LedgerFilter<'_>) -> TrailingRate {
        let recent: Vec<&LedgerEntry> = entries
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(self.window())
            .collect();

        TrailingRate {
            rows: recent.len(),
            wins: recent.iter().filter(|e| e.won).count(),
        }
    }

    pub fn bucket_for_rate(&self, win_rate: Option<f64>) -> EdgeBucket {
        match win_rate {
            None => EdgeBucket::Neutral,
            Some(rate) if rate >= self.config.optimistic_threshold => EdgeBucket::Optimistic,
            Some(rate) if rate >= self.config.cautious_threshold => EdgeBucket::Neutral,
            Some(_) => EdgeBucket::Cautious,
        }
    }

    pub fn assess(&self, entries: &[LedgerEntry], filter: LedgerFilter<'_>) -> Assessment {
        let trailing = self.trailing_rate(entries, filter);
        let bucket = self.bucket_for_rate(trailing.win_rate());
        Assessment {
            trailing,
            bucket,
            offset: bucket.offset(&self.config),
        }
    }

    /// Read the whole ledger and assess it.
    pub fn assess_ledger(
        &self,
        ledger: &dyn Ledger,
        filter: LedgerFilter<'_>,
    ) -> anyhow::Result<Assessment> {
        let entries = ledger.entries()?;
        let assessment = self.assess(&entries, filter);
        tracing::debug!(
            "Ledger ({}) trailing {}/{} wins -> {}",
            ledger.backend(),
            assessment.trailing.wins,
            assessment.trailing.rows,
            assessment.bucket.name()
        );
        Ok(assessment)
    }

    /// Trailing assessment plus whole-ledger hit rate
    pub fn stats(&self, ledger: &dyn Ledger, filter: LedgerFilter<'_>) -> anyhow::Result<StatsResponse> {
        let entries = ledger.entries()?;
        let assessment = self.assess(&entries, filter);
        let summary = LedgerSummary::from_entries(&entries);

        Ok(StatsResponse {
            window: self.window(),
            recent_rows: assessment.trailing.rows,
            recent_wins: assessment.trailing.wins,
            recent_win_rate: assessment.trailing.win_rate(),
            bucket: assessment.bucket,
            edge_offset: assessment.offset,
            total_rows: summary.total_rows,
            total_wins: summary.wins,
            hit_rate: summary.hit_rate(),
        })
    }
}
