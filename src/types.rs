//! Runner records, analysis results and API request/response types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::learning::EdgeBucket;

/// Racing discipline, selects the base edge multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Discipline {
    #[default]
    Flat,
    Trot,         // harness (attelé)
    MountedTrot,  // monté
    Obstacle,     // hurdles and steeplechase
}

impl Discipline {
    pub fn name(&self) -> &'static str {
        match self {
            Discipline::Flat => "flat",
            Discipline::Trot => "trot",
            Discipline::MountedTrot => "mounted-trot",
            Discipline::Obstacle => "obstacle",
        }
    }
}

impl FromStr for Discipline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flat" | "plat" => Ok(Discipline::Flat),
            "trot" | "attele" | "attelé" | "harness" => Ok(Discipline::Trot),
            "mounted-trot" | "mounted_trot" | "monte" | "monté" => Ok(Discipline::MountedTrot),
            "obstacle" | "haies" | "steeple" | "steeplechase" | "hurdles" | "cross" => {
                Ok(Discipline::Obstacle)
            }
            other => Err(format!("unknown discipline: {}", other)),
        }
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A runner extracted from pasted text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerRecord {
    /// Saddle-cloth label, leading zeros stripped
    pub number: String,
    pub name: String,
    /// Decimal odds, always > 1.0
    pub odds: f64,
    /// Recent-form string ("musique"), most recent first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
}

impl RunnerRecord {
    /// Build a record, refusing odds that are not above evens.
    pub fn new(number: impl Into<String>, name: impl Into<String>, odds: f64) -> Option<Self> {
        if !odds.is_finite() || odds <= 1.0 {
            return None;
        }
        Some(Self {
            number: number.into(),
            name: name.into(),
            odds,
            form: None,
        })
    }

    pub fn with_form(mut self, form: Option<String>) -> Self {
        self.form = form;
        self
    }
}

/// Human-readable bet classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "STRONG VALUE")]
    StrongValue,
    #[serde(rename = "VALUE")]
    Value,
    #[serde(rename = "WATCH")]
    Watch,
    #[serde(rename = "PASS")]
    Pass,
}

impl Recommendation {
    /// Classify from edge index and stake.
    pub fn classify(edge_index: f64, stake: f64, value_threshold: f64) -> Self {
        if edge_index >= value_threshold && stake > 0.0 {
            Recommendation::StrongValue
        } else if edge_index > 1.0 && stake > 0.0 {
            Recommendation::Value
        } else if edge_index >= 0.95 {
            Recommendation::Watch
        } else {
            Recommendation::Pass
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Recommendation::StrongValue => "STRONG VALUE",
            Recommendation::Value => "VALUE",
            Recommendation::Watch => "WATCH",
            Recommendation::Pass => "PASS",
        }
    }

    pub fn is_bet(&self) -> bool {
        matches!(self, Recommendation::StrongValue | Recommendation::Value)
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A runner with its derived staking fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerAnalysis {
    #[serde(flatten)]
    pub runner: RunnerRecord,
    pub edge_multiplier: f64,
    pub estimated_probability: f64,
    pub edge_index: f64,
    pub podium_confidence: f64,
    pub kelly_fraction: f64,
    pub suggested_stake: f64,
    #[serde(rename = "recommendation_label")]
    pub recommendation: Recommendation,
}

/// Result of one analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceAnalysis {
    /// Extraction strategy that produced the runners
    pub strategy: String,
    pub discipline: Discipline,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    pub capital: f64,
    pub bucket: EdgeBucket,
    /// Base multiplier (discipline + learning offset) before form and damping
    pub edge_multiplier: f64,
    /// Sorted by edge index, best first
    pub runners: Vec<RunnerAnalysis>,
}

impl RaceAnalysis {
    pub fn find(&self, number: &str) -> Option<&RunnerAnalysis> {
        self.runners.iter().find(|r| r.runner.number == number)
    }

    /// Runners worth alerting on
    pub fn value_runners(&self, threshold: f64) -> impl Iterator<Item = &RunnerAnalysis> {
        self.runners
            .iter()
            .filter(move |r| r.edge_index >= threshold && r.suggested_stake > 0.0)
    }

    pub fn total_stake(&self) -> f64 {
        self.runners.iter().map(|r| r.suggested_stake).sum()
    }
}

/// Analysis request body
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
    #[serde(default)]
    pub capital: Option<f64>,
    #[serde(default)]
    pub discipline: Option<Discipline>,
    #[serde(default)]
    pub track: Option<String>,
    /// Form strings keyed by runner number, overriding extracted ones
    #[serde(default)]
    pub forms: HashMap<String, String>,
    /// Push value runners to the messaging bot
    #[serde(default)]
    pub notify: bool,
}

/// Outcome report for a runner of the current analysis
#[derive(Debug, Deserialize)]
pub struct OutcomeRequest {
    pub runner_number: String,
    pub won: bool,
}

/// Outcome settlement response
#[derive(Debug, Serialize)]
pub struct OutcomeResponse {
    pub runner_number: String,
    pub won: bool,
    pub stake: f64,
    pub profit: f64,
    pub bankroll: f64,
    pub edge_multiplier: f64,
}

/// Session state response
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub bankroll: f64,
    pub discipline: Discipline,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<RaceAnalysis>,
}

/// Ledger statistics query
#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub discipline: Option<Discipline>,
    #[serde(default)]
    pub track: Option<String>,
}

/// Ledger statistics response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub window: usize,
    pub recent_rows: usize,
    pub recent_wins: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_win_rate: Option<f64>,
    pub bucket: EdgeBucket,
    pub edge_offset: f64,
    pub total_rows: usize,
    pub total_wins: usize,
    pub hit_rate: f64,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discipline_aliases() {
        assert_eq!("plat".parse::<Discipline>().unwrap(), Discipline::Flat);
        assert_eq!("Attelé".parse::<Discipline>().unwrap(), Discipline::Trot);
        assert_eq!("monte".parse::<Discipline>().unwrap(), Discipline::MountedTrot);
        assert_eq!("STEEPLE".parse::<Discipline>().unwrap(), Discipline::Obstacle);
        assert!("polo".parse::<Discipline>().is_err());
    }

    #[test]
    fn test_discipline_name_roundtrips() {
        for d in [
            Discipline::Flat,
            Discipline::Trot,
            Discipline::MountedTrot,
            Discipline::Obstacle,
        ] {
            assert_eq!(d.name().parse::<Discipline>().unwrap(), d);
        }
    }

    #[test]
    fn test_runner_record_rejects_evens() {
        assert!(RunnerRecord::new("1", "BOLD EAGLE", 1.0).is_none());
        assert!(RunnerRecord::new("1", "BOLD EAGLE", 0.5).is_none());
        assert!(RunnerRecord::new("1", "BOLD EAGLE", f64::NAN).is_none());
        assert!(RunnerRecord::new("1", "BOLD EAGLE", 1.01).is_some());
    }

    #[test]
    fn test_recommendation_buckets() {
        assert_eq!(Recommendation::classify(1.2, 5.0, 1.10), Recommendation::StrongValue);
        assert_eq!(Recommendation::classify(1.05, 5.0, 1.10), Recommendation::Value);
        assert_eq!(Recommendation::classify(1.2, 0.0, 1.10), Recommendation::Watch);
        assert_eq!(Recommendation::classify(0.90, 0.0, 1.10), Recommendation::Pass);
    }

    #[test]
    fn test_recommendation_serializes_as_label() {
        let json = serde_json::to_string(&Recommendation::StrongValue).unwrap();
        assert_eq!(json, "\"STRONG VALUE\"");
    }
}
