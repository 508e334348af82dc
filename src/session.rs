//! Session context: bankroll and the most recent analysis.

use chrono::{Local, NaiveDate};

use crate::config::SessionConfig;
use crate::extractor::normalize_number;
use crate::ledger::LedgerEntry;
use crate::types::{Discipline, RaceAnalysis};

/// Settlement failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("no analysis in this session yet")]
    NoAnalysis,
    #[error("runner {0} is not part of the current analysis")]
    UnknownRunner(String),
}

/// Settled outcome of one runner
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub runner_number: String,
    pub won: bool,
    pub odds: f64,
    pub stake: f64,
    pub profit: f64,
    pub bankroll: f64,
    pub discipline: Discipline,
    pub track: Option<String>,
    /// Race base multiplier the stake was computed with
    pub edge_multiplier: f64,
}

impl Settlement {
    /// Ledger row for this outcome
    pub fn ledger_entry(&self, date: NaiveDate) -> LedgerEntry {
        LedgerEntry {
            date,
            discipline: self.discipline,
            track: self.track.clone().unwrap_or_default(),
            runner_number: self.runner_number.clone(),
            won: self.won,
            edge_multiplier: self.edge_multiplier,
        }
    }

    /// Ledger row dated today
    pub fn ledger_entry_today(&self) -> LedgerEntry {
        self.ledger_entry(Local::now().date_naive())
    }
}

/// Interactive session state
#[derive(Debug, Clone)]
pub struct Session {
    pub bankroll: f64,
    pub discipline: Discipline,
    pub track: Option<String>,
    pub current: Option<RaceAnalysis>,
}

impl Session {
    pub fn new(capital: f64, discipline: Discipline, track: Option<String>) -> Self {
        Self {
            bankroll: capital,
            discipline,
            track,
            current: None,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.capital, config.discipline, config.track.clone())
    }

    /// Make `analysis` the current one
    pub fn record_analysis(&mut self, analysis: RaceAnalysis) {
        self.current = Some(analysis);
    }

    /// Settle a runner of the current analysis against the bankroll.
    pub fn settle(&mut self, runner_number: &str, won: bool) -> Result<Settlement, SessionError> {
        let analysis = self.current.as_ref().ok_or(SessionError::NoAnalysis)?;

        let number = normalize_number(runner_number)
            .ok_or_else(|| SessionError::UnknownRunner(runner_number.to_string()))?;
        let runner = analysis
            .find(&number)
            .ok_or_else(|| SessionError::UnknownRunner(runner_number.to_string()))?;

        let stake = runner.suggested_stake;
        let odds = runner.runner.odds;
        let profit = if won { stake * (odds - 1.0) } else { -stake };

        let settlement = Settlement {
            runner_number: number,
            won,
            odds,
            stake,
            profit,
            bankroll: self.bankroll + profit,
            discipline: analysis.discipline,
            track: analysis.track.clone(),
            edge_multiplier: analysis.edge_multiplier,
        };

        self.bankroll = settlement.bankroll;
        tracing::info!(
            "Runner {} {} ({:+.2}), bankroll {:.2}",
            settlement.runner_number,
            if won { "won" } else { "lost" },
            profit,
            self.bankroll
        );
        Ok(settlement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisParams, Analyzer};
    use crate::config::AppConfig;

    fn session_with_analysis() -> Session {
        let analyzer = Analyzer::new(&AppConfig::default());
        let params = AnalysisParams {
            capital: 500.0,
            discipline: Discipline::Trot,
            track: Some("Vincennes".to_string()),
            ..Default::default()
        };
        let analysis = analyzer
            .analyze_text("1\nBOLD EAGLE\n4.5\n2\nFACE TIME\n1.8", &params)
            .unwrap();

        let mut session = Session::new(500.0, Discipline::Trot, None);
        session.record_analysis(analysis);
        session
    }

    #[test]
    fn test_settle_without_analysis() {
        let mut session = Session::from_config(&SessionConfig::default());
        assert_eq!(session.settle("1", true), Err(SessionError::NoAnalysis));
        assert_eq!(session.bankroll, 500.0);
    }

    #[test]
    fn test_settle_win_and_loss() {
        let mut session = session_with_analysis();
        let stake = session.current.as_ref().unwrap().find("2").unwrap().suggested_stake;
        assert!(stake > 0.0);

        let win = session.settle("2", true).unwrap();
        assert!((win.profit - stake * 0.8).abs() < 1e-9);
        assert!((session.bankroll - (500.0 + stake * 0.8)).abs() < 1e-9);

        let loss = session.settle("02", false).unwrap();
        assert_eq!(loss.runner_number, "2");
        assert!((loss.profit + stake).abs() < 1e-9);
        assert!((session.bankroll - (500.0 - stake * 0.2)).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_runner() {
        let mut session = session_with_analysis();
        assert_eq!(
            session.settle("9", true),
            Err(SessionError::UnknownRunner("9".to_string()))
        );
        assert!(session.settle("x", true).is_err());
        assert_eq!(session.bankroll, 500.0);
    }

    #[test]
    fn test_settlement_to_ledger_entry() {
        let mut session = session_with_analysis();
        let settlement = session.settle("1", false).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let entry = settlement.ledger_entry(date);

        assert_eq!(entry.date, date);
        assert_eq!(entry.discipline, Discipline::Trot);
        assert_eq!(entry.track, "Vincennes");
        assert_eq!(entry.runner_number, "1");
        assert!(!entry.won);
        assert!((entry.edge_multiplier - 1.15).abs() < 1e-9);
    }
}
