//! Staking logic: edge multiplier, estimated probability, fractional Kelly stake.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::StakingConfig;
use crate::types::{Discipline, Recommendation};

static FORM_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9DATR])[amphsc]").expect("form token pattern"));

/// Weights applied to the most recent form tokens, newest first
const FORM_WEIGHTS: [f64; 4] = [1.0, 0.75, 0.5, 0.25];

/// Invalid staking input
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StakingError {
    #[error("odds must be greater than 1.0, got {0}")]
    InvalidOdds(f64),
    #[error("capital must be a non-negative amount, got {0}")]
    InvalidCapital(f64),
}

/// Derived staking figures for one runner
#[derive(Debug, Clone, PartialEq)]
pub struct StakeEstimate {
    /// Combined multiplier after form and volatility adjustments
    pub edge_multiplier: f64,
    pub estimated_probability: f64,
    pub edge_index: f64,
    pub podium_confidence: f64,
    /// Kelly fraction from the odds band (not the full Kelly)
    pub kelly_fraction: f64,
    pub suggested_stake: f64,
    pub recommendation: Recommendation,
}

/// Weighted adjustment from a form string.
///
/// Scans up to four tokens, most recent first. Wins and places add,
/// unplaced finishes and incidents (disqualified, stopped, fell, refused)
/// subtract. Year markers such as `(23)` are ignored.
pub fn form_adjustment(form: &str) -> f64 {
    FORM_TOKEN
        .captures_iter(form)
        .take(FORM_WEIGHTS.len())
        .zip(FORM_WEIGHTS)
        .map(|(caps, weight)| {
            let increment = match &caps[1] {
                "1" => 0.04,
                "2" | "3" => 0.02,
                "4" | "5" => 0.0,
                "D" | "A" | "T" | "R" => -0.03,
                _ => -0.01, // 6-9 and 0 (unplaced)
            };
            increment * weight
        })
        .sum()
}

/// Divisor damping the multiplier as odds grow.
pub fn volatility_divisor(odds: f64, damping: f64) -> f64 {
    if damping <= 0.0 {
        return 1.0;
    }
    1.0 + damping * odds.ln()
}

/// Full Kelly fraction.
///
/// Kelly fraction = (p * b - q) / b
/// where:
///   p = probability of winning
///   b = net odds (decimal odds - 1)
///   q = 1 - p
///
/// Returns 0 for negative edges.
pub fn calculate_kelly_fraction(probability: f64, odds: f64) -> f64 {
    if probability <= 0.0 || odds <= 1.0 {
        return 0.0;
    }

    let b = odds - 1.0;
    let q = 1.0 - probability;

    let kelly = (probability * b - q) / b;
    kelly.max(0.0)
}

/// Probability of a top-three finish, from the win probability.
pub fn podium_confidence(probability: f64) -> f64 {
    1.0 - (1.0 - probability).powi(3)
}

/// Round down to cents, never above the input.
fn floor_cents(amount: f64) -> f64 {
    ((amount * 100.0).floor() / 100.0).min(amount)
}

/// Stake calculator over a staking configuration
pub struct StakingCalculator<'a> {
    config: &'a StakingConfig,
}

impl<'a> StakingCalculator<'a> {
    pub fn new(config: &'a StakingConfig) -> Self {
        Self { config }
    }

    /// Base multiplier for a discipline
    pub fn base_multiplier(&self, discipline: Discipline) -> f64 {
        self.config.multipliers.for_discipline(discipline)
    }

    /// Kelly fraction for the odds band
    pub fn band_fraction(&self, odds: f64) -> f64 {
        self.config
            .kelly_bands
            .iter()
            .find(|band| odds <= band.max_odds)
            .map(|band| band.fraction)
            .unwrap_or(self.config.tail_fraction)
    }

    /// Evaluate a runner with the discipline's base multiplier.
    pub fn evaluate(
        &self,
        odds: f64,
        capital: f64,
        discipline: Discipline,
        form: Option<&str>,
    ) -> Result<StakeEstimate, StakingError> {
        self.evaluate_with_multiplier(odds, capital, self.base_multiplier(discipline), form)
    }

    /// Evaluate a runner from an explicit base multiplier.
    pub fn evaluate_with_multiplier(
        &self,
        odds: f64,
        capital: f64,
        base_multiplier: f64,
        form: Option<&str>,
    ) -> Result<StakeEstimate, StakingError> {
        if !odds.is_finite() || odds <= 1.0 {
            return Err(StakingError::InvalidOdds(odds));
        }
        if !capital.is_finite() || capital < 0.0 {
            return Err(StakingError::InvalidCapital(capital));
        }

        let form_adj = form.map(form_adjustment).unwrap_or(0.0);
        let edge_multiplier = (base_multiplier + form_adj)
            / volatility_divisor(odds, self.config.volatility_damping);

        // min/max rather than clamp: a misconfigured cap must not panic
        let estimated_probability = ((1.0 / odds) * edge_multiplier)
            .min(self.config.max_probability)
            .max(0.0);
        let edge_index = estimated_probability * odds;

        let kelly_fraction = self.band_fraction(odds);
        let kelly = calculate_kelly_fraction(estimated_probability, odds);

        let ceiling = (capital * self.config.max_stake_fraction).max(0.0);
        let raw_stake = capital * kelly_fraction * kelly;
        let suggested_stake = floor_cents(raw_stake.min(ceiling).max(0.0));

        Ok(StakeEstimate {
            edge_multiplier,
            estimated_probability,
            edge_index,
            podium_confidence: podium_confidence(estimated_probability),
            kelly_fraction,
            suggested_stake,
            recommendation: Recommendation::classify(
                edge_index,
                suggested_stake,
                self.config.value_threshold,
            ),
        })
    }
}
