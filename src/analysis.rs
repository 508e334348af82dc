//! Text → runners → staking, the shared core of the CLI and the API.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::{AppConfig, LearningConfig, StakingConfig};
use crate::extractor::{normalize_number, Extractor};
use crate::learning::EdgeBucket;
use crate::staking::{StakingCalculator, StakingError};
use crate::types::{Discipline, RaceAnalysis, RunnerAnalysis, RunnerRecord};

/// Analysis failure
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("format not recognized: no runner with number, name and odds found")]
    FormatNotRecognized,
    #[error(transparent)]
    Staking(#[from] StakingError),
}

/// Inputs of one analysis besides the text
#[derive(Debug, Clone, Default)]
pub struct AnalysisParams {
    pub capital: f64,
    pub discipline: Discipline,
    pub track: Option<String>,
    /// Form overrides keyed by runner number
    pub forms: HashMap<String, String>,
    pub bucket: EdgeBucket,
}

/// Extraction chain plus staking parameters
pub struct Analyzer {
    extractor: Extractor,
    staking: StakingConfig,
    learning: LearningConfig,
}

impl Analyzer {
    pub fn new(config: &AppConfig) -> Self {
        let extractor = Extractor::default();
        tracing::debug!("Extraction chain: {:?}", extractor.strategy_names());
        Self {
            extractor,
            staking: config.staking.clone(),
            learning: config.learning.clone(),
        }
    }

    pub fn staking_config(&self) -> &StakingConfig {
        &self.staking
    }

    /// Base multiplier for a discipline once the learning offset is applied
    pub fn base_multiplier(&self, discipline: Discipline, bucket: EdgeBucket) -> f64 {
        StakingCalculator::new(&self.staking).base_multiplier(discipline)
            + bucket.offset(&self.learning)
    }

    /// Extract runners from pasted text and stake each one.
    pub fn analyze_text(
        &self,
        text: &str,
        params: &AnalysisParams,
    ) -> Result<RaceAnalysis, AnalysisError> {
        let extraction = self
            .extractor
            .extract(text)
            .ok_or(AnalysisError::FormatNotRecognized)?;

        tracing::info!(
            "Extracted {} runners with '{}' strategy",
            extraction.runners.len(),
            extraction.strategy
        );

        self.analyze_runners(extraction.strategy, extraction.runners, params)
    }

    /// Stake already extracted runners.
    pub fn analyze_runners(
        &self,
        strategy: &str,
        runners: Vec<RunnerRecord>,
        params: &AnalysisParams,
    ) -> Result<RaceAnalysis, AnalysisError> {
        let calculator = StakingCalculator::new(&self.staking);
        let base = self.base_multiplier(params.discipline, params.bucket);

        let forms: HashMap<String, &str> = params
            .forms
            .iter()
            .filter_map(|(number, form)| Some((normalize_number(number)?, form.as_str())))
            .collect();

        let mut analyzed = Vec::with_capacity(runners.len());
        for mut runner in runners {
            if let Some(form) = forms.get(&runner.number) {
                runner.form = Some(form.to_string());
            }
            let estimate = calculator.evaluate_with_multiplier(
                runner.odds,
                params.capital,
                base,
                runner.form.as_deref(),
            )?;

            analyzed.push(RunnerAnalysis {
                runner,
                edge_multiplier: estimate.edge_multiplier,
                estimated_probability: estimate.estimated_probability,
                edge_index: estimate.edge_index,
                podium_confidence: estimate.podium_confidence,
                kelly_fraction: estimate.kelly_fraction,
                suggested_stake: estimate.suggested_stake,
                recommendation: estimate.recommendation,
            });
        }

        analyzed.sort_by(|a, b| {
            b.edge_index
                .partial_cmp(&a.edge_index)
                .unwrap_or(Ordering::Equal)
                .then_with(|| compare_numbers(&a.runner.number, &b.runner.number))
        });

        Ok(RaceAnalysis {
            strategy: strategy.to_string(),
            discipline: params.discipline,
            track: params.track.clone(),
            capital: params.capital,
            bucket: params.bucket,
            edge_multiplier: base,
            runners: analyzed,
        })
    }
}

/// Numeric order for runner numbers, lexical for anything else
fn compare_numbers(a: &str, b: &str) -> Ordering {
    match (a.parse::<u32>(), b.parse::<u32>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}
