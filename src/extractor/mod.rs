//! Runner extraction from pasted race-card text.
//!
//! Pasted text has no fixed schema, so extraction is an ordered chain of
//! strategies. The first strategy yielding at least one runner wins.

pub mod block;
pub mod line;
pub mod page;
pub mod window;

pub use block::BlockStrategy;
pub use line::LineStrategy;
pub use page::page_text;
pub use window::WindowStrategy;

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::types::RunnerRecord;

static ODDS_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,3}[.,]\d{1,2})\b").expect("odds token pattern"));

static NUMBER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0*\d{1,2}$").expect("number line pattern"));

static UPPERCASE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\p{Lu}[\p{Lu}'’\-]*\b(?:\s+\p{Lu}[\p{Lu}'’\-]*\b)*").expect("name pattern")
});

static FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\(\d{2}\)\s*)?(?:\b[0-9DATR][amphsc]\b\s*(?:\(\d{2}\)\s*)?){2,}")
        .expect("form pattern")
});

/// One way of reading runners out of text
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Every runner this strategy recognizes, in text order
    fn extract(&self, text: &str) -> Vec<RunnerRecord>;
}

/// Runners and the strategy that found them
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub strategy: &'static str,
    pub runners: Vec<RunnerRecord>,
}

/// Ordered strategy chain
pub struct Extractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(vec![
            Box::new(BlockStrategy::default()),
            Box::new(WindowStrategy),
            Box::new(LineStrategy),
        ])
    }
}

impl Extractor {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try each strategy in order; `None` means the format was not recognized.
    pub fn extract(&self, text: &str) -> Option<Extraction> {
        for strategy in &self.strategies {
            let runners = dedup_by_number(strategy.extract(text));
            if runners.is_empty() {
                tracing::debug!("Strategy '{}' found no runner", strategy.name());
                continue;
            }

            tracing::debug!(
                "Strategy '{}' extracted {} runners",
                strategy.name(),
                runners.len()
            );
            return Some(Extraction {
                strategy: strategy.name(),
                runners,
            });
        }
        None
    }
}

/// Keep the first record for each runner number
pub fn dedup_by_number(records: Vec<RunnerRecord>) -> Vec<RunnerRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.number.clone()))
        .collect()
}

/// Normalize a runner number label ("07" -> "7"); rejects 0
pub fn normalize_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('0');
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Parse a decimal odds token ("4,5" or "4.5"); only odds above evens pass
pub fn parse_odds(token: &str) -> Option<f64> {
    let odds: f64 = token.trim().replace(',', ".").parse().ok()?;
    (odds.is_finite() && odds > 1.0).then_some(odds)
}

/// First decimal token above 1.0
pub fn first_odds_in(text: &str) -> Option<f64> {
    ODDS_TOKEN
        .captures_iter(text)
        .find_map(|caps| parse_odds(&caps[1]))
}

/// Whether the line holds nothing but a runner number
pub fn is_number_line(line: &str) -> bool {
    NUMBER_LINE.is_match(line.trim())
}

/// First run of uppercase words
pub fn uppercase_name(text: &str) -> Option<String> {
    UPPERCASE_RUN
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['-', '\'', '’']).trim().to_string())
        .find(|name| name.chars().filter(|c| c.is_alphabetic()).count() >= 2)
}

/// Name from a line: uppercase run when present, else the trimmed text
pub fn runner_name(text: &str) -> Option<String> {
    if let Some(name) = uppercase_name(text) {
        return Some(name);
    }
    let cleaned = match find_form(text) {
        Some(form) => text.replace(&form, " "),
        None => text.to_string(),
    };
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.chars().filter(|c| c.is_alphabetic()).count() >= 2 {
        Some(cleaned)
    } else {
        None
    }
}

/// Form string ("1a 3a Da (23) 2m") if the text carries one
pub fn find_form(text: &str) -> Option<String> {
    FORM.find(text).map(|m| m.as_str().trim().to_string())
}
