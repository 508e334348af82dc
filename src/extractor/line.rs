//! One runner per line: number, name, odds at the end.

use regex::Regex;
use std::sync::LazyLock;

use super::{find_form, normalize_number, parse_odds, runner_name, ExtractionStrategy};
use crate::types::RunnerRecord;

static LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})[\s.\-):]+(.+?)\s+(\d{1,3}(?:[.,]\d{1,2})?)\s*$")
        .expect("line runner pattern")
});

/// Reads `number name odds` lines; integer odds are accepted
pub struct LineStrategy;

impl LineStrategy {
    fn try_line(line: &str) -> Option<RunnerRecord> {
        let caps = LINE.captures(line.trim())?;
        let number = normalize_number(&caps[1])?;
        let odds = parse_odds(&caps[3])?;
        let name = runner_name(&caps[2])?;
        let form = find_form(&caps[2]);
        Some(RunnerRecord::new(number, name, odds)?.with_form(form))
    }
}

impl ExtractionStrategy for LineStrategy {
    fn name(&self) -> &'static str {
        "line"
    }

    fn extract(&self, text: &str) -> Vec<RunnerRecord> {
        text.lines().filter_map(Self::try_line).collect()
    }
}
