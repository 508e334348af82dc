//! Block layout: number alone on a line, name on the next, odds further down.

use super::{find_form, first_odds_in, is_number_line, normalize_number, runner_name, ExtractionStrategy};
use crate::types::RunnerRecord;

/// Reads runners laid out one field per line
pub struct BlockStrategy {
    /// Lines scanned after the number for the name and odds
    lookahead: usize,
}

impl Default for BlockStrategy {
    fn default() -> Self {
        Self { lookahead: 8 }
    }
}

impl BlockStrategy {
    pub fn new(lookahead: usize) -> Self {
        Self {
            lookahead: lookahead.max(1),
        }
    }

    /// Try to read one runner opened at `start`.
    ///
    /// Returns the record and the index of the line holding its odds.
    fn try_block(&self, lines: &[&str], start: usize) -> Option<(RunnerRecord, usize)> {
        let number = normalize_number(lines[start])?;
        let end = (start + 1 + self.lookahead).min(lines.len());

        // Name: first following line with letters, before any other number line
        let (name_idx, name) = lines[start + 1..end]
            .iter()
            .enumerate()
            .take_while(|(_, line)| !is_number_line(line))
            .find_map(|(offset, line)| runner_name(line).map(|name| (start + 1 + offset, name)))?;

        // Odds: first qualifying decimal from the name line on, stopping at the next runner
        let mut form = None;
        for (idx, line) in lines.iter().enumerate().take(end).skip(name_idx) {
            if idx > name_idx && is_number_line(line) {
                break;
            }
            if form.is_none() {
                form = find_form(line);
            }
            if let Some(odds) = first_odds_in(line) {
                let record = RunnerRecord::new(number, name, odds)?.with_form(form);
                return Some((record, idx));
            }
        }
        None
    }
}

impl ExtractionStrategy for BlockStrategy {
    fn name(&self) -> &'static str {
        "block"
    }

    fn extract(&self, text: &str) -> Vec<RunnerRecord> {
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let mut records = Vec::new();

        let mut i = 0;
        while i < lines.len() {
            if is_number_line(lines[i]) {
                if let Some((record, odds_idx)) = self.try_block(&lines, i) {
                    records.push(record);
                    i = odds_idx + 1;
                    continue;
                }
            }
            i += 1;
        }

        records
    }
}
