//! Sliding window: number, uppercase name, then the first decimal odds nearby.

use regex::Regex;
use std::sync::LazyLock;

use super::{find_form, first_odds_in, normalize_number, ExtractionStrategy};
use crate::types::RunnerRecord;

/// Runner anchor: number, then a run of uppercase words
static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(\d{1,2})\s+(\p{Lu}[\p{Lu}'’\-]*\b(?:\s+\p{Lu}[\p{Lu}'’\-]*\b)*)")
        .expect("window anchor pattern")
});

/// Characters after the name searched for odds
const ODDS_REACH: usize = 80;

/// Reads runners from text where fields run together on few lines
pub struct WindowStrategy;

impl WindowStrategy {
    /// Record for one anchor, with odds and form read from `tail` only
    fn try_anchor(caps: &regex::Captures<'_>, tail: &str) -> Option<RunnerRecord> {
        let number = normalize_number(&caps[1])?;
        let odds = first_odds_in(tail)?;
        let name = caps[2].trim();
        Some(RunnerRecord::new(number, name, odds)?.with_form(find_form(tail)))
    }
}

/// At most `reach` characters of `text`
fn limit_chars(text: &str, reach: usize) -> &str {
    match text.char_indices().nth(reach) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

impl ExtractionStrategy for WindowStrategy {
    fn name(&self) -> &'static str {
        "window"
    }

    fn extract(&self, text: &str) -> Vec<RunnerRecord> {
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let anchors: Vec<regex::Captures<'_>> = ANCHOR.captures_iter(&normalized).collect();

        anchors
            .iter()
            .enumerate()
            .filter_map(|(i, caps)| {
                // The window ends at the next runner so odds never cross over
                let from = caps.get(0)?.end();
                let to = anchors
                    .get(i + 1)
                    .and_then(|next| next.get(0))
                    .map_or(normalized.len(), |m| m.start());
                let tail = limit_chars(&normalized[from..to], ODDS_REACH);
                Self::try_anchor(caps, tail)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runners_across_lines() {
        let text = "1 BOLD EAGLE\nH5 2700m 4.5\n2 FACE TIME\nM6 2700m 1,8";
        let records = WindowStrategy.extract(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "BOLD EAGLE");
        assert_eq!(records[0].odds, 4.5);
        assert_eq!(records[1].name, "FACE TIME");
        assert_eq!(records[1].odds, 1.8);
    }

    #[test]
    fn test_form_in_gap() {
        let records = WindowStrategy.extract("7 READY CASH 1a 1a 3a 2.1");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].form.as_deref(), Some("1a 1a 3a"));
    }

    #[test]
    fn test_odds_not_above_evens_dropped() {
        let records = WindowStrategy.extract("4 SLOW COACH 1.00");
        assert!(records.is_empty());
    }

    #[test]
    fn test_skips_non_qualifying_decimal() {
        let records = WindowStrategy.extract("4 SLOW COACH 1.00 3.50 5 FAST LANE 2.2");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].number, "4");
        assert_eq!(records[0].odds, 3.5);
        assert_eq!(records[1].name, "FAST LANE");
        assert_eq!(records[1].odds, 2.2);
    }

    #[test]
    fn test_odds_never_taken_from_next_runner() {
        let records = WindowStrategy.extract("1 BOLD EAGLE NP 2 FACE TIME 1.8 3 READY CASH 4.2");
        let numbers: Vec<_> = records.iter().map(|r| r.number.as_str()).collect();
        assert_eq!(numbers, vec!["2", "3"]);
        assert_eq!(records[0].name, "FACE TIME");
        assert_eq!(records[0].odds, 1.8);
    }

    #[test]
    fn test_odds_beyond_reach_ignored() {
        let filler = "x".repeat(ODDS_REACH + 5);
        let text = format!("1 BOLD EAGLE {} 4.5", filler);
        assert!(WindowStrategy.extract(&text).is_empty());
    }

    #[test]
    fn test_mixed_case_names_not_matched() {
        assert!(WindowStrategy.extract("1 Bold Eagle 4.5").is_empty());
    }
}
