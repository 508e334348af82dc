//! Race-day scan: fetch race pages, analyze each card, alert on value.

pub mod fetcher;
pub mod rate_limiter;

pub use fetcher::PageFetcher;

use anyhow::Result;
use serde::Serialize;

use crate::analysis::{AnalysisParams, Analyzer};
use crate::extractor::{page::start_time, page_text};
use crate::notify::{notify_value_runners, TelegramNotifier};
use crate::types::RaceAnalysis;

/// One analyzed race page
#[derive(Debug, Clone, Serialize)]
pub struct RaceReport {
    pub url: String,
    pub race: String,
    pub start_time: Option<String>,
    pub analysis: RaceAnalysis,
}

/// A page that could not be analyzed
#[derive(Debug)]
pub struct ScanFailure {
    pub url: String,
    pub error: anyhow::Error,
}

/// Outcome of a whole scan, in URL order
#[derive(Debug, Default)]
pub struct ScanSummary {
    pub reports: Vec<RaceReport>,
    pub failures: Vec<ScanFailure>,
    pub alerts_sent: usize,
}

/// Race name from the second-to-last path segment of its URL.
///
/// `.../prix-de-vincennes/partants` gives "Prix De Vincennes".
pub fn race_name_from_url(url: &str) -> String {
    let segments: Vec<&str> = url.split('/').collect();
    let slug = if segments.len() >= 2 {
        segments[segments.len() - 2]
    } else {
        url
    };
    title_case(&slug.replace('-', " "))
}

/// Uppercase the first letter of each alphabetic run, lowercase the rest
fn title_case(text: &str) -> String {
    let mut in_word = false;
    text.chars()
        .flat_map(|c| {
            let out: Vec<char> = if !c.is_alphabetic() {
                vec![c]
            } else if in_word {
                c.to_lowercase().collect()
            } else {
                c.to_uppercase().collect()
            };
            in_word = c.is_alphabetic();
            out
        })
        .collect()
}

/// Fetch and analyze one race page
pub async fn scan_race(
    fetcher: &PageFetcher,
    analyzer: &Analyzer,
    url: &str,
    params: &AnalysisParams,
) -> Result<RaceReport> {
    let html = fetcher.fetch(url).await?;
    let text = page_text(&html);
    let analysis = analyzer.analyze_text(&text, params)?;

    Ok(RaceReport {
        url: url.to_string(),
        race: race_name_from_url(url),
        start_time: start_time(&text),
        analysis,
    })
}

/// Scan every URL; a failing page is recorded and the scan moves on.
pub async fn run_scan(
    fetcher: &PageFetcher,
    analyzer: &Analyzer,
    urls: &[String],
    params: &AnalysisParams,
    notifier: Option<&TelegramNotifier>,
) -> ScanSummary {
    let threshold = analyzer.staking_config().value_threshold;
    let mut summary = ScanSummary::default();

    for (i, url) in urls.iter().enumerate() {
        tracing::info!("[{}/{}] Scanning {}", i + 1, urls.len(), url);

        match scan_race(fetcher, analyzer, url, params).await {
            Ok(report) => {
                if let Some(notifier) = notifier {
                    summary.alerts_sent += notify_value_runners(
                        notifier,
                        &report.race,
                        report.start_time.as_deref(),
                        &report.analysis,
                        threshold,
                    )
                    .await;
                }
                summary.reports.push(report);
            }
            Err(error) => {
                tracing::warn!("Skipping {}: {:#}", url, error);
                summary.failures.push(ScanFailure {
                    url: url.clone(),
                    error,
                });
            }
        }
    }

    summary
}
