//! CLI commands for turfmaster.
//!
//! Supports card analysis, race-day scans, ledger maintenance and API server mode.

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;

use crate::analysis::{AnalysisParams, Analyzer};
use crate::config::AppConfig;
use crate::extractor::normalize_number;
use crate::learning::{EdgeBucket, LearningAdjuster, LedgerFilter};
use crate::ledger::{open_ledger, Ledger, LedgerEntry};
use crate::notify::{notify_value_runners, NetworkError, TelegramNotifier};
use crate::scan::{run_scan, PageFetcher, ScanSummary};
use crate::types::{Discipline, RaceAnalysis, StatsResponse};

#[derive(Parser)]
#[command(name = "turfmaster")]
#[command(version, about = "TurfMaster: race-card value finder and staking assistant", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a pasted race card
    Analyze {
        /// Text file with the pasted card ("-" or nothing for stdin)
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,

        /// Capital to stake from
        #[arg(short, long)]
        capital: Option<f64>,

        /// Discipline (flat, trot, mounted-trot, obstacle)
        #[arg(short, long)]
        discipline: Option<Discipline>,

        /// Racecourse, used to filter the ledger
        #[arg(short, long)]
        track: Option<String>,

        /// Form override, repeatable
        #[arg(long = "form", value_name = "NUMBER=MUSIQUE", value_parser = parse_form)]
        forms: Vec<(String, String)>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Only show runners worth a bet
        #[arg(long)]
        value_only: bool,

        /// Push value runners to the messaging bot
        #[arg(long)]
        notify: bool,
    },

    /// Fetch race pages and analyze each card
    Scan {
        /// Race page URLs
        #[arg(value_name = "URL")]
        urls: Vec<String>,

        /// File with one URL per line
        #[arg(long)]
        urls_file: Option<PathBuf>,

        /// Capital to stake from
        #[arg(short, long)]
        capital: Option<f64>,

        /// Discipline (flat, trot, mounted-trot, obstacle)
        #[arg(short, long)]
        discipline: Option<Discipline>,

        /// Racecourse, used to filter the ledger
        #[arg(short, long)]
        track: Option<String>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Do not push value alerts
        #[arg(long)]
        no_notify: bool,
    },

    /// Append an outcome to the learning ledger
    Record {
        /// Runner number
        #[arg(short, long)]
        runner: String,

        /// The runner won (omit for a loss)
        #[arg(long)]
        won: bool,

        /// Discipline (flat, trot, mounted-trot, obstacle)
        #[arg(short, long)]
        discipline: Option<Discipline>,

        /// Racecourse
        #[arg(short, long)]
        track: Option<String>,

        /// Edge multiplier used (defaults to the discipline's base)
        #[arg(short, long)]
        multiplier: Option<f64>,

        /// Race date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Trailing win-rate and edge bucket
    Stats {
        /// Discipline filter
        #[arg(short, long)]
        discipline: Option<Discipline>,

        /// Racecourse filter
        #[arg(short, long)]
        track: Option<String>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Delete every ledger row
    ResetLedger {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Parse a `NUMBER=MUSIQUE` form override
fn parse_form(raw: &str) -> Result<(String, String), String> {
    let (number, form) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NUMBER=MUSIQUE, got '{}'", raw))?;
    let number = number.trim();
    if number.is_empty() || form.trim().is_empty() {
        return Err(format!("expected NUMBER=MUSIQUE, got '{}'", raw));
    }
    Ok((number.to_string(), form.trim().to_string()))
}

/// Read the card from a file, or stdin for `-` / no file
fn read_input(input: Option<PathBuf>) -> anyhow::Result<String> {
    match input {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

/// Edge bucket from the ledger for a discipline/track
fn ledger_bucket(
    config: &AppConfig,
    ledger: &dyn Ledger,
    discipline: Discipline,
    track: Option<&str>,
) -> anyhow::Result<EdgeBucket> {
    let adjuster = LearningAdjuster::new(config.learning.clone());
    let filter = LedgerFilter {
        discipline: Some(discipline),
        track,
    };
    Ok(adjuster.assess_ledger(ledger, filter)?.bucket)
}

/// Notifier from config; `None` (logged) when unavailable
pub fn notifier_from_config(config: &AppConfig) -> Option<TelegramNotifier> {
    match TelegramNotifier::from_config(&config.notify, &config.http) {
        Ok(notifier) => Some(notifier),
        Err(NetworkError::NotConfigured) => {
            tracing::info!("Messaging bot not configured, alerts disabled");
            None
        }
        Err(e) => {
            tracing::warn!("Messaging bot unavailable: {}", e);
            None
        }
    }
}

/// Run card analysis from a file or stdin.
#[allow(clippy::too_many_arguments)]
pub async fn run_analyze(
    input: Option<PathBuf>,
    capital: Option<f64>,
    discipline: Option<Discipline>,
    track: Option<String>,
    forms: Vec<(String, String)>,
    format: String,
    value_only: bool,
    notify: bool,
) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let text = read_input(input)?;

    let discipline = discipline.unwrap_or(config.session.discipline);
    let track = track.or_else(|| config.session.track.clone());

    let ledger = open_ledger(&config.ledger)?;
    let bucket = ledger_bucket(&config, &*ledger, discipline, track.as_deref())?;

    let params = AnalysisParams {
        capital: capital.unwrap_or(config.session.capital),
        discipline,
        track,
        forms: forms.into_iter().collect::<HashMap<_, _>>(),
        bucket,
    };

    let analyzer = Analyzer::new(&config);
    let mut analysis = analyzer.analyze_text(&text, &params)?;

    if notify {
        if let Some(notifier) = notifier_from_config(&config) {
            let race = analysis.track.clone().unwrap_or_else(|| "Race".to_string());
            let sent = notify_value_runners(
                &notifier,
                &race,
                None,
                &analysis,
                config.staking.value_threshold,
            )
            .await;
            eprintln!("Alerts sent: {}", sent);
        }
    }

    if value_only {
        analysis.runners.retain(|r| r.recommendation.is_bet());
    }

    match format.as_str() {
        "table" => print_card(&analysis),
        "json" => println!("{}", serde_json::to_string_pretty(&analysis)?),
        _ => {
            eprintln!("Unknown format: {}. Using table.", format);
            print_card(&analysis);
        }
    }

    Ok(())
}

/// Gather scan URLs from arguments and an optional file
fn collect_urls(mut urls: Vec<String>, urls_file: Option<PathBuf>) -> anyhow::Result<Vec<String>> {
    if let Some(path) = urls_file {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        urls.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string),
        );
    }
    Ok(urls)
}

/// Run a race-day scan.
#[allow(clippy::too_many_arguments)]
pub async fn run_scan_command(
    urls: Vec<String>,
    urls_file: Option<PathBuf>,
    capital: Option<f64>,
    discipline: Option<Discipline>,
    track: Option<String>,
    format: String,
    no_notify: bool,
) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let urls = collect_urls(urls, urls_file)?;
    if urls.is_empty() {
        bail!("No URL given (pass URLs or --urls-file)");
    }

    let discipline = discipline.unwrap_or(config.session.discipline);
    let track = track.or_else(|| config.session.track.clone());

    let ledger = open_ledger(&config.ledger)?;
    let bucket = ledger_bucket(&config, &*ledger, discipline, track.as_deref())?;

    let params = AnalysisParams {
        capital: capital.unwrap_or(config.session.capital),
        discipline,
        track,
        forms: HashMap::new(),
        bucket,
    };

    let analyzer = Analyzer::new(&config);
    let fetcher = PageFetcher::from_config(&config.http)?;
    let notifier = if no_notify {
        None
    } else {
        notifier_from_config(&config)
    };

    eprintln!("Scanning {} races...", urls.len());
    let summary = run_scan(&fetcher, &analyzer, &urls, &params, notifier.as_ref()).await;

    match format.as_str() {
        "json" => print_scan_json(&summary)?,
        "table" => print_scan(&summary),
        _ => {
            eprintln!("Unknown format: {}. Using table.", format);
            print_scan(&summary);
        }
    }

    if summary.reports.is_empty() {
        bail!("No race could be analyzed");
    }
    Ok(())
}

/// Append one outcome row.
pub async fn run_record(
    runner: String,
    won: bool,
    discipline: Option<Discipline>,
    track: Option<String>,
    multiplier: Option<f64>,
    date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let entry = record_entry(&config, &runner, won, discipline, track, multiplier, date)?;

    let mut ledger = open_ledger(&config.ledger)?;
    ledger.append(&entry)?;

    eprintln!(
        "Recorded runner {} ({}) in the {} ledger",
        entry.runner_number,
        if entry.won { "won" } else { "lost" },
        ledger.backend()
    );
    Ok(())
}

/// Ledger row for a manually recorded outcome, session defaults filling gaps
fn record_entry(
    config: &AppConfig,
    runner: &str,
    won: bool,
    discipline: Option<Discipline>,
    track: Option<String>,
    multiplier: Option<f64>,
    date: Option<NaiveDate>,
) -> anyhow::Result<LedgerEntry> {
    // Same form the analysis and settlement paths store: "07" is runner 7
    let Some(runner_number) = normalize_number(runner) else {
        bail!("Invalid runner number '{}': expected digits", runner);
    };
    let discipline = discipline.unwrap_or(config.session.discipline);

    Ok(LedgerEntry {
        date: date.unwrap_or_else(|| Local::now().date_naive()),
        discipline,
        track: track
            .or_else(|| config.session.track.clone())
            .unwrap_or_default(),
        runner_number,
        won,
        edge_multiplier: multiplier
            .unwrap_or_else(|| config.staking.multipliers.for_discipline(discipline)),
    })
}

/// Show ledger statistics.
pub async fn run_stats(
    discipline: Option<Discipline>,
    track: Option<String>,
    format: String,
) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let ledger = open_ledger(&config.ledger)?;
    let adjuster = LearningAdjuster::new(config.learning.clone());

    let filter = LedgerFilter {
        discipline,
        track: track.as_deref(),
    };
    let stats = adjuster.stats(&*ledger, filter)?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&stats)?),
        _ => print_stats(&stats),
    }
    Ok(())
}

/// Reset the ledger.
pub async fn run_reset_ledger(yes: bool) -> anyhow::Result<()> {
    if !yes {
        bail!("Refusing to reset the ledger without --yes");
    }

    let config = AppConfig::load()?;
    let mut ledger = open_ledger(&config.ledger)?;
    ledger.reset()?;

    eprintln!(
        "Ledger reset ({} at {})",
        ledger.backend(),
        config.ledger.resolved_path()
    );
    Ok(())
}

/// Print an analysis as a text card
fn print_card(analysis: &RaceAnalysis) {
    println!(
        "Discipline: {} | Track: {} | Capital: {:.2}",
        analysis.discipline,
        analysis.track.as_deref().unwrap_or("-"),
        analysis.capital
    );
    println!(
        "Edge multiplier: {:.3} ({}) | Strategy: {}",
        analysis.edge_multiplier,
        analysis.bucket.name(),
        analysis.strategy
    );
    println!();

    println!(
        "  {:>3}  {:<24} {:>6} {:>6} {:>6} {:>7} {:>8}  {}",
        "#", "Runner", "Odds", "Prob", "Edge", "Podium", "Stake", "Label"
    );
    for r in &analysis.runners {
        println!(
            "  {:>3}  {:<24} {:>6.2} {:>5.1}% {:>6.3} {:>6.1}% {:>8.2}  {}",
            r.runner.number,
            truncate(&r.runner.name, 24),
            r.runner.odds,
            r.estimated_probability * 100.0,
            r.edge_index,
            r.podium_confidence * 100.0,
            r.suggested_stake,
            r.recommendation
        );
        if let Some(form) = &r.runner.form {
            println!("       form: {}", form);
        }
    }
    println!();
    println!("Total suggested stake: {:.2}", analysis.total_stake());
}

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        name.to_string()
    } else {
        name.chars().take(width - 1).chain(std::iter::once('…')).collect()
    }
}

fn print_scan(summary: &ScanSummary) {
    for report in &summary.reports {
        println!(
            "=== {} ({}) ===",
            report.race,
            report.start_time.as_deref().unwrap_or("time unknown")
        );
        print_card(&report.analysis);
        println!();
    }

    for failure in &summary.failures {
        println!("!!! {}: {:#}", failure.url, failure.error);
    }

    eprintln!(
        "Scanned {} races, {} failed, {} alerts sent",
        summary.reports.len(),
        summary.failures.len(),
        summary.alerts_sent
    );
}

fn print_scan_json(summary: &ScanSummary) -> anyhow::Result<()> {
    let failures: Vec<_> = summary
        .failures
        .iter()
        .map(|f| serde_json::json!({ "url": f.url, "error": format!("{:#}", f.error) }))
        .collect();
    let output = serde_json::json!({
        "races": summary.reports,
        "failures": failures,
        "alerts_sent": summary.alerts_sent,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_stats(stats: &StatsResponse) {
    println!("=== Learning ledger ===");
    println!(
        "  Recent:   {}/{} wins (window {})",
        stats.recent_wins, stats.recent_rows, stats.window
    );
    match stats.recent_win_rate {
        Some(rate) => println!("  Win rate: {:.1}%", rate * 100.0),
        None => println!("  Win rate: -"),
    }
    println!(
        "  Bucket:   {} ({:+.2})",
        stats.bucket.name(),
        stats.edge_offset
    );
    println!(
        "  Overall:  {}/{} wins, hit rate {:.1}%",
        stats.total_wins,
        stats.total_rows,
        stats.hit_rate * 100.0
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_form() {
        assert_eq!(
            parse_form("3=1a 2a Da").unwrap(),
            ("3".to_string(), "1a 2a Da".to_string())
        );
        assert!(parse_form("3").is_err());
        assert!(parse_form("=1a").is_err());
    }

    #[test]
    fn test_cli_parses_analyze() {
        let cli = Cli::try_parse_from([
            "turfmaster",
            "analyze",
            "card.txt",
            "--capital",
            "200",
            "--discipline",
            "attele",
            "--form",
            "1=1a 1a",
            "--value-only",
        ])
        .unwrap();

        match cli.command {
            Commands::Analyze {
                input,
                capital,
                discipline,
                forms,
                value_only,
                ..
            } => {
                assert_eq!(input, Some(PathBuf::from("card.txt")));
                assert_eq!(capital, Some(200.0));
                assert_eq!(discipline, Some(Discipline::Trot));
                assert_eq!(forms, vec![("1".to_string(), "1a 1a".to_string())]);
                assert!(value_only);
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_collect_urls_from_file() {
        let path = std::env::temp_dir().join(format!("turfmaster-urls-{}.txt", std::process::id()));
        std::fs::write(&path, "# today\nhttps://a/b/c\n\n  https://d/e/f  \n").unwrap();

        let urls = collect_urls(vec!["https://x/y/z".to_string()], Some(path.clone())).unwrap();
        assert_eq!(urls, vec!["https://x/y/z", "https://a/b/c", "https://d/e/f"]);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_record_entry_normalizes_runner() {
        let config = AppConfig::default();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1);
        let entry = record_entry(&config, "07", true, None, Some("Vincennes".into()), None, date)
            .unwrap();
        assert_eq!(entry.runner_number, "7");
        assert_eq!(entry.track, "Vincennes");
        assert_eq!(entry.edge_multiplier, 1.12);
    }

    #[test]
    fn test_record_entry_rejects_bad_runner() {
        let config = AppConfig::default();
        assert!(record_entry(&config, "x", false, None, None, None, None).is_err());
        assert!(record_entry(&config, "00", false, None, None, None, None).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("BOLD EAGLE", 24), "BOLD EAGLE");
        assert_eq!(truncate("ABCDEFGH", 5), "ABCD…");
    }
}
