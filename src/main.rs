//! TurfMaster
//!
//! Race-card value finder: extracts runners from pasted text or race pages,
//! estimates an edge per runner and suggests fractional Kelly stakes.

mod analysis;
mod cli;
mod config;
mod extractor;
mod learning;
mod ledger;
mod notify;
mod retry;
mod routes;
mod scan;
mod session;
mod staking;
mod types;

use axum::{routing::get, routing::post, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::ledger::open_ledger;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so JSON output on stdout stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turfmaster=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => run_server(host, port).await,
        Commands::Analyze {
            input,
            capital,
            discipline,
            track,
            forms,
            format,
            value_only,
            notify,
        } => {
            cli::run_analyze(
                input, capital, discipline, track, forms, format, value_only, notify,
            )
            .await
        }
        Commands::Scan {
            urls,
            urls_file,
            capital,
            discipline,
            track,
            format,
            no_notify,
        } => {
            cli::run_scan_command(urls, urls_file, capital, discipline, track, format, no_notify)
                .await
        }
        Commands::Record {
            runner,
            won,
            discipline,
            track,
            multiplier,
            date,
        } => cli::run_record(runner, won, discipline, track, multiplier, date).await,
        Commands::Stats {
            discipline,
            track,
            format,
        } => cli::run_stats(discipline, track, format).await,
        Commands::ResetLedger { yes } => cli::run_reset_ledger(yes).await,
    }
}

/// Run the API server.
async fn run_server(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    // Load configuration
    let mut config = AppConfig::load()?;

    // Override with CLI args
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    tracing::info!("Configuration loaded");

    let ledger = open_ledger(&config.ledger)?;
    tracing::info!(
        "Ledger: {} at {}",
        ledger.backend(),
        config.ledger.resolved_path()
    );

    let notifier = cli::notifier_from_config(&config);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    // Create application state
    let state = Arc::new(AppState::new(config, ledger, notifier));

    // Build router
    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/analyze", post(routes::analyze))
        .route("/session", get(routes::session))
        .route("/outcomes", post(routes::outcomes))
        .route("/ledger/stats", get(routes::ledger_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
