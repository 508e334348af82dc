//! API route handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::analysis::{AnalysisError, AnalysisParams, Analyzer};
use crate::config::AppConfig;
use crate::learning::{LearningAdjuster, LedgerFilter};
use crate::ledger::Ledger;
use crate::notify::{notify_value_runners, TelegramNotifier};
use crate::session::{Session, SessionError};
use crate::types::{
    AnalyzeRequest, ErrorResponse, HealthResponse, OutcomeRequest, OutcomeResponse, RaceAnalysis,
    SessionResponse, StatsQuery, StatsResponse,
};

/// Application state shared across handlers.
///
/// Handlers that need both locks take `session` before `ledger`.
pub struct AppState {
    pub config: AppConfig,
    pub analyzer: Analyzer,
    pub adjuster: LearningAdjuster,
    pub session: Mutex<Session>,
    pub ledger: Mutex<Box<dyn Ledger>>,
    pub notifier: Option<TelegramNotifier>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        ledger: Box<dyn Ledger>,
        notifier: Option<TelegramNotifier>,
    ) -> Self {
        Self {
            analyzer: Analyzer::new(&config),
            adjuster: LearningAdjuster::new(config.learning.clone()),
            session: Mutex::new(Session::from_config(&config.session)),
            ledger: Mutex::new(ledger),
            notifier,
            config,
        }
    }
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.status.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Analysis endpoint; the result becomes the session's current analysis.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<RaceAnalysis>, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::bad_request("No text provided"));
    }

    let (discipline, track, capital) = {
        let session = state.session.lock().await;
        (
            req.discipline.unwrap_or(session.discipline),
            req.track.or_else(|| session.track.clone()),
            req.capital.unwrap_or(session.bankroll),
        )
    };

    let bucket = {
        let ledger = state.ledger.lock().await;
        let filter = LedgerFilter {
            discipline: Some(discipline),
            track: track.as_deref(),
        };
        state
            .adjuster
            .assess_ledger(&**ledger, filter)
            .map_err(|e| ApiError::internal(format!("Ledger read failed: {:#}", e)))?
            .bucket
    };

    let params = AnalysisParams {
        capital,
        discipline,
        track,
        forms: req.forms,
        bucket,
    };
    let analysis = state.analyzer.analyze_text(&req.text, &params)?;

    // Outcomes can settle against this analysis while alerts are still going out
    state
        .session
        .lock()
        .await
        .record_analysis(analysis.clone());

    if req.notify {
        match &state.notifier {
            Some(notifier) => {
                let race = analysis.track.as_deref().unwrap_or("Race");
                let threshold = state.config.staking.value_threshold;
                notify_value_runners(notifier, race, None, &analysis, threshold).await;
            }
            None => tracing::warn!("Notification requested but the bot is not configured"),
        }
    }

    Ok(Json(analysis))
}

/// Session state endpoint.
pub async fn session(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    let session = state.session.lock().await;
    Json(SessionResponse {
        bankroll: session.bankroll,
        discipline: session.discipline,
        track: session.track.clone(),
        current: session.current.clone(),
    })
}

/// Settle a runner of the current analysis and record it in the ledger.
pub async fn outcomes(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OutcomeRequest>,
) -> Result<Json<OutcomeResponse>, ApiError> {
    let mut session = state.session.lock().await;
    let settlement = session.settle(&req.runner_number, req.won)?;

    let mut ledger = state.ledger.lock().await;
    ledger
        .append(&settlement.ledger_entry_today())
        .map_err(|e| ApiError::internal(format!("Ledger write failed: {:#}", e)))?;

    Ok(Json(OutcomeResponse {
        runner_number: settlement.runner_number,
        won: settlement.won,
        stake: settlement.stake,
        profit: settlement.profit,
        bankroll: settlement.bankroll,
        edge_multiplier: settlement.edge_multiplier,
    }))
}

/// Ledger statistics endpoint.
pub async fn ledger_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, ApiError> {
    let ledger = state.ledger.lock().await;
    let filter = LedgerFilter {
        discipline: query.discipline,
        track: query.track.as_deref(),
    };
    let stats = state
        .adjuster
        .stats(&**ledger, filter)
        .map_err(|e| ApiError::internal(format!("Ledger read failed: {:#}", e)))?;
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SqliteLedger;
    use crate::types::Discipline;
    use axum::routing::post;
    use axum::Router;
    use std::collections::HashMap;
    use std::time::Duration;

    fn test_state() -> Arc<AppState> {
        let ledger = SqliteLedger::in_memory().unwrap();
        Arc::new(AppState::new(AppConfig::default(), Box::new(ledger), None))
    }

    fn analyze_request(text: &str) -> AnalyzeRequest {
        AnalyzeRequest {
            text: text.to_string(),
            capital: None,
            discipline: Some(Discipline::Trot),
            track: Some("Vincennes".to_string()),
            forms: HashMap::new(),
            notify: false,
        }
    }

    const CARD: &str = "1\nBOLD EAGLE\n...\n4.5\n2\nFACE TIME\n...\n1.8";

    #[tokio::test]
    async fn test_health() {
        let Json(health) = health().await;
        assert_eq!(health.status, "ok");
    }

    #[tokio::test]
    async fn test_analyze_sets_current() {
        let state = test_state();
        let Json(analysis) = analyze(State(state.clone()), Json(analyze_request(CARD)))
            .await
            .unwrap();
        assert_eq!(analysis.runners.len(), 2);
        assert_eq!(analysis.capital, 500.0);

        let Json(session) = session(State(state)).await;
        assert_eq!(session.current.unwrap().runners.len(), 2);
    }

    #[tokio::test]
    async fn test_analyze_unrecognized_is_bad_request() {
        let state = test_state();
        let err = analyze(State(state), Json(analyze_request("nothing here")))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("format not recognized"));
    }

    #[tokio::test]
    async fn test_outcome_settles_and_records() {
        let state = test_state();
        analyze(State(state.clone()), Json(analyze_request(CARD)))
            .await
            .unwrap();

        let Json(outcome) = outcomes(
            State(state.clone()),
            Json(OutcomeRequest {
                runner_number: "2".to_string(),
                won: false,
            }),
        )
        .await
        .unwrap();
        assert!((outcome.bankroll - (500.0 - outcome.stake)).abs() < 1e-9);

        let Json(stats) = ledger_stats(State(state), Query(StatsQuery::default()))
            .await
            .unwrap();
        assert_eq!(stats.total_rows, 1);
        assert_eq!(stats.total_wins, 0);
    }

    /// Bot API stand-in that answers after a long pause
    async fn spawn_slow_bot() -> String {
        let app = Router::new().route(
            "/botslow/sendMessage",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                r#"{"ok":true}"#
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_session_usable_while_alerts_send() {
        let base = spawn_slow_bot().await;
        let notifier = TelegramNotifier::new(&base, "slow", "42", Duration::from_secs(10)).unwrap();
        let ledger = SqliteLedger::in_memory().unwrap();
        let state = Arc::new(AppState::new(
            AppConfig::default(),
            Box::new(ledger),
            Some(notifier),
        ));

        let mut request = analyze_request(CARD);
        request.notify = true;
        let pending = tokio::spawn(analyze(State(state.clone()), Json(request)));

        // The analysis is current and settleable before the slow alerts finish
        let settled = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if state.session.lock().await.current.is_some() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            outcomes(
                State(state.clone()),
                Json(OutcomeRequest {
                    runner_number: "2".to_string(),
                    won: true,
                }),
            )
            .await
        })
        .await
        .expect("session stayed locked during notification");
        assert!(settled.unwrap().0.won);

        let Json(analysis) = pending.await.unwrap().unwrap();
        assert_eq!(analysis.runners.len(), 2);
    }

    #[tokio::test]
    async fn test_outcome_unknown_runner() {
        let state = test_state();
        let err = outcomes(
            State(state),
            Json(OutcomeRequest {
                runner_number: "1".to_string(),
                won: true,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
