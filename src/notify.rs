//! Value alerts pushed to a Telegram bot.

use std::time::Duration;

use crate::config::{HttpConfig, NotifyConfig};
use crate::types::{RaceAnalysis, RunnerAnalysis};

/// Outbound call failure
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("messaging bot is not configured (token and chat id required)")]
    NotConfigured,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
}

/// Telegram `sendMessage` client
pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(
        api_base: &str,
        token: &str,
        chat_id: &str,
        timeout: Duration,
    ) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), token),
            chat_id: chat_id.to_string(),
        })
    }

    /// Build from configuration; both token and chat id must be set.
    pub fn from_config(notify: &NotifyConfig, http: &HttpConfig) -> Result<Self, NetworkError> {
        match (notify.token.as_deref(), notify.chat_id.as_deref()) {
            (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => Self::new(
                &notify.api_base,
                token,
                chat_id,
                Duration::from_secs(http.timeout_secs),
            ),
            _ => Err(NetworkError::NotConfigured),
        }
    }

    /// Send one Markdown message
    pub async fn send(&self, text: &str) -> Result<(), NetworkError> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[
                ("chat_id", self.chat_id.as_str()),
                ("text", text),
                ("parse_mode", "Markdown"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Alert text for a value runner
pub fn value_alert_message(race: &str, start: Option<&str>, runner: &RunnerAnalysis) -> String {
    format!(
        "🏇 *VALUE ALERT*\n\
         Race: {}\n\
         Start: {}\n\
         Runner: {} {}\n\
         Odds: {:.2}\n\
         Value: {:.2}\n\
         Stake: {:.2} €",
        race,
        start.unwrap_or("-"),
        runner.runner.number,
        runner.runner.name,
        runner.runner.odds,
        runner.edge_index,
        runner.suggested_stake
    )
}

/// Push every value runner of `analysis`; returns how many alerts went out.
///
/// Failures are logged and do not stop the remaining alerts.
pub async fn notify_value_runners(
    notifier: &TelegramNotifier,
    race: &str,
    start: Option<&str>,
    analysis: &RaceAnalysis,
    threshold: f64,
) -> usize {
    let mut sent = 0;
    for runner in analysis.value_runners(threshold) {
        let message = value_alert_message(race, start, runner);
        match notifier.send(&message).await {
            Ok(()) => sent += 1,
            Err(e) => tracing::warn!(
                "Alert for runner {} ({}) not sent: {}",
                runner.runner.number,
                race,
                e
            ),
        }
    }
    sent
}
