//! Configuration for TurfMaster.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::types::Discipline;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Base edge multiplier per discipline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisciplineMultipliers {
    #[serde(default = "default_flat_multiplier")]
    pub flat: f64,
    #[serde(default = "default_trot_multiplier")]
    pub trot: f64,
    #[serde(default = "default_mounted_trot_multiplier")]
    pub mounted_trot: f64,
    #[serde(default = "default_obstacle_multiplier")]
    pub obstacle: f64,
}

fn default_flat_multiplier() -> f64 {
    1.12
}

fn default_trot_multiplier() -> f64 {
    1.15
}

fn default_mounted_trot_multiplier() -> f64 {
    1.13
}

fn default_obstacle_multiplier() -> f64 {
    1.05
}

impl Default for DisciplineMultipliers {
    fn default() -> Self {
        Self {
            flat: default_flat_multiplier(),
            trot: default_trot_multiplier(),
            mounted_trot: default_mounted_trot_multiplier(),
            obstacle: default_obstacle_multiplier(),
        }
    }
}

impl DisciplineMultipliers {
    pub fn for_discipline(&self, discipline: Discipline) -> f64 {
        match discipline {
            Discipline::Flat => self.flat,
            Discipline::Trot => self.trot,
            Discipline::MountedTrot => self.mounted_trot,
            Discipline::Obstacle => self.obstacle,
        }
    }
}

/// Kelly fraction applied up to (and including) `max_odds`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KellyBand {
    pub max_odds: f64,
    pub fraction: f64,
}

/// Staking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingConfig {
    /// Hard ceiling on a single stake, as a fraction of capital
    #[serde(default = "default_max_stake_fraction")]
    pub max_stake_fraction: f64,
    /// Edge index from which a runner is flagged as strong value and alerted
    #[serde(default = "default_value_threshold")]
    pub value_threshold: f64,
    /// Logarithmic damping of the multiplier as odds grow (0 disables)
    #[serde(default = "default_volatility_damping")]
    pub volatility_damping: f64,
    #[serde(default = "default_max_probability")]
    pub max_probability: f64,
    #[serde(default)]
    pub multipliers: DisciplineMultipliers,
    /// Bands sorted by ascending `max_odds`
    #[serde(default = "default_kelly_bands")]
    pub kelly_bands: Vec<KellyBand>,
    /// Fraction used above the last band
    #[serde(default = "default_tail_fraction")]
    pub tail_fraction: f64,
}

fn default_max_stake_fraction() -> f64 {
    0.05
}

fn default_value_threshold() -> f64 {
    1.10
}

fn default_volatility_damping() -> f64 {
    0.05
}

fn default_max_probability() -> f64 {
    0.99
}

fn default_kelly_bands() -> Vec<KellyBand> {
    vec![
        KellyBand {
            max_odds: 3.0,
            fraction: 0.25,
        },
        KellyBand {
            max_odds: 6.0,
            fraction: 0.20,
        },
        KellyBand {
            max_odds: 12.0,
            fraction: 0.15,
        },
    ]
}

fn default_tail_fraction() -> f64 {
    0.10
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            max_stake_fraction: default_max_stake_fraction(),
            value_threshold: default_value_threshold(),
            volatility_damping: default_volatility_damping(),
            max_probability: default_max_probability(),
            multipliers: DisciplineMultipliers::default(),
            kelly_bands: default_kelly_bands(),
            tail_fraction: default_tail_fraction(),
        }
    }
}

impl StakingConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_stake_fraction > 0.0 && self.max_stake_fraction <= 1.0,
            "staking.max_stake_fraction must be in (0, 1], got {}",
            self.max_stake_fraction
        );
        ensure!(
            self.max_probability > 0.0 && self.max_probability <= 1.0,
            "staking.max_probability must be in (0, 1], got {}",
            self.max_probability
        );
        ensure!(
            self.value_threshold.is_finite() && self.value_threshold > 0.0,
            "staking.value_threshold must be positive, got {}",
            self.value_threshold
        );
        ensure!(
            self.volatility_damping.is_finite() && self.volatility_damping >= 0.0,
            "staking.volatility_damping must be non-negative, got {}",
            self.volatility_damping
        );

        let m = &self.multipliers;
        for (name, value) in [
            ("flat", m.flat),
            ("trot", m.trot),
            ("mounted_trot", m.mounted_trot),
            ("obstacle", m.obstacle),
        ] {
            ensure!(
                value.is_finite() && value > 0.0,
                "staking.multipliers.{} must be positive, got {}",
                name,
                value
            );
        }

        for band in &self.kelly_bands {
            ensure!(
                band.max_odds > 1.0,
                "staking.kelly_bands: max_odds must be above 1, got {}",
                band.max_odds
            );
            ensure!(
                (0.0..=1.0).contains(&band.fraction),
                "staking.kelly_bands: fraction must be in [0, 1], got {}",
                band.fraction
            );
        }
        ensure!(
            self.kelly_bands.windows(2).all(|w| w[0].max_odds < w[1].max_odds),
            "staking.kelly_bands must be sorted by ascending max_odds"
        );
        ensure!(
            (0.0..=1.0).contains(&self.tail_fraction),
            "staking.tail_fraction must be in [0, 1], got {}",
            self.tail_fraction
        );
        Ok(())
    }
}

/// Learning (trailing win-rate) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Trailing rows considered, clamped to 5..=20
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_optimistic_threshold")]
    pub optimistic_threshold: f64,
    #[serde(default = "default_cautious_threshold")]
    pub cautious_threshold: f64,
    #[serde(default = "default_optimistic_offset")]
    pub optimistic_offset: f64,
    #[serde(default = "default_cautious_offset")]
    pub cautious_offset: f64,
}

fn default_window() -> usize {
    10
}

fn default_optimistic_threshold() -> f64 {
    0.35
}

fn default_cautious_threshold() -> f64 {
    0.15
}

fn default_optimistic_offset() -> f64 {
    0.05
}

fn default_cautious_offset() -> f64 {
    -0.07
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            optimistic_threshold: default_optimistic_threshold(),
            cautious_threshold: default_cautious_threshold(),
            optimistic_offset: default_optimistic_offset(),
            cautious_offset: default_cautious_offset(),
        }
    }
}

impl LearningConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.cautious_threshold)
                && (0.0..=1.0).contains(&self.optimistic_threshold)
                && self.cautious_threshold <= self.optimistic_threshold,
            "learning thresholds must satisfy 0 <= cautious ({}) <= optimistic ({}) <= 1",
            self.cautious_threshold,
            self.optimistic_threshold
        );
        ensure!(
            self.optimistic_offset.is_finite() && self.cautious_offset.is_finite(),
            "learning offsets must be finite"
        );
        Ok(())
    }
}

/// Ledger storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    #[default]
    Sqlite,
    Csv,
}

/// Ledger configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub backend: LedgerBackend,
    /// File path; defaults depend on the backend
    #[serde(default)]
    pub path: Option<String>,
}

impl LedgerConfig {
    pub fn resolved_path(&self) -> String {
        match (&self.path, self.backend) {
            (Some(path), _) => path.clone(),
            (None, LedgerBackend::Sqlite) => "data/ledger.sqlite".to_string(),
            (None, LedgerBackend::Csv) => "data/ledger.csv".to_string(),
        }
    }
}

/// Messaging bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token: None,
            chat_id: None,
        }
    }
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Floor on the spacing between two requests
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: f64,
    /// Retries of a page after a transient failure
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("turfmaster/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_requests_per_minute() -> u32 {
    30
}

fn default_min_interval_secs() -> f64 {
    0.5
}

fn default_retries() -> u32 {
    2
}

fn default_retry_base_ms() -> u64 {
    250
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            requests_per_minute: default_requests_per_minute(),
            min_interval_secs: default_min_interval_secs(),
            retries: default_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

impl HttpConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.requests_per_minute > 0,
            "http.requests_per_minute must be positive"
        );
        ensure!(
            self.min_interval_secs.is_finite() && self.min_interval_secs >= 0.0,
            "http.min_interval_secs must be a non-negative number of seconds, got {}",
            self.min_interval_secs
        );
        Ok(())
    }
}

/// Defaults for a new session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_capital")]
    pub capital: f64,
    #[serde(default)]
    pub discipline: Discipline,
    #[serde(default)]
    pub track: Option<String>,
}

fn default_capital() -> f64 {
    500.0
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capital: default_capital(),
            discipline: Discipline::default(),
            track: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub staking: StakingConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from defaults, an optional config file and environment
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // turfmaster.toml / .yaml / .json if present
            .add_source(config::File::with_name("turfmaster").required(false))
            // TURF_SESSION__CAPITAL, TURF_NOTIFY__CHAT_ID, ...
            .add_source(
                config::Environment::with_prefix("TURF")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the staking and pacing code cannot work with
    pub fn validate(&self) -> Result<()> {
        self.staking.validate()?;
        self.learning.validate()?;
        self.http.validate()?;
        Ok(())
    }
}
