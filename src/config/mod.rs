use crate::onchain::keys::OwnerKey;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub hint: HintConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Account endpoint base URL - env ARENA_LEDGER_URL
    #[serde(default = "default_ledger_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HintConfig {
    /// Battle bot base URL - env ARENA_HINT_URL. Empty disables the hint.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_hint_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Battle poll cadence in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Where ledger probing starts when no hint is available.
    #[serde(default = "default_starting_battle_id")]
    pub starting_battle_id: u64,
    /// Max battle ids probed per discovery attempt.
    #[serde(default = "default_probe_window")]
    pub probe_window: u64,
    /// Also look for `id + 1` on the ledger when a finished battle has no hinted successor.
    #[serde(default = "default_true")]
    pub probe_successor: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retries for rate-limited reads.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay; doubles per retry.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Owner public key, 64 hex chars - env ARENA_WALLET. Empty disables the winnings scan.
    #[serde(default)]
    pub owner: String,
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
    /// How many battles back the winnings scan looks.
    #[serde(default = "default_lookback")]
    pub lookback: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_ledger_url() -> String {
    "http://127.0.0.1:8899".to_string()
}
fn default_hint_timeout_ms() -> u64 {
    5000
}
fn default_poll_interval_ms() -> u64 {
    5000
}
fn default_starting_battle_id() -> u64 {
    1
}
fn default_probe_window() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_max_retries() -> u32 {
    2
}
fn default_initial_delay_ms() -> u64 {
    2000
}
fn default_max_events() -> usize {
    50
}
fn default_max_age_secs() -> u64 {
    15
}
fn default_scan_interval_ms() -> u64 {
    20_000
}
fn default_lookback() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            url: default_ledger_url(),
        }
    }
}

impl Default for HintConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_ms: default_hint_timeout_ms(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            starting_battle_id: default_starting_battle_id(),
            probe_window: default_probe_window(),
            probe_successor: true,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            scan_interval_ms: default_scan_interval_ms(),
            lookback: default_lookback(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl HintConfig {
    pub fn enabled(&self) -> bool {
        !self.url.trim().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl RetryConfig {
    pub fn policy(&self) -> crate::retry::RetryPolicy {
        crate::retry::RetryPolicy::new(self.max_retries, Duration::from_millis(self.initial_delay_ms))
    }
}

impl LogConfig {
    pub fn build(&self) -> crate::battle::EventLog {
        crate::battle::EventLog::new(self.max_events, Duration::from_secs(self.max_age_secs))
    }
}

impl WalletConfig {
    /// `Ok(None)` when no wallet is configured.
    pub fn owner_key(&self) -> Result<Option<OwnerKey>, ConfigError> {
        if self.owner.trim().is_empty() {
            return Ok(None);
        }
        self.owner
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::Invalid(format!("wallet.owner: {e}")))
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            hint: HintConfig::default(),
            tracker: TrackerConfig::default(),
            retry: RetryConfig::default(),
            log: LogConfig::default(),
            wallet: WalletConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment variables (no file needed).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("ARENA_LEDGER_URL") {
            self.ledger.url = url;
        }
        if let Ok(url) = std::env::var("ARENA_HINT_URL") {
            self.hint.url = url;
        }
        if let Ok(owner) = std::env::var("ARENA_WALLET") {
            self.wallet.owner = owner;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.url.trim().is_empty() {
            return Err(ConfigError::Invalid("ledger.url is empty".into()));
        }
        if self.tracker.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("tracker.poll_interval_ms must be > 0".into()));
        }
        if self.log.max_events == 0 {
            return Err(ConfigError::Invalid("log.max_events must be > 0".into()));
        }
        self.wallet.owner_key()?;
        Ok(())
    }
}
