//! Configuration Loader
//!
//! Loads and validates the watcher configuration from a TOML file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::application::monitor::{
    MonitorConfig, DEFAULT_MAX_DETAIL_MISSES, DEFAULT_MAX_SIGNATURES_PER_POLL,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_TIMEOUT_SECS,
};
use crate::application::executor::{DEFAULT_PAPER_PRICE, DEFAULT_PRICE_TIMEOUT};
use crate::domain::{
    ClassifierConfig, GuardrailConfig, TrackedAccount, DEFAULT_MONITOR_STATE_FILE,
    DEFAULT_PORTFOLIO_FILE, DEFAULT_SEEN_CAPACITY,
};
use crate::strategy::{self, Strategy, StrategyConfig};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub accounts: Vec<TrackedAccount>,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub guardrails: GuardrailConfig,
    #[serde(default)]
    pub paper: PaperSection,
    #[serde(default)]
    pub strategies: Vec<StrategyEntry>,
    pub solana: SolanaSection,
    #[serde(default)]
    pub jupiter: JupiterSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Polling configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,
    pub max_signatures_per_poll: usize,
    pub seen_capacity: usize,
    /// Classify history found on the very first poll instead of treating it as baseline
    pub classify_on_first_poll: bool,
    /// Polls a missing transaction detail is retried before it is skipped
    pub max_detail_misses: u32,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            max_signatures_per_poll: DEFAULT_MAX_SIGNATURES_PER_POLL,
            seen_capacity: DEFAULT_SEEN_CAPACITY,
            classify_on_first_poll: false,
            max_detail_misses: DEFAULT_MAX_DETAIL_MISSES,
        }
    }
}

impl MonitorSection {
    pub fn to_monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            poll_timeout: Duration::from_secs(self.poll_timeout_secs),
            max_signatures_per_poll: self.max_signatures_per_poll,
            seen_capacity: self.seen_capacity,
            classify_on_first_poll: self.classify_on_first_poll,
            max_detail_misses: self.max_detail_misses,
        }
    }
}

/// Paper trading section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaperSection {
    /// Cash (SOL) a fresh portfolio starts with
    pub starting_balance: f64,
    /// Fill price when no lookup or hint is available
    pub default_price: f64,
    pub price_timeout_ms: u64,
    /// Directory for the portfolio and monitor state files
    pub data_dir: String,
}

impl Default for PaperSection {
    fn default() -> Self {
        Self {
            starting_balance: 10.0,
            default_price: DEFAULT_PAPER_PRICE,
            price_timeout_ms: DEFAULT_PRICE_TIMEOUT.as_millis() as u64,
            data_dir: "data".to_string(),
        }
    }
}

impl PaperSection {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).to_string())
    }

    pub fn portfolio_path(&self) -> PathBuf {
        self.data_dir().join(DEFAULT_PORTFOLIO_FILE)
    }

    pub fn monitor_state_path(&self) -> PathBuf {
        self.data_dir().join(DEFAULT_MONITOR_STATE_FILE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    CopyBuy,
    WhaleInflow,
}

/// One `[[strategies]]` table
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyEntry {
    pub kind: StrategyKind,
    pub name: String,
    /// SOL spent per triggered buy
    pub sol_amount: f64,
    /// copy_buy: restrict to these accounts (empty = all)
    #[serde(default)]
    pub accounts: Vec<String>,
    /// whale_inflow: asset to buy
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub max_amount: Option<f64>,
    #[serde(default)]
    pub min_alert_amount: Option<f64>,
    #[serde(default)]
    pub active_hours_utc: Option<(u32, u32)>,
}

impl StrategyEntry {
    pub fn to_strategy(&self) -> Result<Strategy, ConfigError> {
        let strategy = match self.kind {
            StrategyKind::CopyBuy => {
                strategy::copy_buy(self.name.clone(), self.sol_amount, self.accounts.clone())
            }
            StrategyKind::WhaleInflow => {
                let asset_id = self.asset_id.clone().ok_or_else(|| {
                    ConfigError::ValidationError(format!(
                        "strategy '{}': whale_inflow requires asset_id",
                        self.name
                    ))
                })?;
                strategy::whale_inflow(
                    self.name.clone(),
                    asset_id,
                    self.symbol.clone(),
                    self.sol_amount,
                )
            }
        };

        Ok(strategy.with_config(StrategyConfig {
            max_amount: self.max_amount,
            min_alert_amount: self.min_alert_amount,
            active_hours_utc: self.active_hours_utc,
        }))
    }
}

/// Solana RPC configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct SolanaSection {
    pub rpc_url: String,
    /// Wallet keypair path (NEVER commit this file!)
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

fn default_keypair_path() -> String {
    "~/.config/solana/id.json".to_string()
}

impl SolanaSection {
    /// RPC URL, `SOLANA_RPC_URL` taking precedence
    pub fn get_rpc_url(&self) -> String {
        std::env::var("SOLANA_RPC_URL").unwrap_or_else(|_| self.rpc_url.clone())
    }

    /// Keypair path with `SOLANA_KEYPAIR_PATH` taking precedence and `~` expanded
    pub fn get_keypair_path(&self) -> String {
        let raw = std::env::var("SOLANA_KEYPAIR_PATH").unwrap_or_else(|_| self.keypair_path.clone());
        shellexpand::tilde(&raw).to_string()
    }
}

/// Jupiter API configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JupiterSection {
    pub api_url: String,
    pub api_key: Option<String>,
    /// Slippage tolerance in basis points
    pub slippage_bps: u16,
    pub priority_fee_lamports: Option<u64>,
}

impl Default for JupiterSection {
    fn default() -> Self {
        Self {
            api_url: "https://api.jup.ag/swap/v1".to_string(),
            api_key: None,
            slippage_bps: 100,
            priority_fee_lamports: None,
        }
    }
}

impl JupiterSection {
    /// Get API key with environment variable fallback
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var("JUPITER_API_KEY").ok()
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

fn is_solana_address(address: &str) -> bool {
    bs58::decode(address)
        .into_vec()
        .map(|bytes| bytes.len() == 32)
        .unwrap_or(false)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

        if self.monitor.poll_interval_secs == 0 {
            return invalid("poll_interval_secs must be > 0".to_string());
        }
        if self.monitor.poll_timeout_secs == 0 {
            return invalid("poll_timeout_secs must be > 0".to_string());
        }
        if self.monitor.max_signatures_per_poll == 0 || self.monitor.seen_capacity == 0 {
            return invalid("max_signatures_per_poll and seen_capacity must be > 0".to_string());
        }
        if self.monitor.max_detail_misses == 0 {
            return invalid("max_detail_misses must be > 0".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for account in &self.accounts {
            if !is_solana_address(&account.address) {
                return invalid(format!(
                    "account '{}' has invalid address {}",
                    account.name, account.address
                ));
            }
            if !seen.insert(account.address.as_str()) {
                return invalid(format!("duplicate account address {}", account.address));
            }
        }

        if self.classifier.large_transfer_threshold <= 0.0 {
            return invalid(format!(
                "large_transfer_threshold must be > 0, got {}",
                self.classifier.large_transfer_threshold
            ));
        }

        let g = &self.guardrails;
        if g.max_trade_amount <= 0.0 || g.daily_volume_cap <= 0.0 || g.min_reserve_balance < 0.0 {
            return invalid(format!(
                "guardrails must be positive (max_trade_amount {}, daily_volume_cap {}, min_reserve_balance {})",
                g.max_trade_amount, g.daily_volume_cap, g.min_reserve_balance
            ));
        }

        if self.paper.starting_balance < 0.0 {
            return invalid(format!(
                "starting_balance must be >= 0, got {}",
                self.paper.starting_balance
            ));
        }
        if self.paper.default_price <= 0.0 {
            return invalid(format!(
                "default_price must be > 0, got {}",
                self.paper.default_price
            ));
        }

        let mut names = std::collections::HashSet::new();
        for entry in &self.strategies {
            if !names.insert(entry.name.as_str()) {
                return invalid(format!("duplicate strategy name '{}'", entry.name));
            }
            if entry.sol_amount <= 0.0 {
                return invalid(format!(
                    "strategy '{}': sol_amount must be > 0, got {}",
                    entry.name, entry.sol_amount
                ));
            }
            if let Some((start, end)) = entry.active_hours_utc {
                if start > 23 || end > 24 {
                    return invalid(format!(
                        "strategy '{}': active_hours_utc out of range",
                        entry.name
                    ));
                }
            }
            if entry.kind == StrategyKind::WhaleInflow {
                match &entry.asset_id {
                    Some(asset) if is_solana_address(asset) => {}
                    _ => {
                        return invalid(format!(
                            "strategy '{}': whale_inflow requires a valid asset_id",
                            entry.name
                        ))
                    }
                }
            }
        }

        if self.solana.rpc_url.is_empty() {
            return invalid("rpc_url cannot be empty".to_string());
        }

        Ok(())
    }

    /// Strategies in declaration order
    pub fn build_strategies(&self) -> Result<Vec<Strategy>, ConfigError> {
        self.strategies.iter().map(StrategyEntry::to_strategy).collect()
    }
}
