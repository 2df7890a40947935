//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Posting rules.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Background reconciliation job.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Posting rules shared by every producer of journal entries.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Fixed-point decimal places every amount must fit into.
    #[serde(default = "default_amount_scale")]
    pub amount_scale: u32,
    /// Prefix of generated entry numbers (`JE-2024/03/000042`).
    #[serde(default = "default_entry_number_prefix")]
    pub entry_number_prefix: String,
    /// Deepest chart-of-accounts level accepted by hierarchy validation.
    #[serde(default = "default_max_depth")]
    pub max_account_depth: usize,
}

fn default_amount_scale() -> u32 {
    2
}

fn default_entry_number_prefix() -> String {
    "JE".to_string()
}

fn default_max_depth() -> usize {
    6
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            amount_scale: default_amount_scale(),
            entry_number_prefix: default_entry_number_prefix(),
            max_account_depth: default_max_depth(),
        }
    }
}

/// Background reconciliation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    /// Seconds between two sweeps.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Run a single sweep and exit.
    #[serde(default)]
    pub run_once: bool,
}

fn default_interval_secs() -> u64 {
    300 // 5 minutes
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            run_once: false,
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("SALDO").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
