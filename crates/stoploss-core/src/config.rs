//! Configuration for the stop-loss monitoring system.
//!
//! Two layers: [`AppConfig`] holds process-level settings read once from
//! the environment, while [`TriggerConfig`] is the operator-mutable
//! snapshot persisted to disk and reloaded at the start of every
//! monitoring cycle. The loop itself never mutates either.

use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Minimum allowed check interval in seconds.
pub const MIN_CHECK_INTERVAL_SECS: u64 = 10;

/// Which positions the loop monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringMode {
    /// Monitor nothing until an operator picks a mode.
    None,
    /// Monitor only the persisted selection set.
    Selected,
    /// Monitor every position above the minimum value.
    All,
}

/// Operator-set stop-loss parameters, read by every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Loss percentage that triggers a close (0–100, inclusive boundary).
    pub stop_loss_percentage: Decimal,
    /// Optional absolute price threshold; triggers when the current
    /// price falls to or below it.
    pub stop_loss_price: Option<Decimal>,
    /// Positions worth less than this are never evaluated.
    pub min_position_value: Decimal,
    /// Hard per-clip price deviation ceiling (e.g. 0.05 = 5%).
    pub max_slippage: Decimal,
    /// Polling interval in seconds.
    pub check_interval_secs: u64,
    /// Which positions to monitor.
    pub mode: MonitoringMode,
    /// Simulate executions instead of submitting real orders.
    pub dry_run: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            stop_loss_percentage: Decimal::new(20, 0),
            stop_loss_price: None,
            min_position_value: Decimal::new(1, 1), // $0.10
            max_slippage: Decimal::new(5, 2),       // 5%
            check_interval_secs: 60,
            mode: MonitoringMode::None,
            dry_run: true,
        }
    }
}

impl TriggerConfig {
    /// Validate operator input. Violations are fatal at startup or
    /// change time, never discovered mid-cycle.
    pub fn validate(&self) -> Result<()> {
        if self.stop_loss_percentage <= Decimal::ZERO
            || self.stop_loss_percentage > Decimal::new(100, 0)
        {
            return Err(Error::InvalidConfig(format!(
                "stop_loss_percentage must be in (0, 100], got {}",
                self.stop_loss_percentage
            )));
        }
        if self.check_interval_secs < MIN_CHECK_INTERVAL_SECS {
            return Err(Error::InvalidConfig(format!(
                "check_interval_secs must be at least {}, got {}",
                MIN_CHECK_INTERVAL_SECS, self.check_interval_secs
            )));
        }
        if self.max_slippage < Decimal::ZERO || self.max_slippage >= Decimal::ONE {
            return Err(Error::InvalidConfig(format!(
                "max_slippage must be in [0, 1), got {}",
                self.max_slippage
            )));
        }
        if self.min_position_value < Decimal::ZERO {
            return Err(Error::InvalidConfig(format!(
                "min_position_value must not be negative, got {}",
                self.min_position_value
            )));
        }
        if let Some(price) = self.stop_loss_price {
            if price <= Decimal::ZERO {
                return Err(Error::InvalidConfig(format!(
                    "stop_loss_price must be positive, got {}",
                    price
                )));
            }
        }
        Ok(())
    }
}

/// On-disk snapshot store for [`TriggerConfig`].
///
/// Writes go through a temp file and an atomic rename, so the loop
/// either sees the previous snapshot or the new one, never a torn write.
#[derive(Debug, Clone)]
pub struct TriggerConfigStore {
    path: PathBuf,
}

impl TriggerConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted snapshot, falling back to defaults when the
    /// file does not exist yet.
    pub fn load(&self) -> Result<TriggerConfig> {
        if !self.path.exists() {
            return Ok(TriggerConfig::default());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let config: TriggerConfig = serde_json::from_str(&raw).map_err(|e| {
            Error::InvalidConfig(format!(
                "failed to parse {}: {}",
                self.path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Persist a validated snapshot via atomic replacement.
    pub fn store(&self, config: &TriggerConfig) -> Result<()> {
        config.validate()?;
        let raw = serde_json::to_string_pretty(config)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Process-level configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Polygon wallet address whose positions are monitored.
    pub wallet_address: String,
    /// Polymarket Data API base URL (position source).
    pub data_api_url: String,
    /// Polymarket CLOB base URL (order submission).
    pub clob_api_url: String,
    /// Directory for execution record files.
    pub records_dir: PathBuf,
    /// Path of the persisted trigger config snapshot.
    pub trigger_config_path: PathBuf,
    /// Path of the persisted selection set.
    pub selection_path: PathBuf,
}

impl AppConfig {
    /// Default Data API base URL.
    pub const DEFAULT_DATA_API_URL: &'static str = "https://data-api.polymarket.com";
    /// Default CLOB base URL.
    pub const DEFAULT_CLOB_API_URL: &'static str = "https://clob.polymarket.com";

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let wallet_address = env::var("WALLET_ADDRESS").map_err(|_| {
            Error::InvalidConfig("WALLET_ADDRESS environment variable not set".to_string())
        })?;
        if wallet_address.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "WALLET_ADDRESS must not be empty".to_string(),
            ));
        }

        let data_dir: PathBuf = env::var("STOPLOSS_DATA_DIR")
            .unwrap_or_else(|_| ".".to_string())
            .into();

        Ok(Self {
            wallet_address,
            data_api_url: env::var("POLYMARKET_DATA_API_URL")
                .unwrap_or_else(|_| Self::DEFAULT_DATA_API_URL.to_string()),
            clob_api_url: env::var("POLYMARKET_CLOB_URL")
                .unwrap_or_else(|_| Self::DEFAULT_CLOB_API_URL.to_string()),
            records_dir: data_dir.join("executions"),
            trigger_config_path: data_dir.join("trigger_config.json"),
            selection_path: data_dir.join("selected_positions.json"),
        })
    }
}
