//! Stop-Loss Monitor
//!
//! Continuous protection for Polymarket positions: sells out of
//! positions whose loss crosses the configured thresholds.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stoploss_core::api::{ClobGateway, DataApiClient};
use stoploss_core::config::{AppConfig, MonitoringMode, TriggerConfigStore};
use stoploss_monitor::executor::{ExecutorConfig, StopLossExecutor};
use stoploss_monitor::monitor::StopLossMonitor;
use stoploss_monitor::recorder::ExecutionRecorder;
use stoploss_monitor::selection::SelectionStore;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stoploss_monitor=info,stoploss_core=info,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Stop-Loss Monitor");

    let app_config = AppConfig::from_env().context("loading environment configuration")?;

    let config_store = TriggerConfigStore::new(&app_config.trigger_config_path);
    let trigger_config = config_store
        .load()
        .context("loading trigger configuration")?;
    // Write the effective config back so a fresh deployment gets an
    // editable file with the defaults filled in.
    config_store
        .store(&trigger_config)
        .context("persisting trigger configuration")?;

    let selection = SelectionStore::new(&app_config.selection_path);
    if trigger_config.mode == MonitoringMode::Selected && selection.load().is_empty() {
        anyhow::bail!(
            "selected mode is configured but {} holds no selected positions",
            selection.path().display()
        );
    }

    info!(
        wallet = %app_config.wallet_address,
        mode = ?trigger_config.mode,
        dry_run = trigger_config.dry_run,
        stop_loss_pct = %trigger_config.stop_loss_percentage,
        stop_loss_price = ?trigger_config.stop_loss_price,
        interval_secs = trigger_config.check_interval_secs,
        "Monitor configured"
    );
    if trigger_config.dry_run {
        info!("DRY RUN mode: triggered sells are simulated, no orders are placed");
    }

    let source = Arc::new(DataApiClient::new(
        app_config.data_api_url.clone(),
        app_config.wallet_address.clone(),
    ));
    let gateway = Arc::new(ClobGateway::new(app_config.clob_api_url.clone()));
    let executor = StopLossExecutor::new(gateway, ExecutorConfig::default());
    let recorder = ExecutionRecorder::new(&app_config.records_dir);

    let stop = Arc::new(AtomicBool::new(false));
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested, finishing current cycle");
            ctrl_c_stop.store(true, Ordering::SeqCst);
        }
    });

    let mut monitor = StopLossMonitor::new(
        source,
        executor,
        recorder,
        config_store,
        selection,
        stop,
    );
    monitor.run().await?;

    Ok(())
}
