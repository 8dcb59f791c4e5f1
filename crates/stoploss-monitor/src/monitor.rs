//! Core stop-loss monitoring loop.

use crate::executor::StopLossExecutor;
use crate::recorder::ExecutionRecorder;
use crate::selection::SelectionStore;
use crate::trigger::{self, TriggerDecision};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stoploss_core::api::PositionSource;
use stoploss_core::config::{MonitoringMode, TriggerConfig, TriggerConfigStore};
use stoploss_core::pricing::SalePrices;
use stoploss_core::types::{ExecutionRecord, Position};
use stoploss_core::Error;
use tracing::{debug, error, info, warn};

/// Outcome of one monitoring cycle, used for the cycle summary log.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub positions_seen: usize,
    pub positions_evaluated: usize,
    pub triggered: usize,
    pub executed: usize,
    pub failures: usize,
}

/// Main stop-loss monitor service.
///
/// Each cycle re-reads the trigger config and selection set from disk,
/// fetches a fresh position snapshot, evaluates triggers, and hands
/// triggered positions to the executor. A failure on one position
/// never prevents the rest of the cycle from running.
pub struct StopLossMonitor {
    source: Arc<dyn PositionSource>,
    executor: StopLossExecutor,
    recorder: ExecutionRecorder,
    config_store: TriggerConfigStore,
    selection: SelectionStore,
    stop: Arc<AtomicBool>,
}

impl StopLossMonitor {
    pub fn new(
        source: Arc<dyn PositionSource>,
        executor: StopLossExecutor,
        recorder: ExecutionRecorder,
        config_store: TriggerConfigStore,
        selection: SelectionStore,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            executor,
            recorder,
            config_store,
            selection,
            stop,
        }
    }

    /// Run the monitoring loop until the stop flag is raised.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        info!("Starting stop-loss monitoring loop");

        while !self.stop.load(Ordering::SeqCst) {
            let config = match self.config_store.load() {
                Ok(config) => config,
                Err(e) => {
                    error!(
                        path = %self.config_store.path().display(),
                        error = %e,
                        "Trigger config unreadable, skipping cycle"
                    );
                    self.sleep_between_cycles(&TriggerConfig::default()).await;
                    continue;
                }
            };

            match self.run_cycle(&config).await {
                Ok(summary) => {
                    info!(
                        positions = summary.positions_seen,
                        evaluated = summary.positions_evaluated,
                        triggered = summary.triggered,
                        executed = summary.executed,
                        failures = summary.failures,
                        dry_run = config.dry_run,
                        "Cycle complete"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Cycle skipped");
                }
            }

            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            self.sleep_between_cycles(&config).await;
        }

        info!("Stop-loss monitoring loop stopped");
        Ok(())
    }

    /// Run one evaluation cycle over a fresh position snapshot.
    pub async fn run_cycle(&mut self, config: &TriggerConfig) -> Result<CycleSummary, Error> {
        let mut summary = CycleSummary::default();

        let positions = self
            .source
            .fetch_positions(config.min_position_value)
            .await?;
        summary.positions_seen = positions.len();

        let total_value: Decimal = positions.iter().map(|p| p.current_value).sum();
        let total_pnl: Decimal = positions.iter().map(|p| p.pnl).sum();

        let eligible = self.eligible_positions(positions, config);
        summary.positions_evaluated = eligible.len();

        info!(
            positions = summary.positions_seen,
            monitored = summary.positions_evaluated,
            total_value = %total_value,
            total_pnl = %total_pnl,
            "Portfolio snapshot"
        );

        for position in &eligible {
            if self.stop.load(Ordering::SeqCst) {
                info!("Stop requested, ending cycle early");
                break;
            }

            let decision = trigger::evaluate(position, config);
            let TriggerDecision::Triggered(reason) = decision else {
                debug!(
                    market = %position.market,
                    pnl_pct = %position.pnl_percentage,
                    "Position within thresholds"
                );
                continue;
            };
            summary.triggered += 1;

            info!(
                market = %position.market,
                outcome = %position.outcome,
                reason = ?reason,
                price = %position.current_price,
                pnl_pct = %position.pnl_percentage,
                "Stop-loss triggered"
            );

            let outcome = self.executor.execute(position, config).await;
            if outcome.success {
                summary.executed += 1;
            } else {
                summary.failures += 1;
            }

            let record = ExecutionRecord::new(position, outcome);
            if let SalePrices::Known { avg, min, max } = record.order_result.sale_prices() {
                info!(
                    market = %position.market,
                    avg_sale_price = %avg,
                    min_sale_price = %min,
                    max_sale_price = %max,
                    "Sale price summary"
                );
            }
            if let Err(e) = self.recorder.record(&record) {
                error!(
                    market = %position.market,
                    error = %e,
                    "Failed to persist execution record"
                );
            }
        }

        Ok(summary)
    }

    /// Apply the monitoring mode filter to the snapshot.
    fn eligible_positions(
        &self,
        positions: Vec<Position>,
        config: &TriggerConfig,
    ) -> Vec<Position> {
        match config.mode {
            MonitoringMode::None => {
                debug!("Monitoring mode is none, nothing to evaluate");
                Vec::new()
            }
            MonitoringMode::All => positions,
            MonitoringMode::Selected => {
                let selected = self.selection.load();
                if selected.is_empty() {
                    warn!(
                        path = %self.selection.path().display(),
                        "Selected mode with an empty selection, nothing to evaluate"
                    );
                    return Vec::new();
                }
                let held: BTreeSet<&str> =
                    positions.iter().map(|p| p.token_id.as_str()).collect();
                for missing in selected.iter().filter(|id| !held.contains(id.as_str())) {
                    warn!(token_id = %missing, "Selected position not found in wallet");
                }
                positions
                    .into_iter()
                    .filter(|p| selected.contains(&p.token_id))
                    .collect()
            }
        }
    }

    /// Sleep until the next cycle, waking early when the stop flag is
    /// raised. The flag is polled once per slice so shutdown never
    /// waits out the full check interval.
    async fn sleep_between_cycles(&self, config: &TriggerConfig) {
        const STOP_POLL_SLICE: Duration = Duration::from_secs(1);

        debug!(secs = config.check_interval_secs, "Sleeping until next cycle");
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(config.check_interval_secs);
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return;
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return;
            }
            tokio::time::sleep(STOP_POLL_SLICE.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutorConfig, StopLossExecutor};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::Mutex;
    use stoploss_core::api::OrderGateway;
    use stoploss_core::types::{OrderAck, OrderAckStatus};
    use stoploss_core::Result;
    use tempfile::TempDir;

    struct StaticSource {
        positions: Vec<Position>,
    }

    #[async_trait]
    impl PositionSource for StaticSource {
        async fn fetch_positions(&self, min_position_value: Decimal) -> Result<Vec<Position>> {
            Ok(self
                .positions
                .iter()
                .filter(|p| p.current_value >= min_position_value)
                .cloned()
                .collect())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl PositionSource for FailingSource {
        async fn fetch_positions(&self, _min_position_value: Decimal) -> Result<Vec<Position>> {
            Err(Error::DataUnavailable("snapshot fetch failed".to_string()))
        }
    }

    struct CountingGateway {
        submissions: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl OrderGateway for CountingGateway {
        async fn submit_sell(
            &self,
            market: &str,
            _outcome_token: &str,
            size: Decimal,
            _limit_price: Decimal,
        ) -> Result<OrderAck> {
            self.submissions.lock().unwrap().push(market.to_string());
            Ok(OrderAck {
                order_id: Some("0xorder".to_string()),
                accepted_size: size,
                fill_price: Some(Decimal::new(40, 2)),
                status: OrderAckStatus::Filled,
            })
        }
    }

    fn losing_position(token_id: &str, market: &str) -> Position {
        Position {
            token_id: token_id.to_string(),
            market: market.to_string(),
            outcome: "Yes".to_string(),
            size: Decimal::new(100, 0),
            current_value: Decimal::new(40, 0),
            current_price: Decimal::new(40, 2),
            initial_value: Decimal::new(80, 0),
            pnl: Decimal::new(-40, 0),
            pnl_percentage: Decimal::new(-50, 0),
        }
    }

    fn healthy_position(token_id: &str, market: &str) -> Position {
        Position {
            pnl: Decimal::new(5, 0),
            pnl_percentage: Decimal::new(10, 0),
            initial_value: Decimal::new(36, 0),
            ..losing_position(token_id, market)
        }
    }

    fn monitor_with(
        dir: &TempDir,
        positions: Vec<Position>,
    ) -> (StopLossMonitor, Arc<CountingGateway>) {
        let gateway = Arc::new(CountingGateway {
            submissions: Mutex::new(Vec::new()),
        });
        let monitor = StopLossMonitor::new(
            Arc::new(StaticSource { positions }),
            StopLossExecutor::new(gateway.clone(), ExecutorConfig::default()),
            ExecutionRecorder::new(dir.path()),
            TriggerConfigStore::new(dir.path().join("trigger_config.json")),
            SelectionStore::new(dir.path().join("selected_positions.json")),
            Arc::new(AtomicBool::new(false)),
        );
        (monitor, gateway)
    }

    fn all_mode_config() -> TriggerConfig {
        TriggerConfig {
            mode: MonitoringMode::All,
            dry_run: false,
            ..TriggerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_none_mode_evaluates_nothing() {
        let dir = TempDir::new().unwrap();
        let (mut monitor, gateway) =
            monitor_with(&dir, vec![losing_position("0xaaa", "Market A")]);
        let config = TriggerConfig {
            dry_run: false,
            ..TriggerConfig::default()
        };

        let summary = monitor.run_cycle(&config).await.unwrap();

        assert_eq!(summary.positions_seen, 1);
        assert_eq!(summary.positions_evaluated, 0);
        assert!(gateway.submissions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_mode_triggers_and_records() {
        let dir = TempDir::new().unwrap();
        let (mut monitor, gateway) = monitor_with(
            &dir,
            vec![
                losing_position("0xaaa", "Market A"),
                healthy_position("0xbbb", "Market B"),
            ],
        );

        let summary = monitor.run_cycle(&all_mode_config()).await.unwrap();

        assert_eq!(summary.positions_evaluated, 2);
        assert_eq!(summary.triggered, 1);
        assert_eq!(summary.executed, 1);
        assert_eq!(summary.failures, 0);
        assert_eq!(*gateway.submissions.lock().unwrap(), vec!["Market A"]);

        let contents = std::fs::read_to_string(monitor.recorder.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
        let record: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap())
            .unwrap();
        assert_eq!(record["position"]["market"], "Market A");
        assert_eq!(record["order_result"]["success"], true);
    }

    #[tokio::test]
    async fn test_selected_mode_filters_by_token_id() {
        let dir = TempDir::new().unwrap();
        let (mut monitor, gateway) = monitor_with(
            &dir,
            vec![
                losing_position("0xaaa", "Market A"),
                losing_position("0xbbb", "Market B"),
            ],
        );
        monitor
            .selection
            .store(&["0xbbb".to_string()].into())
            .unwrap();
        let config = TriggerConfig {
            mode: MonitoringMode::Selected,
            ..all_mode_config()
        };

        let summary = monitor.run_cycle(&config).await.unwrap();

        assert_eq!(summary.positions_evaluated, 1);
        assert_eq!(summary.triggered, 1);
        assert_eq!(*gateway.submissions.lock().unwrap(), vec!["Market B"]);
    }

    #[tokio::test]
    async fn test_selected_mode_empty_selection_is_noop() {
        let dir = TempDir::new().unwrap();
        let (mut monitor, gateway) =
            monitor_with(&dir, vec![losing_position("0xaaa", "Market A")]);
        let config = TriggerConfig {
            mode: MonitoringMode::Selected,
            ..all_mode_config()
        };

        let summary = monitor.run_cycle(&config).await.unwrap();

        assert_eq!(summary.positions_evaluated, 0);
        assert!(gateway.submissions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_failure_skips_cycle() {
        let dir = TempDir::new().unwrap();
        let gateway = Arc::new(CountingGateway {
            submissions: Mutex::new(Vec::new()),
        });
        let mut monitor = StopLossMonitor::new(
            Arc::new(FailingSource),
            StopLossExecutor::new(gateway.clone(), ExecutorConfig::default()),
            ExecutionRecorder::new(dir.path()),
            TriggerConfigStore::new(dir.path().join("trigger_config.json")),
            SelectionStore::new(dir.path().join("selected_positions.json")),
            Arc::new(AtomicBool::new(false)),
        );

        let result = monitor.run_cycle(&all_mode_config()).await;

        assert!(matches!(result, Err(Error::DataUnavailable(_))));
        assert!(gateway.submissions.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_flag_interrupts_the_sleep() {
        let dir = TempDir::new().unwrap();
        let (monitor, _gateway) = monitor_with(&dir, Vec::new());
        let stop = monitor.stop.clone();
        let config = TriggerConfig::default(); // 60 s interval

        let started = tokio::time::Instant::now();
        let sleeper = tokio::spawn(async move {
            monitor.sleep_between_cycles(&config).await;
        });
        tokio::task::yield_now().await;
        stop.store(true, Ordering::SeqCst);
        sleeper.await.unwrap();

        // Woke at the next poll slice, not after the full interval
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_dry_run_records_without_submitting() {
        let dir = TempDir::new().unwrap();
        let (mut monitor, gateway) =
            monitor_with(&dir, vec![losing_position("0xaaa", "Market A")]);
        let config = TriggerConfig {
            mode: MonitoringMode::All,
            ..TriggerConfig::default()
        };

        let summary = monitor.run_cycle(&config).await.unwrap();

        assert_eq!(summary.triggered, 1);
        assert_eq!(summary.executed, 1);
        assert!(gateway.submissions.lock().unwrap().is_empty());

        let contents = std::fs::read_to_string(monitor.recorder.path()).unwrap();
        let record: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(record["order_result"]["simulated"], true);
    }
}
