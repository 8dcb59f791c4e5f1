//! Closing-order execution with slippage and liquidity handling.

use rust_decimal::Decimal;
use std::sync::Arc;
use stoploss_core::api::OrderGateway;
use stoploss_core::config::TriggerConfig;
use stoploss_core::retry::RetryPolicy;
use stoploss_core::types::{ExecutionOutcome, OrderAckStatus, OrderFill, Position};
use stoploss_core::Error;
use tracing::{info, warn};

/// Configuration for the stop-loss executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Smallest clip worth submitting; below this the position is
    /// abandoned for the cycle.
    pub min_clip_size: Decimal,
    /// Ceiling on clip submissions per position per cycle.
    pub max_attempts_per_cycle: u32,
    /// Venue minimum price tick; limit prices never go below this.
    pub price_tick: Decimal,
    /// Per-clip retry schedule for rejections and timeouts.
    pub retry: RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            min_clip_size: Decimal::ONE,
            max_attempts_per_cycle: 10,
            price_tick: Decimal::new(1, 3), // 0.001
            retry: RetryPolicy::default(),
        }
    }
}

/// Plans and submits closing orders for triggered positions.
///
/// Strategy: try the full size first; when the venue reports partial
/// fill or no liquidity, halve the clip size and keep going until the
/// position is flat, the clip shrinks below the minimum, or the
/// per-cycle attempt cap is reached.
pub struct StopLossExecutor {
    gateway: Arc<dyn OrderGateway>,
    config: ExecutorConfig,
}

impl StopLossExecutor {
    pub fn new(gateway: Arc<dyn OrderGateway>, config: ExecutorConfig) -> Self {
        Self { gateway, config }
    }

    /// Execute the closing order for a triggered position.
    ///
    /// Never fails outright: every failure mode ends up in the returned
    /// outcome with `remaining_size > 0` and `success == false`.
    pub async fn execute(&self, position: &Position, config: &TriggerConfig) -> ExecutionOutcome {
        let trigger_price = position.current_price;

        if config.dry_run {
            info!(
                market = %position.market,
                outcome = %position.outcome,
                size = %position.size,
                trigger_price = %trigger_price,
                "[DRY RUN] Would sell position"
            );
            return ExecutionOutcome::simulated(position.size, trigger_price);
        }

        // Hard price-deviation ceiling relative to the triggering price.
        // Used directly as the limit price so the venue cannot fill
        // below it, clamped to the smallest venue tick.
        let floor_price = (trigger_price * (Decimal::ONE - config.max_slippage))
            .max(self.config.price_tick);

        let mut fills: Vec<OrderFill> = Vec::new();
        let mut remaining = position.size;
        let mut clip = position.size;
        let mut attempts = 0u32;

        while remaining > Decimal::ZERO
            && clip >= self.config.min_clip_size
            && attempts < self.config.max_attempts_per_cycle
        {
            let submit_size = clip.min(remaining);
            attempts += 1;

            let result = self
                .config
                .retry
                .run_if(
                    "submit clip",
                    || {
                        self.gateway.submit_sell(
                            &position.market,
                            &position.token_id,
                            submit_size,
                            floor_price,
                        )
                    },
                    |e| {
                        matches!(
                            e,
                            Error::OrderRejected { .. }
                                | Error::OrderTimeout { .. }
                                | Error::Http(_)
                        )
                    },
                )
                .await;

            match result {
                Ok(ack) => {
                    if let Some(fill_price) = ack.fill_price {
                        if fill_price < floor_price {
                            warn!(
                                market = %position.market,
                                fill_price = %fill_price,
                                floor_price = %floor_price,
                                clip = %submit_size,
                                "Fill price breaches slippage ceiling, rejecting clip"
                            );
                            clip = halve(clip);
                            continue;
                        }
                    }

                    if ack.accepted_size > Decimal::ZERO {
                        remaining -= ack.accepted_size;
                        fills.push(OrderFill::new(
                            ack.fill_price,
                            ack.accepted_size,
                            ack.order_id.clone(),
                        ));
                    }

                    // Partial acceptance means liquidity ran out at this
                    // size; continue with smaller clips.
                    if ack.status == OrderAckStatus::PartiallyFilled {
                        clip = halve(clip);
                    }
                }
                Err(e) => {
                    warn!(
                        market = %position.market,
                        clip = %submit_size,
                        error = %e,
                        "Clip submission failed after retries, reducing clip size"
                    );
                    clip = halve(clip);
                }
            }
        }

        let outcome = ExecutionOutcome::from_fills(position.size, fills, false);
        if outcome.success {
            info!(
                market = %position.market,
                outcome_label = %position.outcome,
                orders_placed = outcome.orders_placed,
                total_size = %outcome.total_size_ordered,
                "Stop-loss fully executed"
            );
        } else {
            warn!(
                market = %position.market,
                outcome_label = %position.outcome,
                attempts,
                total_size = %outcome.total_size_ordered,
                remaining = %outcome.remaining_size,
                "Stop-loss execution incomplete this cycle"
            );
        }
        outcome
    }
}

fn halve(clip: Decimal) -> Decimal {
    clip / Decimal::TWO
}
