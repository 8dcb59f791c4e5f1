//! Stop-loss trigger evaluation.

use serde::{Deserialize, Serialize};
use stoploss_core::config::TriggerConfig;
use stoploss_core::types::Position;

/// Why a position triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// Current price fell to or below the absolute threshold.
    PriceThreshold,
    /// Loss percentage reached the configured stop (inclusive).
    PercentageThreshold,
}

/// Outcome of evaluating one position against the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    Triggered(TriggerReason),
    NotTriggered,
}

impl TriggerDecision {
    pub fn is_triggered(&self) -> bool {
        matches!(self, TriggerDecision::Triggered(_))
    }
}

/// Decide whether a position's stop-loss condition is met.
///
/// Pure and deterministic. Precedence:
/// 1. positions below the minimum value are ignored entirely, whatever
///    their P&L, since small positions are noise;
/// 2. the absolute price threshold, when set;
/// 3. the percentage stop, with an inclusive boundary: a loss exactly
///    equal to the threshold triggers.
pub fn evaluate(position: &Position, config: &TriggerConfig) -> TriggerDecision {
    if position.current_value < config.min_position_value {
        return TriggerDecision::NotTriggered;
    }

    if let Some(threshold) = config.stop_loss_price {
        if position.current_price <= threshold {
            return TriggerDecision::Triggered(TriggerReason::PriceThreshold);
        }
    }

    if position.pnl_percentage <= -config.stop_loss_percentage {
        return TriggerDecision::Triggered(TriggerReason::PercentageThreshold);
    }

    TriggerDecision::NotTriggered
}
