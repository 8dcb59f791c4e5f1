//! Order and execution record types.

use crate::types::position::{parse_decimal, Position};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Venue-reported status of one submitted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAckStatus {
    /// Accepted for the full submitted size.
    Filled,
    /// Accepted for part of the submitted size (insufficient liquidity).
    PartiallyFilled,
    /// Not accepted at all.
    Rejected,
}

/// Normalized acknowledgement for one order submission.
///
/// Venue responses are permissive JSON; the gateway normalizes them into
/// this shape once, at the ingestion boundary.
#[derive(Debug, Clone)]
pub struct OrderAck {
    /// Venue order reference, when one was assigned.
    pub order_id: Option<String>,
    /// Size the venue accepted (zero on rejection).
    pub accepted_size: Decimal,
    /// Reported fill price; `None` when extraction failed.
    pub fill_price: Option<Decimal>,
    pub status: OrderAckStatus,
}

/// One partial or full execution of the closing order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFill {
    /// Fill price; `None` when the venue response had no parseable price.
    pub price: Option<Decimal>,
    /// Filled size; `None` when unknown.
    pub size: Option<Decimal>,
    /// Originating order reference.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub order_id: Option<String>,
}

impl OrderFill {
    pub fn new(price: Option<Decimal>, size: Decimal, order_id: Option<String>) -> Self {
        Self {
            price,
            size: Some(size),
            order_id,
        }
    }
}

/// Aggregated result of one trigger-and-close attempt.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub orders_placed: u32,
    pub total_size_ordered: Decimal,
    pub remaining_size: Decimal,
    pub success: bool,
    /// True for dry-run outcomes with no real submission.
    pub simulated: bool,
    pub fills: Vec<OrderFill>,
}

impl ExecutionOutcome {
    /// Aggregate fills against the position size at trigger time.
    ///
    /// Maintains `total_size_ordered + remaining_size == position_size`
    /// and `success == (remaining_size == 0)`.
    pub fn from_fills(position_size: Decimal, fills: Vec<OrderFill>, simulated: bool) -> Self {
        let total_size_ordered: Decimal =
            fills.iter().filter_map(|f| f.size).sum();
        let remaining_size = position_size - total_size_ordered;
        Self {
            orders_placed: fills.len() as u32,
            total_size_ordered,
            remaining_size,
            success: remaining_size == Decimal::ZERO,
            simulated,
            fills,
        }
    }

    /// A dry-run outcome: the full size "sold" at the trigger price.
    pub fn simulated(position_size: Decimal, trigger_price: Decimal) -> Self {
        let fill = OrderFill {
            price: Some(trigger_price),
            size: Some(position_size),
            order_id: None,
        };
        Self::from_fills(position_size, vec![fill], true)
    }
}

/// Position snapshot embedded in an execution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedPosition {
    pub market: String,
    pub outcome: String,
    pub size: Decimal,
    pub value: Decimal,
    pub pnl: Decimal,
    pub pnl_percentage: Decimal,
}

impl From<&Position> for RecordedPosition {
    fn from(position: &Position) -> Self {
        Self {
            market: position.market.clone(),
            outcome: position.outcome.clone(),
            size: position.size,
            value: position.current_value,
            pnl: position.pnl,
            pnl_percentage: position.pnl_percentage,
        }
    }
}

/// Order result section of an execution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub orders_placed: u32,
    pub total_size_ordered: Decimal,
    pub remaining_size: Decimal,
    pub success: bool,
    #[serde(default)]
    pub simulated: bool,
    pub order_details: Vec<OrderFill>,
}

impl OrderResult {
    /// Sale price statistics over the recorded fills, shared between
    /// live execution logging and offline reporting.
    pub fn sale_prices(&self) -> crate::pricing::SalePrices {
        crate::pricing::aggregate_sale_prices(&self.order_details)
    }
}

impl From<ExecutionOutcome> for OrderResult {
    fn from(outcome: ExecutionOutcome) -> Self {
        Self {
            orders_placed: outcome.orders_placed,
            total_size_ordered: outcome.total_size_ordered,
            remaining_size: outcome.remaining_size,
            success: outcome.success,
            simulated: outcome.simulated,
            order_details: outcome.fills,
        }
    }
}

/// Immutable audit entry for one trigger-and-close attempt.
/// Appended to the execution record store, never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub timestamp: DateTime<Utc>,
    pub position: RecordedPosition,
    pub order_result: OrderResult,
}

impl ExecutionRecord {
    pub fn new(position: &Position, outcome: ExecutionOutcome) -> Self {
        Self {
            timestamp: Utc::now(),
            position: position.into(),
            order_result: outcome.into(),
        }
    }
}

/// Extract a fill price from a permissive venue response.
///
/// Accepts a bare number or numeric string, a `price`/`fillPrice` field,
/// or the same fields nested one level under a `result` object, all
/// shapes observed in practice. Returns `None` when nothing parses.
pub fn extract_fill_price(value: &Value) -> Option<Decimal> {
    if let Some(price) = parse_decimal(value) {
        return Some(price);
    }
    let obj = value.as_object()?;
    for key in ["price", "fillPrice", "fill_price", "avgPrice"] {
        if let Some(price) = obj.get(key).and_then(parse_decimal) {
            return Some(price);
        }
    }
    obj.get("result").and_then(extract_fill_price)
}
