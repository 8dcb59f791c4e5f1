//! Position snapshot types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A snapshot of one open position, produced fresh each polling cycle.
/// Snapshots are never mutated, only superseded by the next cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Outcome token id, the stable identifier used for selection.
    pub token_id: String,
    /// Human-readable market title.
    pub market: String,
    /// Outcome label (e.g. "Yes"/"No").
    pub outcome: String,
    /// Units held.
    pub size: Decimal,
    /// Current value in quote currency.
    pub current_value: Decimal,
    /// Current per-unit price.
    pub current_price: Decimal,
    /// Entry reference value.
    pub initial_value: Decimal,
    /// Unrealized P&L, absolute.
    pub pnl: Decimal,
    /// Unrealized P&L as a percentage of the entry value.
    pub pnl_percentage: Decimal,
}

impl Position {
    /// Build a snapshot from a raw Data API row.
    ///
    /// The API is permissive: numeric fields may be numbers, strings,
    /// null or missing entirely. Missing and unparseable values are
    /// treated as zero, not as an error. `initialValue` falls back to
    /// the current value, which makes the derived P&L zero.
    ///
    /// Returns `None` only when the row has no usable token id.
    pub fn from_data_api(raw: &Value) -> Option<Self> {
        let token_id = raw.get("asset")?.as_str()?.to_string();
        if token_id.is_empty() {
            return None;
        }

        let market = raw
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Unknown Market")
            .to_string();
        let outcome = raw
            .get("outcome")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();

        let size = decimal_field(raw, "size");
        let current_value = decimal_field(raw, "currentValue");
        let current_price = decimal_field(raw, "curPrice");
        let initial_value = raw
            .get("initialValue")
            .and_then(parse_decimal)
            .unwrap_or(current_value);

        let pnl = current_value - initial_value;
        let pnl_percentage = if initial_value > Decimal::ZERO {
            pnl / initial_value * Decimal::new(100, 0)
        } else {
            Decimal::ZERO
        };

        Some(Self {
            token_id,
            market,
            outcome,
            size,
            current_value,
            current_price,
            initial_value,
            pnl,
            pnl_percentage,
        })
    }

    /// Short display label for logs.
    pub fn display_id(&self) -> String {
        format!("{} ({})", self.market, self.outcome)
    }
}

fn decimal_field(raw: &Value, key: &str) -> Decimal {
    raw.get(key).and_then(parse_decimal).unwrap_or(Decimal::ZERO)
}

/// Parse a JSON value as a decimal, accepting numbers and strings.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
