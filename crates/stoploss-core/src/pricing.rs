//! Sale price aggregation shared by live recording and offline reports.

use crate::types::OrderFill;
use rust_decimal::Decimal;

/// Aggregated sale price statistics for a fill list.
///
/// Three cases are kept distinct: no fills at all, fills whose prices
/// could not be parsed, and fills with usable prices. The first renders
/// as absent fields downstream, the second as a `not-available`
/// sentinel. "No execution" is not the same thing as "executed at an
/// unknown price".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SalePrices {
    /// No fills at all; avg/min/max are absent, not zero.
    Absent,
    /// Fills exist but none carried a parseable price.
    NotAvailable,
    Known {
        avg: Decimal,
        min: Decimal,
        max: Decimal,
    },
}

impl SalePrices {
    /// Sentinel printed for unparseable prices.
    pub const NOT_AVAILABLE: &'static str = "not-available";
}

/// Aggregate sale prices over a fill list.
///
/// When every priced fill also has a known size and the sizes sum to a
/// positive total, the average is size-weighted; otherwise it falls back
/// to the unweighted arithmetic mean of the prices. Min/max always range
/// over the parseable prices.
pub fn aggregate_sale_prices(fills: &[OrderFill]) -> SalePrices {
    if fills.is_empty() {
        return SalePrices::Absent;
    }

    let priced: Vec<(Decimal, Option<Decimal>)> = fills
        .iter()
        .filter_map(|f| f.price.map(|p| (p, f.size)))
        .collect();
    let (Some(min), Some(max)) = (
        priced.iter().map(|(p, _)| *p).min(),
        priced.iter().map(|(p, _)| *p).max(),
    ) else {
        return SalePrices::NotAvailable;
    };

    let prices: Vec<Decimal> = priced.iter().map(|(p, _)| *p).collect();
    let sizes: Option<Vec<Decimal>> = priced.iter().map(|(_, s)| *s).collect();
    let avg = match sizes {
        Some(sizes) if sizes.iter().copied().sum::<Decimal>() > Decimal::ZERO => {
            let total: Decimal = sizes.iter().copied().sum();
            let weighted: Decimal = prices
                .iter()
                .zip(sizes.iter())
                .map(|(p, s)| *p * *s)
                .sum();
            weighted / total
        }
        _ => {
            let sum: Decimal = prices.iter().copied().sum();
            sum / Decimal::from(prices.len() as u64)
        }
    };

    SalePrices::Known { avg, min, max }
}
