//! Flattens execution record files into a CSV summary.

use std::fs;
use std::path::{Path, PathBuf};
use stoploss_core::pricing::SalePrices;
use stoploss_core::types::ExecutionRecord;
use stoploss_core::{Error, Result};
use tracing::warn;

const CSV_HEADER: &str = "timestamp,market,outcome,size,value,pnl,pnl_percentage,\
orders_placed,total_size_ordered,remaining_size,order_success,\
avg_sale_price,min_sale_price,max_sale_price,file_source";

/// Build the CSV summary over every record file in `records_dir`.
///
/// Files are processed in name order, which matches chronological order
/// for the timestamped filenames the monitor produces. Re-running over
/// the same directory yields byte-identical output.
pub fn summarize_dir(records_dir: &Path) -> Result<String> {
    let mut files: Vec<PathBuf> = fs::read_dir(records_dir)
        .map_err(|e| Error::Persistence(format!("read {}: {e}", records_dir.display())))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("stop_loss_executions_"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');

    for path in files {
        let records = match load_records(&path) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable record file");
                continue;
            }
        };
        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        for record in &records {
            csv.push_str(&summary_row(record, &source));
            csv.push('\n');
        }
    }

    Ok(csv)
}

/// Load a record file: one JSON array or one JSON object per line.
/// Entries that fail to deserialize are skipped individually so one
/// malformed record never hides its neighbours.
fn load_records(path: &Path) -> Result<Vec<ExecutionRecord>> {
    let contents = fs::read_to_string(path)
        .map_err(|e| Error::Persistence(format!("read {}: {e}", path.display())))?;
    let trimmed = contents.trim_start();

    if trimmed.starts_with('[') {
        let entries: Vec<serde_json::Value> = serde_json::from_str(trimmed)?;
        let mut records = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match serde_json::from_value(entry) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        entry = index,
                        error = %e,
                        "Skipping unparseable record entry"
                    );
                }
            }
        }
        return Ok(records);
    }

    let mut records = Vec::new();
    for (index, line) in contents
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
    {
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping unparseable record line"
                );
            }
        }
    }
    Ok(records)
}

fn summary_row(record: &ExecutionRecord, source: &str) -> String {
    let position = &record.position;
    let result = &record.order_result;

    let (avg, min, max) = match result.sale_prices() {
        SalePrices::Absent => (String::new(), String::new(), String::new()),
        SalePrices::NotAvailable => (
            SalePrices::NOT_AVAILABLE.to_string(),
            SalePrices::NOT_AVAILABLE.to_string(),
            SalePrices::NOT_AVAILABLE.to_string(),
        ),
        SalePrices::Known { avg, min, max } => {
            (avg.to_string(), min.to_string(), max.to_string())
        }
    };

    [
        record.timestamp.to_rfc3339(),
        csv_field(&position.market),
        csv_field(&position.outcome),
        position.size.to_string(),
        position.value.to_string(),
        position.pnl.to_string(),
        position.pnl_percentage.to_string(),
        result.orders_placed.to_string(),
        result.total_size_ordered.to_string(),
        result.remaining_size.to_string(),
        result.success.to_string(),
        avg,
        min,
        max,
        csv_field(source),
    ]
    .join(",")
}

/// Market titles can contain commas; swap them so the row stays aligned.
fn csv_field(value: &str) -> String {
    value.replace(',', ";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use stoploss_core::types::{OrderFill, OrderResult, RecordedPosition};
    use tempfile::TempDir;

    fn record(market: &str, fills: Vec<OrderFill>) -> ExecutionRecord {
        let total: Decimal = fills.iter().filter_map(|f| f.size).sum();
        ExecutionRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            position: RecordedPosition {
                market: market.to_string(),
                outcome: "Yes".to_string(),
                size: Decimal::new(100, 0),
                value: Decimal::new(40, 0),
                pnl: Decimal::new(-10, 0),
                pnl_percentage: Decimal::new(-20, 0),
            },
            order_result: OrderResult {
                orders_placed: fills.len() as u32,
                total_size_ordered: total,
                remaining_size: Decimal::new(100, 0) - total,
                success: total == Decimal::new(100, 0),
                simulated: false,
                order_details: fills,
            },
        }
    }

    fn write_jsonl(dir: &Path, name: &str, records: &[ExecutionRecord]) {
        let lines: Vec<String> = records
            .iter()
            .map(|r| serde_json::to_string(r).unwrap())
            .collect();
        fs::write(dir.join(name), lines.join("\n") + "\n").unwrap();
    }

    #[test]
    fn test_header_only_for_empty_dir() {
        let dir = TempDir::new().unwrap();
        let csv = summarize_dir(dir.path()).unwrap();
        assert_eq!(csv, format!("{CSV_HEADER}\n"));
    }

    #[test]
    fn test_rows_flatten_records_with_weighted_prices() {
        let dir = TempDir::new().unwrap();
        let fills = vec![
            OrderFill::new(Some(Decimal::new(10, 0)), Decimal::new(2, 0), None),
            OrderFill::new(Some(Decimal::new(20, 0)), Decimal::new(3, 0), None),
        ];
        write_jsonl(
            dir.path(),
            "stop_loss_executions_20240601_120000.jsonl",
            &[record("Rain tomorrow?", fills)],
        );

        let csv = summarize_dir(dir.path()).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains("Rain tomorrow?"));
        // Size-weighted average of (10 x 2, 20 x 3)
        assert!(row.contains(",16,10,20,"));
        assert!(row.ends_with("stop_loss_executions_20240601_120000.jsonl"));
    }

    #[test]
    fn test_commas_in_market_titles_are_replaced() {
        let dir = TempDir::new().unwrap();
        write_jsonl(
            dir.path(),
            "stop_loss_executions_20240601_120000.jsonl",
            &[record("Trump, Biden, or neither?", vec![])],
        );

        let csv = summarize_dir(dir.path()).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains("Trump; Biden; or neither?"));
        assert_eq!(row.split(',').count(), CSV_HEADER.split(',').count());
    }

    #[test]
    fn test_no_fills_leaves_price_cells_empty() {
        let dir = TempDir::new().unwrap();
        write_jsonl(
            dir.path(),
            "stop_loss_executions_20240601_120000.jsonl",
            &[record("Quiet market", vec![])],
        );

        let csv = summarize_dir(dir.path()).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains(",false,,,,"));
    }

    #[test]
    fn test_unpriced_fills_marked_not_available() {
        let dir = TempDir::new().unwrap();
        let fills = vec![OrderFill::new(None, Decimal::new(100, 0), None)];
        write_jsonl(
            dir.path(),
            "stop_loss_executions_20240601_120000.jsonl",
            &[record("Opaque venue", fills)],
        );

        let csv = summarize_dir(dir.path()).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains(",not-available,not-available,not-available,"));
    }

    #[test]
    fn test_accepts_json_array_files() {
        let dir = TempDir::new().unwrap();
        let records = vec![record("Array file", vec![])];
        fs::write(
            dir.path().join("stop_loss_executions_20240601_110000.json"),
            serde_json::to_string(&records).unwrap(),
        )
        .unwrap();

        let csv = summarize_dir(dir.path()).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.lines().nth(1).unwrap().contains("Array file"));
    }

    #[test]
    fn test_malformed_array_entry_does_not_drop_neighbours() {
        let dir = TempDir::new().unwrap();
        // One complete record next to a truncated failure entry whose
        // order_result is missing most fields.
        let good = serde_json::to_value(record("Good market", vec![])).unwrap();
        let bad = serde_json::json!({
            "timestamp": "2024-06-01T12:00:00Z",
            "position": { "market": "Broken market" },
            "order_result": { "success": false }
        });
        fs::write(
            dir.path().join("stop_loss_executions_20240601_120000.json"),
            serde_json::to_string(&vec![bad, good]).unwrap(),
        )
        .unwrap();

        let csv = summarize_dir(dir.path()).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.lines().nth(1).unwrap().contains("Good market"));
    }

    #[test]
    fn test_files_ordered_by_name_and_output_idempotent() {
        let dir = TempDir::new().unwrap();
        write_jsonl(
            dir.path(),
            "stop_loss_executions_20240602_090000.jsonl",
            &[record("Later run", vec![])],
        );
        write_jsonl(
            dir.path(),
            "stop_loss_executions_20240601_090000.jsonl",
            &[record("Earlier run", vec![])],
        );

        let first = summarize_dir(dir.path()).unwrap();
        let second = summarize_dir(dir.path()).unwrap();
        assert_eq!(first, second);

        let rows: Vec<&str> = first.lines().skip(1).collect();
        assert!(rows[0].contains("Earlier run"));
        assert!(rows[1].contains("Later run"));
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("stop_loss_executions_20240601_120000.jsonl"),
            "not json at all\n",
        )
        .unwrap();
        write_jsonl(
            dir.path(),
            "stop_loss_executions_20240602_120000.jsonl",
            &[record("Good file", vec![])],
        );

        let csv = summarize_dir(dir.path()).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.lines().nth(1).unwrap().contains("Good file"));
    }
}
