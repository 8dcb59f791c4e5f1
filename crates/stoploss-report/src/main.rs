//! Stop-Loss Report
//!
//! Flattens execution record files into a CSV summary for analysis.

mod summary;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "stoploss-report", about = "Summarize stop-loss execution records")]
struct Args {
    /// Directory containing execution record files
    #[arg(long, default_value = "executions")]
    records_dir: PathBuf,

    /// Output CSV path; writes to stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stoploss_report=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let csv = summary::summarize_dir(&args.records_dir).with_context(|| {
        format!(
            "summarizing records in {}",
            args.records_dir.display()
        )
    })?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, &csv)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(
                path = %path.display(),
                rows = csv.lines().count().saturating_sub(1),
                "Summary written"
            );
        }
        None => print!("{csv}"),
    }

    Ok(())
}
