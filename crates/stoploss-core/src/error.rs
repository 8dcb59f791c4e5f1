//! Error types for the stop-loss monitoring system.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Position source could not be reached or returned garbage.
    /// Transient: callers skip the current cycle and retry on the next.
    #[error("position data unavailable: {0}")]
    DataUnavailable(String),

    /// Configuration rejected at startup or change time. Fatal.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Venue rejected an order submission.
    #[error("order rejected: {message}")]
    OrderRejected { message: String },

    /// Order submission did not complete within the bounded timeout.
    #[error("order timed out after {elapsed_ms}ms")]
    OrderTimeout { elapsed_ms: u64 },

    /// A fill price could not be parsed from the venue response.
    /// Non-fatal: the affected price fields become `not-available`.
    #[error("price extraction failed: {0}")]
    PriceExtraction(String),

    /// Writing an execution record failed. The record is lost but
    /// monitoring continues.
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether retrying the same operation can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::DataUnavailable(_)
                | Error::OrderTimeout { .. }
                | Error::Http(_)
        )
    }
}
