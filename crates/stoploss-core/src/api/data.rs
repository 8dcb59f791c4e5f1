//! Polymarket Data API client, the read-only position source.

use crate::retry::RetryPolicy;
use crate::types::Position;
use crate::{Error, Result};
use rust_decimal::Decimal;
use std::time::Duration as StdDuration;
use tracing::{debug, warn};

/// Read-only source of position snapshots.
///
/// Implementations perform pure translation into [`Position`] values;
/// all decision logic lives in the caller. Failures surface as
/// [`Error::DataUnavailable`] and must be treated as transient.
#[async_trait::async_trait]
pub trait PositionSource: Send + Sync {
    async fn fetch_positions(&self, min_position_value: Decimal) -> Result<Vec<Position>>;
}

/// Client for the Polymarket Data API `/positions` endpoint.
pub struct DataApiClient {
    base_url: String,
    wallet_address: String,
    http_client: reqwest::Client,
    retry: RetryPolicy,
}

impl DataApiClient {
    /// Page size requested from the API.
    const PAGE_LIMIT: u32 = 100;

    pub fn new(base_url: String, wallet_address: String) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(10))
            .connect_timeout(StdDuration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            base_url,
            wallet_address,
            http_client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_raw(&self, min_position_value: Decimal) -> Result<Vec<serde_json::Value>> {
        let url = format!(
            "{}/positions?user={}&sizeThreshold={}&limit={}&sortDirection=DESC",
            self.base_url, self.wallet_address, min_position_value, Self::PAGE_LIMIT
        );

        let response = self.http_client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Error::DataUnavailable(format!(
                "positions request returned {}",
                response.status()
            )));
        }

        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| Error::DataUnavailable(format!("invalid positions payload: {e}")))?;
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl PositionSource for DataApiClient {
    async fn fetch_positions(&self, min_position_value: Decimal) -> Result<Vec<Position>> {
        let rows = self
            .retry
            .run("fetch positions", || self.fetch_raw(min_position_value))
            .await
            .map_err(|e| match e {
                Error::Http(e) => Error::DataUnavailable(format!("positions request failed: {e}")),
                other => other,
            })?;

        let mut positions = Vec::with_capacity(rows.len());
        for row in &rows {
            match Position::from_data_api(row) {
                // The API already applies sizeThreshold, but re-check:
                // value and size thresholds are not the same thing.
                Some(position) if position.current_value >= min_position_value => {
                    positions.push(position)
                }
                Some(position) => {
                    debug!(
                        token_id = %position.token_id,
                        value = %position.current_value,
                        "Skipping position below minimum value"
                    );
                }
                None => {
                    warn!(row = %row, "Failed to parse position row, skipping");
                }
            }
        }

        debug!(
            total_rows = rows.len(),
            parsed = positions.len(),
            "Fetched positions from Data API"
        );
        Ok(positions)
    }
}
