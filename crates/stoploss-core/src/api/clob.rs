//! Polymarket CLOB order submission gateway.

use crate::types::{extract_fill_price, parse_decimal, OrderAck, OrderAckStatus};
use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration as StdDuration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Order submission interface for closing positions.
///
/// The trading venue protocol itself (matching, settlement, signing) is
/// an external collaborator; implementations only issue sell requests
/// and normalize the result into [`OrderAck`].
#[async_trait::async_trait]
pub trait OrderGateway: Send + Sync {
    /// Submit a sell limit order for one clip.
    async fn submit_sell(
        &self,
        market: &str,
        outcome_token: &str,
        size: Decimal,
        limit_price: Decimal,
    ) -> Result<OrderAck>;
}

#[derive(Debug, Serialize)]
struct SellOrderRequest<'a> {
    client_order_id: Uuid,
    token_id: &'a str,
    side: &'static str,
    price: Decimal,
    size: Decimal,
    order_type: &'static str,
}

/// Gateway posting sell orders to an authenticated CLOB endpoint.
pub struct ClobGateway {
    base_url: String,
    http_client: reqwest::Client,
}

impl ClobGateway {
    /// Bounded submission timeout.
    const SUBMIT_TIMEOUT: StdDuration = StdDuration::from_secs(15);

    pub fn new(base_url: String) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Self::SUBMIT_TIMEOUT)
            .connect_timeout(StdDuration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            base_url,
            http_client,
        }
    }

    /// Normalize a permissive venue response into an [`OrderAck`].
    ///
    /// `submitted_size` bounds the accepted size: venues have been
    /// observed echoing matched sizes in inconsistent fields, so
    /// anything missing means "fully accepted" only when the response
    /// claims success.
    fn normalize_response(response: &Value, submitted_size: Decimal) -> Result<OrderAck> {
        let success = response
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if !success {
            let message = response
                .get("errorMsg")
                .and_then(Value::as_str)
                .unwrap_or("order not accepted")
                .to_string();
            return Err(Error::OrderRejected { message });
        }

        let order_id = response
            .get("orderID")
            .or_else(|| response.get("order_id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let accepted_size = ["sizeMatched", "size_matched", "takingAmount"]
            .iter()
            .find_map(|key| response.get(*key).and_then(parse_decimal))
            .unwrap_or(submitted_size)
            .min(submitted_size);

        let status = if accepted_size >= submitted_size {
            OrderAckStatus::Filled
        } else {
            OrderAckStatus::PartiallyFilled
        };

        Ok(OrderAck {
            order_id,
            accepted_size,
            fill_price: extract_fill_price(response),
            status,
        })
    }
}

#[async_trait::async_trait]
impl OrderGateway for ClobGateway {
    async fn submit_sell(
        &self,
        market: &str,
        outcome_token: &str,
        size: Decimal,
        limit_price: Decimal,
    ) -> Result<OrderAck> {
        let request = SellOrderRequest {
            client_order_id: Uuid::new_v4(),
            token_id: outcome_token,
            side: "SELL",
            price: limit_price,
            size,
            order_type: "GTC",
        };

        debug!(
            market = %market,
            token_id = %outcome_token,
            size = %size,
            limit_price = %limit_price,
            client_order_id = %request.client_order_id,
            "Submitting sell order"
        );

        let start = Instant::now();
        let url = format!("{}/order", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::OrderTimeout {
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    }
                } else {
                    Error::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::OrderRejected {
                message: format!("order endpoint returned {}", status),
            });
        }

        let body: Value = response.json().await?;
        let ack = Self::normalize_response(&body, size)?;

        info!(
            market = %market,
            order_id = ?ack.order_id,
            accepted_size = %ack.accepted_size,
            fill_price = ?ack.fill_price,
            status = ?ack.status,
            "Sell order acknowledged"
        );

        Ok(ack)
    }
}
