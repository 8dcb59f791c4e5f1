//! API clients for external services.

pub mod clob;
pub mod data;

pub use clob::{ClobGateway, OrderGateway};
pub use data::{DataApiClient, PositionSource};
