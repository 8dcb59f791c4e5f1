//! Stop-Loss Core Library
//!
//! Shared types, configuration, retry policy, price aggregation, and API
//! clients for the Polymarket stop-loss bot.

pub mod api;
pub mod config;
pub mod error;
pub mod pricing;
pub mod retry;
pub mod types;

pub use error::{Error, Result};
