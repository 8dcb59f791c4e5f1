//! Stop-loss monitoring service for Polymarket positions.
//!
//! Watches a wallet's open positions, evaluates stop-loss triggers
//! against an operator-editable config, and closes losing positions
//! through the CLOB with slippage protection.

pub mod executor;
pub mod monitor;
pub mod recorder;
pub mod selection;
pub mod trigger;
