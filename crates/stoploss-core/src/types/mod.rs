//! Core domain types.

pub mod order;
pub mod position;

pub use order::{
    extract_fill_price, ExecutionOutcome, ExecutionRecord, OrderAck, OrderAckStatus, OrderFill,
    OrderResult, RecordedPosition,
};
pub use position::{parse_decimal, Position};
