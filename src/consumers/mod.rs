//! Active consumers.
//!
//! - `RescueConsumer`: forwards payloads missing a required field to a
//!   secondary queue
//! - `LogConsumer`: logs events drained from a queue

pub mod log;
pub mod rescue;

pub use log::LogConsumer;
pub use rescue::{
    BatchReport, RecordOutcome, RescueConsumer, RescueError, RescueRecord, DEFAULT_REQUIRED_FIELD,
    RESCUE_CONSUMER_NAME,
};
