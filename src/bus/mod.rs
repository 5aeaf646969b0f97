//! Delivery plumbing.
//!
//! This module contains:
//! - `Destination` trait: where the router delivers matched events
//! - `EventHandler` trait: active consumers invoked with an event
//! - `DurableQueue` trait and implementations (memory, mock, SQS)
//! - `Topic`: in-process stand-in for the pub/sub broker
//! - `QueuePoller`: drains a queue into a handler

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::event::Event;

pub mod destination;
pub mod mock;
pub mod poller;
pub mod queue;
#[cfg(feature = "sns-sqs")]
pub mod sns_sqs;
pub mod topic;

pub use destination::{ConsumerDestination, QueueDestination, DEFAULT_CONSUMER_TIMEOUT};
pub use mock::MockQueue;
pub use poller::{PollReport, QueuePoller};
pub use queue::{DurableQueue, MemoryQueue, MemoryQueueConfig, QueueMessage};
#[cfg(feature = "sns-sqs")]
pub use sns_sqs::{SqsQueue, SqsQueueConfig};
pub use topic::Topic;

// ============================================================================
// Traits
// ============================================================================

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during delivery and queue operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Enqueue to '{queue}' failed: {message}")]
    Enqueue { queue: String, message: String },

    #[error("Dequeue from '{queue}' failed: {message}")]
    Dequeue { queue: String, message: String },

    #[error("Ack on '{queue}' failed: {message}")]
    Ack { queue: String, message: String },

    #[error("Failed to encode event: {0}")]
    Encode(String),

    #[error("Failed to decode message: {0}")]
    Decode(String),

    #[error("Consumer '{destination}' timed out after {after:?}")]
    Timeout { destination: String, after: Duration },

    #[error("Handler '{name}' failed: {message}")]
    Handler { name: String, message: String },
}

/// Active consumer invoked with a delivered event.
pub trait EventHandler: Send + Sync {
    /// Handler name, for logging and failure attribution.
    fn name(&self) -> &str;

    /// Process one event.
    fn handle(&self, event: Arc<Event>) -> BoxFuture<'static, Result<()>>;

    /// Process a batch. Returns one result per event, in input order.
    ///
    /// The default handles events one at a time; handlers with their own
    /// partial-batch reporting override it.
    fn handle_records(
        &self,
        events: Vec<Arc<Event>>,
    ) -> BoxFuture<'static, Vec<(Uuid, Result<()>)>> {
        let calls: Vec<_> = events
            .into_iter()
            .map(|event| (event.id(), self.handle(event)))
            .collect();
        Box::pin(async move {
            let mut results = Vec::with_capacity(calls.len());
            for (id, call) in calls {
                results.push((id, call.await));
            }
            results
        })
    }
}

/// A place the router delivers matched events to.
///
/// Implementations:
/// - `QueueDestination`: enqueue a durable copy and return
/// - `ConsumerDestination`: invoke an `EventHandler` and await it
#[async_trait]
pub trait Destination: Send + Sync {
    /// Stable name used for reporting.
    fn name(&self) -> &str;

    /// Deliver one event.
    ///
    /// The event is shared; destinations must not assume exclusive ownership.
    async fn deliver(&self, event: Arc<Event>) -> Result<()>;
}

/// Shared handle to a destination.
pub type DestinationRef = Arc<dyn Destination>;
