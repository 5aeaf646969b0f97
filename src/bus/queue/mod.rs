//! Durable queue interface.
//!
//! At-least-once, consumer-pull semantics: `dequeue` hides returned messages
//! for a visibility timeout; anything not `ack`ed before it expires becomes
//! visible again. No ordering guarantee.

use async_trait::async_trait;
use bytes::Bytes;

use super::Result;

mod memory;

pub use memory::{MemoryQueue, MemoryQueueConfig};

/// A message handed out by `dequeue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Handle for acknowledging this delivery.
    pub receipt: String,
    /// Raw message body.
    pub body: Bytes,
    /// How many times the message has been received, this delivery included.
    pub receive_count: u32,
}

/// Queue storage collaborator.
///
/// Implementations:
/// - `MemoryQueue`: in-process, for standalone mode and tests
/// - `MockQueue`: records enqueues, can be told to fail
/// - `SqsQueue`: AWS SQS (feature `sns-sqs`)
#[async_trait]
pub trait DurableQueue: Send + Sync {
    /// Queue name or address, for logging.
    fn name(&self) -> &str;

    /// Store a message durably. Returns the broker-assigned message id.
    async fn enqueue(&self, body: Bytes) -> Result<String>;

    /// Receive up to `max` visible messages.
    async fn dequeue(&self, max: usize) -> Result<Vec<QueueMessage>>;

    /// Acknowledge (delete) a received message.
    async fn ack(&self, receipt: &str) -> Result<()>;
}
