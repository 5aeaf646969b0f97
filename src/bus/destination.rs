//! Destination implementations.
//!
//! Both kinds expose the same `deliver` capability so the router treats
//! them identically: a queue destination enqueues a durable copy and
//! returns, a consumer destination invokes a handler and awaits it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{BusError, Destination, DurableQueue, EventHandler, Result};
use crate::event::Event;

/// Default per-invocation limit for active consumers.
pub const DEFAULT_CONSUMER_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers by enqueueing the event envelope onto a durable queue.
pub struct QueueDestination {
    name: String,
    queue: Arc<dyn DurableQueue>,
}

impl QueueDestination {
    pub fn new(name: impl Into<String>, queue: Arc<dyn DurableQueue>) -> Self {
        Self {
            name: name.into(),
            queue,
        }
    }

    /// Destination named after its queue.
    pub fn for_queue(queue: Arc<dyn DurableQueue>) -> Self {
        Self::new(queue.name().to_string(), queue)
    }
}

#[async_trait]
impl Destination for QueueDestination {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, event: Arc<Event>) -> Result<()> {
        let body = event.encode().map_err(|e| BusError::Encode(e.to_string()))?;
        let message_id = self.queue.enqueue(body).await?;
        debug!(
            destination = %self.name,
            event_id = %event.id(),
            message_id = %message_id,
            "Event enqueued"
        );
        Ok(())
    }
}

/// Delivers by invoking an event handler synchronously, bounded by a timeout.
pub struct ConsumerDestination {
    name: String,
    handler: Arc<dyn EventHandler>,
    timeout: Duration,
}

impl ConsumerDestination {
    pub fn new(handler: Arc<dyn EventHandler>) -> Self {
        Self {
            name: handler.name().to_string(),
            handler,
            timeout: DEFAULT_CONSUMER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Destination for ConsumerDestination {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, event: Arc<Event>) -> Result<()> {
        let event_id = event.id();
        match tokio::time::timeout(self.timeout, self.handler.handle(event)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    destination = %self.name,
                    event_id = %event_id,
                    timeout = ?self.timeout,
                    "Consumer invocation timed out"
                );
                Err(BusError::Timeout {
                    destination: self.name.clone(),
                    after: self.timeout,
                })
            }
        }
    }
}
