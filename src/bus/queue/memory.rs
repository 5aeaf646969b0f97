//! In-memory durable queue for standalone mode.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::{DurableQueue, QueueMessage};
use crate::bus::{BusError, Result};

/// Configuration for an in-memory queue.
#[derive(Clone, Debug)]
pub struct MemoryQueueConfig {
    /// How long a dequeued message stays hidden before redelivery.
    pub visibility_timeout: Duration,
    /// Upper bound on messages returned by one dequeue.
    pub max_messages: usize,
}

impl Default for MemoryQueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
            max_messages: 10,
        }
    }
}

impl MemoryQueueConfig {
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = max;
        self
    }
}

#[derive(Debug)]
struct Stored {
    id: String,
    body: Bytes,
    receive_count: u32,
}

#[derive(Debug)]
struct InFlight {
    message: Stored,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Stored>,
    in_flight: HashMap<String, InFlight>,
}

impl QueueState {
    /// Move in-flight messages whose visibility expired back to ready.
    fn release_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.visible_at <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();

        for receipt in &expired {
            if let Some(flight) = self.in_flight.remove(receipt) {
                self.ready.push_back(flight.message);
            }
        }
        expired.len()
    }
}

/// In-memory queue with visibility timeouts and redelivery.
pub struct MemoryQueue {
    name: String,
    config: MemoryQueueConfig,
    state: Mutex<QueueState>,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>, config: MemoryQueueConfig) -> Self {
        let name = name.into();
        info!(
            queue = %name,
            visibility_timeout = ?config.visibility_timeout,
            max_messages = config.max_messages,
            "Memory queue initialized"
        );
        Self {
            name,
            config,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Queue with default configuration.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, MemoryQueueConfig::default())
    }

    /// Messages visible to the next dequeue (expired in-flight not counted).
    pub async fn len(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Messages received but not yet acknowledged.
    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    /// Snapshot of ready message bodies, oldest first. For inspection only.
    pub async fn peek_all(&self) -> Vec<Bytes> {
        self.state
            .lock()
            .await
            .ready
            .iter()
            .map(|m| m.body.clone())
            .collect()
    }
}

#[async_trait]
impl DurableQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, body: Bytes) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut state = self.state.lock().await;
        state.ready.push_back(Stored {
            id: id.clone(),
            body,
            receive_count: 0,
        });
        debug!(queue = %self.name, message_id = %id, depth = state.ready.len(), "Enqueued message");
        Ok(id)
    }

    async fn dequeue(&self, max: usize) -> Result<Vec<QueueMessage>> {
        let now = Instant::now();
        let limit = max.min(self.config.max_messages);
        let mut state = self.state.lock().await;

        let released = state.release_expired(now);
        if released > 0 {
            debug!(queue = %self.name, released, "Visibility expired, messages redelivered");
        }

        let mut batch = Vec::with_capacity(limit.min(state.ready.len()));
        while batch.len() < limit {
            let Some(mut message) = state.ready.pop_front() else {
                break;
            };
            message.receive_count += 1;
            let receipt = Uuid::new_v4().to_string();
            batch.push(QueueMessage {
                receipt: receipt.clone(),
                body: message.body.clone(),
                receive_count: message.receive_count,
            });
            state.in_flight.insert(
                receipt,
                InFlight {
                    message,
                    visible_at: now + self.config.visibility_timeout,
                },
            );
        }

        Ok(batch)
    }

    async fn ack(&self, receipt: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.in_flight.remove(receipt) {
            Some(flight) => {
                debug!(queue = %self.name, message_id = %flight.message.id, "Acked message");
                Ok(())
            }
            None => Err(BusError::Ack {
                queue: self.name.clone(),
                message: format!("unknown or expired receipt '{}'", receipt),
            }),
        }
    }
}
