//! Mock queue implementation for testing.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{BusError, DurableQueue, QueueMessage, Result};

/// Mock queue that records enqueued bodies and can be told to fail.
#[derive(Default)]
pub struct MockQueue {
    name: String,
    enqueued: RwLock<Vec<Bytes>>,
    fail_on_enqueue: RwLock<bool>,
}

impl MockQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub async fn set_fail_on_enqueue(&self, fail: bool) {
        *self.fail_on_enqueue.write().await = fail;
    }

    pub async fn enqueued_count(&self) -> usize {
        self.enqueued.read().await.len()
    }

    pub async fn take_enqueued(&self) -> Vec<Bytes> {
        std::mem::take(&mut *self.enqueued.write().await)
    }
}

#[async_trait]
impl DurableQueue for MockQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, body: Bytes) -> Result<String> {
        if *self.fail_on_enqueue.read().await {
            return Err(BusError::Enqueue {
                queue: self.name.clone(),
                message: "Mock enqueue failure".to_string(),
            });
        }
        let mut enqueued = self.enqueued.write().await;
        enqueued.push(body);
        Ok(format!("mock-{}", enqueued.len()))
    }

    async fn dequeue(&self, _max: usize) -> Result<Vec<QueueMessage>> {
        Ok(Vec::new())
    }

    async fn ack(&self, _receipt: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_queue_enqueue() {
        let queue = MockQueue::new("queue-b");

        queue.enqueue(Bytes::from_static(b"{}")).await.unwrap();

        assert_eq!(queue.enqueued_count().await, 1);
    }

    #[tokio::test]
    async fn test_mock_queue_fail_on_enqueue() {
        let queue = MockQueue::new("queue-b");
        queue.set_fail_on_enqueue(true).await;

        let result = queue.enqueue(Bytes::from_static(b"{}")).await;

        assert!(matches!(result, Err(BusError::Enqueue { .. })));
        assert_eq!(queue.enqueued_count().await, 0);
    }
}
