//! Queue polling.
//!
//! Pulls batches from a durable queue and hands each message to an event
//! handler. Only records the handler accepted are acknowledged; the rest stay
//! in flight and reappear after the queue's visibility timeout, so retry is
//! the queue's redelivery and never a loop here.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{DurableQueue, EventHandler, Result};
use crate::event::Event;

/// Outcome of one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub received: usize,
    pub acked: usize,
    pub failed: usize,
}

/// Drains a queue into a handler.
pub struct QueuePoller {
    queue: Arc<dyn DurableQueue>,
    handler: Arc<dyn EventHandler>,
    max_messages: usize,
    idle_wait: Duration,
}

impl QueuePoller {
    pub fn new(queue: Arc<dyn DurableQueue>, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            queue,
            handler,
            max_messages: 10,
            idle_wait: Duration::from_millis(500),
        }
    }

    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = max;
        self
    }

    pub fn with_idle_wait(mut self, wait: Duration) -> Self {
        self.idle_wait = wait;
        self
    }

    /// Receive one batch and hand the decoded events to the handler.
    ///
    /// The handler reports one result per event; only successes are acked.
    pub async fn poll_once(&self) -> Result<PollReport> {
        let batch = self.queue.dequeue(self.max_messages).await?;
        let mut report = PollReport {
            received: batch.len(),
            ..PollReport::default()
        };

        let mut events = Vec::with_capacity(batch.len());
        let mut deliveries = Vec::with_capacity(batch.len());
        for message in batch {
            match Event::decode(&message.body) {
                Ok(event) => {
                    events.push(Arc::new(event));
                    deliveries.push(message);
                }
                Err(e) => {
                    error!(
                        queue = %self.queue.name(),
                        receive_count = message.receive_count,
                        error = %e,
                        "Failed to decode queued event"
                    );
                    report.failed += 1;
                }
            }
        }

        if !events.is_empty() {
            let results = self.handler.handle_records(events).await;
            for (message, (event_id, result)) in deliveries.iter().zip(results) {
                if let Err(e) = result {
                    warn!(
                        queue = %self.queue.name(),
                        handler = %self.handler.name(),
                        event_id = %event_id,
                        receive_count = message.receive_count,
                        error = %e,
                        "Handler failed, leaving message for redelivery"
                    );
                    report.failed += 1;
                    continue;
                }

                match self.queue.ack(&message.receipt).await {
                    Ok(()) => report.acked += 1,
                    Err(e) => {
                        error!(queue = %self.queue.name(), event_id = %event_id, error = %e, "Ack failed");
                        report.failed += 1;
                    }
                }
            }
        }

        if report.received > 0 {
            debug!(
                queue = %self.queue.name(),
                received = report.received,
                acked = report.acked,
                failed = report.failed,
                "Poll complete"
            );
        }
        Ok(report)
    }

    /// Poll until `shutdown` turns true.
    ///
    /// Receive errors are logged and retried after the idle wait.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(queue = %self.queue.name(), handler = %self.handler.name(), "Queue poller started");

        while !*shutdown.borrow() {
            let idle = match self.poll_once().await {
                Ok(report) => report.received == 0,
                Err(e) => {
                    error!(queue = %self.queue.name(), error = %e, "Failed to receive messages");
                    true
                }
            };
            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.idle_wait) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!(queue = %self.queue.name(), "Queue poller stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusError, MemoryQueue, MemoryQueueConfig, QueueMessage};
    use crate::consumers::RescueConsumer;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails every event whose payload is "fail".
    struct SelectiveHandler {
        handled: Arc<AtomicUsize>,
    }

    impl EventHandler for SelectiveHandler {
        fn name(&self) -> &str {
            "selective"
        }

        fn handle(&self, event: Arc<Event>) -> BoxFuture<'static, Result<()>> {
            let handled = Arc::clone(&self.handled);
            Box::pin(async move {
                if event.payload().as_ref() == b"fail" {
                    return Err(BusError::Handler {
                        name: "selective".to_string(),
                        message: "rejected".to_string(),
                    });
                }
                handled.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    async fn enqueue_event(queue: &MemoryQueue, payload: &'static str) {
        let body = Event::new(payload).encode().unwrap();
        queue.enqueue(body).await.unwrap();
    }

    #[tokio::test]
    async fn test_poll_acks_only_successful_records() {
        let queue = Arc::new(MemoryQueue::new(
            "queue-a",
            MemoryQueueConfig::default().with_visibility_timeout(Duration::from_secs(60)),
        ));
        enqueue_event(&queue, "ok").await;
        enqueue_event(&queue, "fail").await;
        enqueue_event(&queue, "ok").await;
        let handled = Arc::new(AtomicUsize::new(0));
        let poller = QueuePoller::new(
            queue.clone(),
            Arc::new(SelectiveHandler {
                handled: Arc::clone(&handled),
            }),
        );

        let report = poller.poll_once().await.unwrap();

        assert_eq!(
            report,
            PollReport {
                received: 3,
                acked: 2,
                failed: 1
            }
        );
        assert_eq!(handled.load(Ordering::SeqCst), 2);
        assert_eq!(queue.in_flight().await, 1);
    }

    #[tokio::test]
    async fn test_undecodable_message_left_for_redelivery() {
        let queue = Arc::new(MemoryQueue::new(
            "queue-a",
            MemoryQueueConfig::default().with_visibility_timeout(Duration::ZERO),
        ));
        queue.enqueue(Bytes::from_static(b"garbage")).await.unwrap();
        let poller = QueuePoller::new(
            queue.clone(),
            Arc::new(SelectiveHandler {
                handled: Arc::new(AtomicUsize::new(0)),
            }),
        );

        let first = poller.poll_once().await.unwrap();
        let second = poller.poll_once().await.unwrap();

        assert_eq!(first.failed, 1);
        assert_eq!(second.received, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let queue = Arc::new(MemoryQueue::named("queue-a"));
        enqueue_event(&queue, "ok").await;
        let handled = Arc::new(AtomicUsize::new(0));
        let poller = QueuePoller::new(
            queue.clone(),
            Arc::new(SelectiveHandler {
                handled: Arc::clone(&handled),
            }),
        )
        .with_idle_wait(Duration::from_millis(5));
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(async move { poller.run(rx).await });
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        task.await.unwrap().unwrap();
        assert_eq!(handled.load(Ordering::SeqCst), 1);
    }

    /// Fails the first dequeue, then serves from an inner memory queue.
    struct FlakyQueue {
        inner: MemoryQueue,
        dequeue_calls: AtomicUsize,
    }

    #[async_trait]
    impl DurableQueue for FlakyQueue {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn enqueue(&self, body: Bytes) -> Result<String> {
            self.inner.enqueue(body).await
        }

        async fn dequeue(&self, max: usize) -> Result<Vec<QueueMessage>> {
            if self.dequeue_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(BusError::Dequeue {
                    queue: "flaky".to_string(),
                    message: "transient".to_string(),
                });
            }
            self.inner.dequeue(max).await
        }

        async fn ack(&self, receipt: &str) -> Result<()> {
            self.inner.ack(receipt).await
        }
    }

    #[tokio::test]
    async fn test_run_survives_receive_error() {
        let queue = Arc::new(FlakyQueue {
            inner: MemoryQueue::named("flaky"),
            dequeue_calls: AtomicUsize::new(0),
        });
        enqueue_event(&queue.inner, "ok").await;
        let handled = Arc::new(AtomicUsize::new(0));
        let poller = QueuePoller::new(
            queue.clone(),
            Arc::new(SelectiveHandler {
                handled: Arc::clone(&handled),
            }),
        )
        .with_idle_wait(Duration::from_millis(5));
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(async move { poller.run(rx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!task.is_finished());
        tx.send(true).unwrap();
        task.await.unwrap().unwrap();
        assert_eq!(handled.load(Ordering::SeqCst), 1);
        assert!(queue.dequeue_calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_batch_handler_failures_drive_acks() {
        let queue_a = Arc::new(MemoryQueue::new(
            "queue-a",
            MemoryQueueConfig::default().with_visibility_timeout(Duration::from_secs(60)),
        ));
        let queue_b = Arc::new(MemoryQueue::named("queue-b"));
        enqueue_event(&queue_a, r#"{"name":"Li"}"#).await;
        enqueue_event(&queue_a, "not json").await;
        enqueue_event(&queue_a, r#"{"email":"a@b.com"}"#).await;
        let rescue = Arc::new(RescueConsumer::new(queue_b.clone()));
        let poller = QueuePoller::new(queue_a.clone(), rescue);

        let report = poller.poll_once().await.unwrap();

        assert_eq!(
            report,
            PollReport {
                received: 3,
                acked: 2,
                failed: 1
            }
        );
        assert_eq!(queue_a.in_flight().await, 1);
        assert_eq!(queue_b.len().await, 1);
    }
}
