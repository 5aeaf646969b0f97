//! Logging consumer.
//!
//! Terminal handler for events pulled off the allow-list queue: logs each
//! event with its attributes and a readable payload.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::info;

use crate::bus::{EventHandler, Result};
use crate::event::Event;

/// Logs every event it receives.
#[derive(Debug)]
pub struct LogConsumer {
    name: String,
    seen: Arc<AtomicU64>,
}

impl LogConsumer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seen: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Events handled so far.
    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }
}

impl EventHandler for LogConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: Arc<Event>) -> BoxFuture<'static, Result<()>> {
        let name = self.name.clone();
        let seen = Arc::clone(&self.seen);
        Box::pin(async move {
            let payload = String::from_utf8_lossy(event.payload());
            info!(
                consumer = %name,
                event_id = %event.id(),
                attributes = ?event.attributes(),
                payload = %payload,
                "Event received"
            );
            seen.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
    }
}
