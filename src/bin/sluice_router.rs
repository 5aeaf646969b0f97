//! sluice-router: route events from stdin through the configured topology
//!
//! Reads one event per line from stdin, publishes each to the topic, then
//! drains every subscribed queue into a logging consumer.
//!
//! ## Architecture
//! ```text
//! stdin --> [topic] --(allow rule)--> [queue-a] --> [log consumer]
//!                   --(deny rule)---> [rescue consumer] --> [queue-b]
//! ```
//!
//! ## Input
//! Each line is either `{"attributes": {...}, "payload": ...}` or a bare JSON
//! object whose `country` field becomes the routing attribute.
//!
//! ## Configuration
//! - First argument: config file path (optional)
//! - SLUICE_CONFIG: config file path (optional)
//! - SLUICE_LOG: log filter (default: info)
//! - RESCUE_QUEUE_URL: rescue queue, if the config leaves it unset

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use sluice::bus::{DurableQueue, EventHandler, QueuePoller};
use sluice::config::{Config, Target};
use sluice::consumers::LogConsumer;
use sluice::event::Event;
use sluice::pipeline::Pipeline;
use sluice::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;
    let pipeline = Pipeline::from_config(&config).await?;

    info!(topic = %pipeline.topic.name(), "sluice-router started");

    let mut published = 0usize;
    let mut unrouted = 0usize;
    let mut failed = 0usize;
    let mut rescue_invocations = 0usize;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let event = match Event::from_input_line(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Skipping unparseable input line");
                continue;
            }
        };

        let report = pipeline.topic.publish_event(event).await;
        published += 1;
        if report.is_unrouted() {
            unrouted += 1;
        }
        if !report.is_success() {
            failed += 1;
            for failure in &report.failed {
                error!(
                    event_id = %report.event_id,
                    destination = %failure.destination,
                    error = %failure.error,
                    "Delivery failed"
                );
            }
        }
        if report.delivered.iter().any(|d| d == pipeline.rescue.name()) {
            rescue_invocations += 1;
        }
    }

    for name in subscribed_queues(&config) {
        let Some(queue) = pipeline.queue(&name) else {
            continue;
        };
        let consumer = Arc::new(LogConsumer::new(format!("{}-log", name)));
        let poller = QueuePoller::new(queue, consumer.clone());
        loop {
            let report = poller.poll_once().await?;
            if report.received == 0 {
                break;
            }
        }
        info!(queue = %name, consumed = consumer.seen(), "Queue drained");
    }

    info!(
        published,
        unrouted,
        failed,
        rescue_invocations,
        rescue_queue = %pipeline.rescue.queue().name(),
        "sluice-router finished"
    );

    Ok(())
}

/// Names of queues that some subscription delivers to.
fn subscribed_queues(config: &Config) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for sub in &config.routing.subscriptions {
        if let Ok(Target::Queue(reference)) = sub.destination.target(&sub.name) {
            if let Some(queue) = config.find_queue(reference) {
                if !names.contains(&queue.name) {
                    names.push(queue.name.clone());
                }
            }
        }
    }
    names
}
