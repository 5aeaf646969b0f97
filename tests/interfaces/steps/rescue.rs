//! Rescue consumer interface step definitions.

use std::sync::Arc;

use cucumber::{given, then, when, World};
use sluice::bus::MockQueue;
use sluice::consumers::{BatchReport, RescueConsumer};
use sluice::event::Event;

/// Test context for rescue scenarios.
#[derive(World, Default)]
pub struct RescueWorld {
    queue: Option<Arc<MockQueue>>,
    consumer: Option<RescueConsumer>,
    last_report: Option<BatchReport>,
}

impl std::fmt::Debug for RescueWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RescueWorld")
            .field("last_report", &self.last_report)
            .finish()
    }
}

impl RescueWorld {
    fn queue(&self) -> &Arc<MockQueue> {
        self.queue.as_ref().expect("queue not configured")
    }

    fn report(&self) -> &BatchReport {
        self.last_report.as_ref().expect("no batch handled")
    }
}

#[given(expr = "a rescue consumer forwarding to {string}")]
async fn given_rescue_consumer(world: &mut RescueWorld, queue: String) {
    let queue = Arc::new(MockQueue::new(queue));
    world.consumer = Some(RescueConsumer::new(queue.clone()));
    world.queue = Some(queue);
}

#[given("the secondary queue rejects writes")]
async fn given_queue_rejects(world: &mut RescueWorld) {
    world.queue().set_fail_on_enqueue(true).await;
}

#[when(expr = "a batch with payloads {string} is handled")]
async fn when_batch_handled(world: &mut RescueWorld, payloads: String) {
    let records: Vec<Arc<Event>> = payloads
        .split('|')
        .map(|p| Arc::new(Event::new(p.to_string())))
        .collect();
    let consumer = world.consumer.as_ref().expect("consumer not configured");
    world.last_report = Some(consumer.handle_batch(&records).await);
}

#[then(expr = "the batch reports {int} item failure(s)")]
async fn then_item_failures(world: &mut RescueWorld, expected: usize) {
    assert_eq!(world.report().item_failures().len(), expected);
}

#[then(expr = "{int} record(s) is/are rescued")]
async fn then_rescued(world: &mut RescueWorld, expected: usize) {
    assert_eq!(world.report().rescued(), expected);
}

#[then(expr = "{int} record(s) is/are accepted")]
async fn then_accepted(world: &mut RescueWorld, expected: usize) {
    assert_eq!(world.report().accepted(), expected);
}

#[then(expr = "the secondary queue holds {string}")]
async fn then_queue_holds(world: &mut RescueWorld, body: String) {
    let bodies = world.queue().take_enqueued().await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0].as_ref(), body.as_bytes());
}

#[then("the secondary queue is empty")]
async fn then_queue_empty(world: &mut RescueWorld) {
    assert_eq!(world.queue().enqueued_count().await, 0);
}
