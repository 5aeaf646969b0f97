//! Routing interface step definitions.

use std::collections::HashMap;

use cucumber::{given, then, when, World};
use sluice::bus::DurableQueue;
use sluice::config::Config;
use sluice::event::COUNTRY_ATTR;
use sluice::pipeline::Pipeline;
use sluice::routing::RouteReport;

const CALIBRATION: &str = r#"
topic:
  name: exam-topic
queues:
  - name: queue-a
  - name: queue-b
rescue:
  queue_url: queue-b
routing:
  subscriptions:
    - name: allow-ireland-china
      rule: { attribute: country, allow: [Ireland, China] }
      destination: { queue: queue-a }
    - name: deny-ireland-china
      rule: { attribute: country, deny: [Ireland, China] }
      destination: { consumer: rescue }
"#;

/// Test context for routing scenarios.
#[derive(World, Default)]
pub struct RoutingWorld {
    pipeline: Option<Pipeline>,
    last_report: Option<RouteReport>,
}

impl std::fmt::Debug for RoutingWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingWorld")
            .field("pipeline", &self.pipeline.as_ref().map(|_| "<Pipeline>"))
            .field("last_report", &self.last_report)
            .finish()
    }
}

impl RoutingWorld {
    fn pipeline(&self) -> &Pipeline {
        self.pipeline.as_ref().expect("topology not built")
    }

    fn report(&self) -> &RouteReport {
        self.last_report.as_ref().expect("nothing published")
    }
}

#[given("the calibration topology")]
async fn given_calibration_topology(world: &mut RoutingWorld) {
    let config = Config::from_yaml(CALIBRATION).expect("calibration config");
    world.pipeline = Some(Pipeline::from_config(&config).await.expect("pipeline"));
}

#[when(expr = "an event from {string} with payload {string} is published")]
async fn when_event_published(world: &mut RoutingWorld, country: String, payload: String) {
    let attributes = HashMap::from([(COUNTRY_ATTR.to_string(), country)]);
    let report = world.pipeline().topic.publish(attributes, payload).await;
    world.last_report = Some(report);
}

#[when("an event without attributes is published")]
async fn when_event_without_attributes(world: &mut RoutingWorld) {
    let report = world
        .pipeline()
        .topic
        .publish(HashMap::new(), r#"{"email":"a@b.com"}"#)
        .await;
    world.last_report = Some(report);
}

#[then(expr = "the event is delivered to {string} only")]
async fn then_delivered_only(world: &mut RoutingWorld, destination: String) {
    let report = world.report();
    assert!(report.is_success(), "failures: {:?}", report.failed);
    assert_eq!(report.delivered, vec![destination]);
}

#[then("the event is unrouted")]
async fn then_unrouted(world: &mut RoutingWorld) {
    assert!(world.report().is_unrouted());
}

#[then(expr = "queue {string} receives {int} message(s)")]
async fn then_queue_receives(world: &mut RoutingWorld, queue: String, expected: usize) {
    let queue = world.pipeline().queue(&queue).expect("queue exists");
    let messages = queue.dequeue(100).await.expect("dequeue");
    for message in &messages {
        queue.ack(&message.receipt).await.expect("ack");
    }
    assert_eq!(messages.len(), expected);
}
