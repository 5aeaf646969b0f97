use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::Subscription;
use crate::bus::{BusError, DestinationRef};
use crate::event::Event;

/// A destination that did not accept the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub destination: String,
    pub error: BusError,
}

/// Per-destination outcome of routing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteReport {
    pub event_id: Uuid,
    /// Destinations that accepted the event.
    pub delivered: Vec<String>,
    /// Destinations whose delivery failed.
    pub failed: Vec<DeliveryFailure>,
}

impl RouteReport {
    /// True when no rule matched.
    pub fn is_unrouted(&self) -> bool {
        self.delivered.is_empty() && self.failed.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Evaluates subscriptions and fans events out to matching destinations.
///
/// The subscription list is fixed at construction; routing never mutates it.
#[derive(Debug, Default)]
pub struct Router {
    subscriptions: Vec<Subscription>,
}

impl Router {
    pub fn new(subscriptions: Vec<Subscription>) -> Self {
        for sub in &subscriptions {
            info!(
                subscription = %sub.name(),
                rule = %sub.rule(),
                destination = %sub.destination().name(),
                "Registered subscription"
            );
        }
        Self { subscriptions }
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Destinations whose rules match, in subscription order.
    ///
    /// A destination bound by several matching subscriptions appears once.
    /// Identity is the shared handle, not the name.
    pub fn matching(&self, event: &Event) -> Vec<DestinationRef> {
        let mut seen: HashSet<*const ()> = HashSet::new();
        let mut matched = Vec::new();

        for sub in &self.subscriptions {
            let accepted = sub.accepts(event);
            debug!(
                event_id = %event.id(),
                subscription = %sub.name(),
                rule = %sub.rule(),
                matched = accepted,
                "Evaluated subscription"
            );
            if accepted && seen.insert(Arc::as_ptr(sub.destination()) as *const ()) {
                matched.push(Arc::clone(sub.destination()));
            }
        }

        matched
    }

    /// Deliver an event to every matching destination.
    ///
    /// Deliveries run concurrently; a failure at one destination is recorded
    /// in the report and does not affect the others.
    #[tracing::instrument(name = "router.route", skip_all, fields(event_id = %event.id()))]
    pub async fn route(&self, event: Arc<Event>) -> RouteReport {
        let destinations = self.matching(&event);

        let deliveries = destinations.iter().map(|destination| {
            let event = Arc::clone(&event);
            async move { (destination.name().to_string(), destination.deliver(event).await) }
        });
        let results = join_all(deliveries).await;

        let mut report = RouteReport {
            event_id: event.id(),
            delivered: Vec::new(),
            failed: Vec::new(),
        };

        for (destination, result) in results {
            match result {
                Ok(()) => report.delivered.push(destination),
                Err(error) => {
                    warn!(
                        event_id = %event.id(),
                        destination = %destination,
                        error = %error,
                        "Delivery failed"
                    );
                    report.failed.push(DeliveryFailure { destination, error });
                }
            }
        }

        info!(
            event_id = %event.id(),
            delivered = ?report.delivered,
            failed = report.failed.len(),
            "Event routed"
        );

        report
    }
}
