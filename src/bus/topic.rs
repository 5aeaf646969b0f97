//! In-process topic.
//!
//! Stands in for the external pub/sub broker: `publish` wraps the payload in
//! an immutable event and hands it to the router, which owns the
//! subscriptions. There is no consumer-side filtering.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::event::Event;
use crate::routing::{RouteReport, Router};

/// A named topic bound to a router.
pub struct Topic {
    name: String,
    router: Arc<Router>,
}

impl Topic {
    pub fn new(name: impl Into<String>, router: Arc<Router>) -> Self {
        Self {
            name: name.into(),
            router,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Publish a payload with classification attributes.
    pub async fn publish(
        &self,
        attributes: HashMap<String, String>,
        payload: impl Into<Bytes>,
    ) -> RouteReport {
        self.publish_event(Event::with_attributes(attributes, payload))
            .await
    }

    /// Publish a pre-built event.
    #[tracing::instrument(name = "topic.publish", skip_all, fields(topic = %self.name, event_id = %event.id()))]
    pub async fn publish_event(&self, event: Event) -> RouteReport {
        debug!(attributes = ?event.attributes(), "Publishing event");
        self.router.route(Arc::new(event)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{MemoryQueue, QueueDestination};
    use crate::event::COUNTRY_ATTR;
    use crate::routing::{Rule, Subscription};

    #[tokio::test]
    async fn test_publish_routes_through_router() {
        let queue = Arc::new(MemoryQueue::named("queue-a"));
        let router = Router::new(vec![Subscription::new(
            "allow",
            Rule::allow(COUNTRY_ATTR, ["Ireland", "China"]).unwrap(),
            Arc::new(QueueDestination::for_queue(queue.clone())),
        )]);
        let topic = Topic::new("events", Arc::new(router));

        let attrs = HashMap::from([(COUNTRY_ATTR.to_string(), "China".to_string())]);
        let report = topic.publish(attrs, r#"{"country":"China"}"#).await;

        assert_eq!(report.delivered, vec!["queue-a".to_string()]);
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let topic = Topic::new("events", Arc::new(Router::default()));

        let report = topic.publish(HashMap::new(), "{}").await;

        assert!(report.is_unrouted());
    }
}
