//! Startup wiring.
//!
//! Turns a validated [`Config`] into live queues, the rescue consumer, the
//! router and the topic. This is the only place subscriptions are created;
//! the router receives them as an immutable list.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::bus::{
    ConsumerDestination, DestinationRef, DurableQueue, MemoryQueue, MemoryQueueConfig,
    QueueDestination, Topic,
};
use crate::config::{Config, ConfigError, QueueBackend, QueueConfig, Target};
use crate::consumers::{RescueConsumer, RESCUE_CONSUMER_NAME};
use crate::routing::{Router, Subscription};

/// Errors building the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to connect queue '{queue}': {message}")]
    Queue { queue: String, message: String },
}

/// Everything a running router process needs.
pub struct Pipeline {
    pub topic: Topic,
    pub router: Arc<Router>,
    pub rescue: Arc<RescueConsumer>,
    queues: HashMap<String, Arc<dyn DurableQueue>>,
}

impl Pipeline {
    /// Build from configuration.
    pub async fn from_config(config: &Config) -> Result<Self, PipelineError> {
        config.validate()?;

        let mut queues: HashMap<String, Arc<dyn DurableQueue>> = HashMap::new();
        for queue_config in &config.queues {
            let queue = build_queue(queue_config).await?;
            queues.insert(queue_config.name.clone(), queue);
        }

        let rescue_ref = config.rescue_queue_url()?;
        let rescue_queue = match config.find_queue(rescue_ref) {
            Some(queue_config) => Arc::clone(&queues[&queue_config.name]),
            None => {
                let queue = build_queue(&QueueConfig {
                    name: rescue_ref.to_string(),
                    backend: QueueBackend::Sqs,
                    url: Some(rescue_ref.to_string()),
                    ..QueueConfig::default()
                })
                .await?;
                queues.insert(rescue_ref.to_string(), Arc::clone(&queue));
                queue
            }
        };

        let rescue = Arc::new(RescueConsumer::with_required_field(
            rescue_queue,
            config.rescue.required_field.clone(),
        ));
        let rescue_destination: DestinationRef = Arc::new(
            ConsumerDestination::new(rescue.clone()).with_timeout(config.consumer_timeout()),
        );

        let mut queue_destinations: HashMap<String, DestinationRef> = HashMap::new();
        let mut subscriptions = Vec::with_capacity(config.routing.subscriptions.len());
        for sub in &config.routing.subscriptions {
            let rule = sub.rule.to_rule(&sub.name)?;
            let destination = match sub.destination.target(&sub.name)? {
                Target::Queue(reference) => {
                    let queue_config = config.find_queue(reference).ok_or_else(|| {
                        ConfigError::UnknownDestination {
                            subscription: sub.name.clone(),
                            destination: reference.to_string(),
                        }
                    })?;
                    let name = queue_config.name.clone();
                    Arc::clone(queue_destinations.entry(name.clone()).or_insert_with(|| {
                        Arc::new(QueueDestination::new(name.clone(), Arc::clone(&queues[&name])))
                    }))
                }
                Target::Consumer(RESCUE_CONSUMER_NAME) => Arc::clone(&rescue_destination),
                Target::Consumer(other) => {
                    return Err(ConfigError::UnknownDestination {
                        subscription: sub.name.clone(),
                        destination: other.to_string(),
                    }
                    .into())
                }
            };
            subscriptions.push(Subscription::new(sub.name.clone(), rule, destination));
        }

        let router = Arc::new(Router::new(subscriptions));
        let topic = Topic::new(config.topic.name.clone(), Arc::clone(&router));

        info!(
            topic = %config.topic.name,
            queues = queues.len(),
            subscriptions = router.subscriptions().len(),
            rescue_queue = %rescue_ref,
            "Pipeline ready"
        );

        Ok(Self {
            topic,
            router,
            rescue,
            queues,
        })
    }

    /// Queue by configured name.
    pub fn queue(&self, name: &str) -> Option<Arc<dyn DurableQueue>> {
        self.queues.get(name).cloned()
    }

    /// Names of all queues, sorted.
    pub fn queue_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.queues.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

async fn build_queue(config: &QueueConfig) -> Result<Arc<dyn DurableQueue>, PipelineError> {
    match config.backend {
        QueueBackend::Memory => Ok(Arc::new(MemoryQueue::new(
            config.name.clone(),
            MemoryQueueConfig::default()
                .with_visibility_timeout(config.visibility_timeout())
                .with_max_messages(config.max_messages),
        ))),
        QueueBackend::Sqs => build_sqs_queue(config).await,
    }
}

#[cfg(feature = "sns-sqs")]
async fn build_sqs_queue(config: &QueueConfig) -> Result<Arc<dyn DurableQueue>, PipelineError> {
    use crate::bus::{SqsQueue, SqsQueueConfig};
    use crate::utils::bootstrap::connect_with_retry;

    let url = config.url.clone().ok_or_else(|| PipelineError::Queue {
        queue: config.name.clone(),
        message: "SQS queues require a url".to_string(),
    })?;
    let to_i32 = |v: u64| i32::try_from(v).unwrap_or(i32::MAX);

    let mut sqs_config = SqsQueueConfig::new(url)
        .with_visibility_timeout(to_i32(config.visibility_timeout_secs))
        .with_wait_time(to_i32(config.wait_time_secs));
    sqs_config.max_messages = i32::try_from(config.max_messages).unwrap_or(10);
    if let Some(ref region) = config.region {
        sqs_config = sqs_config.with_region(region);
    }
    if let Some(ref endpoint) = config.endpoint_url {
        sqs_config = sqs_config.with_endpoint(endpoint);
    }

    let queue = connect_with_retry(&config.name, &sqs_config.queue_url, || {
        SqsQueue::new(sqs_config.clone())
    })
    .await
    .map_err(|e| PipelineError::Queue {
        queue: config.name.clone(),
        message: e.to_string(),
    })?;
    Ok(Arc::new(queue))
}

#[cfg(not(feature = "sns-sqs"))]
async fn build_sqs_queue(config: &QueueConfig) -> Result<Arc<dyn DurableQueue>, PipelineError> {
    Err(PipelineError::Queue {
        queue: config.name.clone(),
        message: "SQS support requires the 'sns-sqs' feature. Rebuild with --features sns-sqs"
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::COUNTRY_ATTR;
    use std::collections::HashMap as Map;

    const YAML: &str = r#"
queues:
  - name: queue-a
  - name: queue-b
rescue:
  queue_url: queue-b
routing:
  subscriptions:
    - name: allow
      rule: { attribute: country, allow: [Ireland, China] }
      destination: { queue: queue-a }
    - name: deny
      rule: { attribute: country, deny: [Ireland, China] }
      destination: { consumer: rescue }
"#;

    fn attrs(country: &str) -> Map<String, String> {
        Map::from([(COUNTRY_ATTR.to_string(), country.to_string())])
    }

    #[tokio::test]
    async fn test_pipeline_wires_calibration_topology() {
        let config = Config::from_yaml(YAML).unwrap();
        let pipeline = Pipeline::from_config(&config).await.unwrap();

        let allowed = pipeline
            .topic
            .publish(attrs("Ireland"), r#"{"country":"Ireland"}"#)
            .await;
        let rescued = pipeline
            .topic
            .publish(attrs("France"), r#"{"country":"France"}"#)
            .await;
        let complete = pipeline
            .topic
            .publish(attrs("France"), r#"{"country":"France","email":"a@b.com"}"#)
            .await;

        assert_eq!(allowed.delivered, vec!["queue-a".to_string()]);
        assert_eq!(rescued.delivered, vec!["rescue".to_string()]);
        assert_eq!(complete.delivered, vec!["rescue".to_string()]);

        let queue_a = pipeline.queue("queue-a").unwrap();
        let queue_b = pipeline.queue("queue-b").unwrap();
        assert_eq!(queue_a.dequeue(10).await.unwrap().len(), 1);
        assert_eq!(queue_b.dequeue(10).await.unwrap().len(), 1);
        assert_eq!(pipeline.queue_names(), vec!["queue-a", "queue-b"]);
    }

    #[tokio::test]
    async fn test_pipeline_rejects_missing_rescue_queue() {
        let config = Config {
            queues: vec![QueueConfig::memory("queue-a")],
            ..Config::default()
        };

        let result = Pipeline::from_config(&config).await;

        assert!(matches!(
            result,
            Err(PipelineError::Config(ConfigError::MissingRescueQueue))
        ));
    }

    #[cfg(not(feature = "sns-sqs"))]
    #[tokio::test]
    async fn test_remote_rescue_queue_needs_sqs_feature() {
        let yaml = YAML.replace(
            "queue_url: queue-b",
            "queue_url: https://sqs.eu-west-1.amazonaws.com/123456789012/QueueB",
        );
        let config = Config::from_yaml(&yaml).unwrap();

        let result = Pipeline::from_config(&config).await;

        assert!(matches!(result, Err(PipelineError::Queue { .. })));
    }
}
