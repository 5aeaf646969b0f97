//! Queue and consumer configuration types.

use std::time::Duration;

use serde::Deserialize;

use super::ConfigError;
use crate::bus::DEFAULT_CONSUMER_TIMEOUT;
use crate::consumers::DEFAULT_REQUIRED_FIELD;

/// Queue backend discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// In-process queue (standalone mode).
    #[default]
    Memory,
    /// AWS SQS (requires the `sns-sqs` feature).
    Sqs,
}

/// Durable queue configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue name, referenced by subscriptions.
    pub name: String,
    /// Backend type.
    #[serde(rename = "type")]
    pub backend: QueueBackend,
    /// Queue URL (required for SQS).
    pub url: Option<String>,
    /// AWS region (SQS only).
    pub region: Option<String>,
    /// Custom endpoint URL, e.g. LocalStack (SQS only).
    pub endpoint_url: Option<String>,
    /// Seconds a received message stays hidden before redelivery.
    pub visibility_timeout_secs: u64,
    /// Max messages per receive.
    pub max_messages: usize,
    /// Long-poll wait in seconds (SQS only).
    pub wait_time_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            backend: QueueBackend::Memory,
            url: None,
            region: None,
            endpoint_url: None,
            visibility_timeout_secs: 30,
            max_messages: 10,
            wait_time_secs: 5,
        }
    }
}

impl QueueConfig {
    /// In-memory queue with defaults.
    pub fn memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    /// Whether a reference looks like a broker URL rather than a queue name.
    pub fn is_remote_address(reference: &str) -> bool {
        reference.starts_with("https://") || reference.starts_with("http://")
    }

    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidQueue {
            queue: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is required"));
        }
        if self.max_messages == 0 {
            return Err(invalid("max_messages must be at least 1"));
        }
        if self.backend == QueueBackend::Sqs && self.url.is_none() {
            return Err(invalid("SQS queues require a url"));
        }
        Ok(())
    }
}

/// Rescue consumer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RescueConfig {
    /// Queue that receives payloads missing the required field. Required.
    pub queue_url: Option<String>,
    /// Field whose absence triggers a rescue.
    pub required_field: String,
}

impl Default for RescueConfig {
    fn default() -> Self {
        Self {
            queue_url: None,
            required_field: DEFAULT_REQUIRED_FIELD.to_string(),
        }
    }
}

/// Active consumer invocation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Per-invocation timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_CONSUMER_TIMEOUT.as_secs(),
        }
    }
}
