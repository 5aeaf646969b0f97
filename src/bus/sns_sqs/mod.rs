//! AWS SQS durable queue.
//!
//! Backs a [`DurableQueue`] with an existing SQS queue addressed by URL.
//! `dequeue` long-polls with the configured wait time and visibility
//! timeout; `ack` deletes by receipt handle. Redelivery and dead-lettering
//! of messages that are never acked are left to the queue's own redrive
//! policy.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::Client as SqsClient;
use bytes::Bytes;
use tracing::{debug, info};

use super::{BusError, DurableQueue, QueueMessage, Result};

/// Configuration for an SQS-backed queue.
#[derive(Clone, Debug)]
pub struct SqsQueueConfig {
    /// Queue URL.
    pub queue_url: String,
    /// AWS region (e.g., "eu-west-1"). Uses default provider chain if not set.
    pub region: Option<String>,
    /// Custom endpoint URL (for LocalStack or testing).
    pub endpoint_url: Option<String>,
    /// Visibility timeout in seconds for received messages (default: 30).
    pub visibility_timeout_secs: i32,
    /// Max number of messages to receive in one poll (default: 10, SQS max).
    pub max_messages: i32,
    /// Wait time seconds for long polling (default: 5).
    pub wait_time_secs: i32,
}

impl SqsQueueConfig {
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            region: None,
            endpoint_url: None,
            visibility_timeout_secs: 30,
            max_messages: 10,
            wait_time_secs: 5,
        }
    }

    /// Set AWS region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set custom endpoint URL (for LocalStack or testing).
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    /// Set visibility timeout in seconds.
    pub fn with_visibility_timeout(mut self, secs: i32) -> Self {
        self.visibility_timeout_secs = secs;
        self
    }

    /// Set long-poll wait time in seconds.
    pub fn with_wait_time(mut self, secs: i32) -> Self {
        self.wait_time_secs = secs;
        self
    }
}

/// Queue backed by AWS SQS.
pub struct SqsQueue {
    sqs: SqsClient,
    config: SqsQueueConfig,
}

impl SqsQueue {
    /// Load AWS configuration and build the client.
    pub async fn new(config: SqsQueueConfig) -> Result<Self> {
        let mut aws_config_builder = aws_config::defaults(BehaviorVersion::latest());

        if let Some(ref region) = config.region {
            aws_config_builder =
                aws_config_builder.region(aws_config::Region::new(region.clone()));
        }

        if let Some(ref endpoint) = config.endpoint_url {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint);
        }

        let aws_config = aws_config_builder.load().await;
        let sqs = SqsClient::new(&aws_config);

        info!(
            queue_url = %config.queue_url,
            region = ?config.region,
            endpoint = ?config.endpoint_url,
            "Connected to AWS SQS"
        );

        Ok(Self { sqs, config })
    }

    /// Batch size clamped to what SQS accepts (1..=10).
    fn batch_size(&self, max: usize) -> i32 {
        let requested = i32::try_from(max).unwrap_or(i32::MAX);
        requested.min(self.config.max_messages).clamp(1, 10)
    }
}

#[async_trait]
impl DurableQueue for SqsQueue {
    fn name(&self) -> &str {
        &self.config.queue_url
    }

    async fn enqueue(&self, body: Bytes) -> Result<String> {
        let body = String::from_utf8(body.to_vec()).map_err(|e| BusError::Enqueue {
            queue: self.config.queue_url.clone(),
            message: format!("SQS message body must be UTF-8: {}", e),
        })?;

        let result = self
            .sqs
            .send_message()
            .queue_url(&self.config.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| BusError::Enqueue {
                queue: self.config.queue_url.clone(),
                message: format!("Failed to send to SQS: {}", e),
            })?;

        let message_id = result.message_id().unwrap_or_default().to_string();
        debug!(queue_url = %self.config.queue_url, message_id = %message_id, "Sent message to SQS");
        Ok(message_id)
    }

    async fn dequeue(&self, max: usize) -> Result<Vec<QueueMessage>> {
        let result = self
            .sqs
            .receive_message()
            .queue_url(&self.config.queue_url)
            .max_number_of_messages(self.batch_size(max))
            .wait_time_seconds(self.config.wait_time_secs)
            .visibility_timeout(self.config.visibility_timeout_secs)
            .message_system_attribute_names(
                aws_sdk_sqs::types::MessageSystemAttributeName::ApproximateReceiveCount,
            )
            .send()
            .await
            .map_err(|e| BusError::Dequeue {
                queue: self.config.queue_url.clone(),
                message: format!("Failed to receive from SQS: {}", e),
            })?;

        let messages = result
            .messages()
            .iter()
            .filter_map(|msg| {
                let receipt = msg.receipt_handle()?.to_string();
                let body = Bytes::from(msg.body().unwrap_or_default().to_string());
                let receive_count = msg
                    .attributes()
                    .and_then(|attrs| {
                        attrs.get(
                            &aws_sdk_sqs::types::MessageSystemAttributeName::ApproximateReceiveCount,
                        )
                    })
                    .and_then(|count| count.parse().ok())
                    .unwrap_or(1);
                Some(QueueMessage {
                    receipt,
                    body,
                    receive_count,
                })
            })
            .collect::<Vec<_>>();

        debug!(queue_url = %self.config.queue_url, count = messages.len(), "Received messages from SQS");
        Ok(messages)
    }

    async fn ack(&self, receipt: &str) -> Result<()> {
        self.sqs
            .delete_message()
            .queue_url(&self.config.queue_url)
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(|e| BusError::Ack {
                queue: self.config.queue_url.clone(),
                message: format!("Failed to delete SQS message: {}", e),
            })?;
        Ok(())
    }
}
