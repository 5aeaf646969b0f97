//! Rescue consumer.
//!
//! An active consumer that inspects each delivered payload for a required
//! field. Payloads missing it are forwarded, unchanged, to a secondary
//! durable queue for remediation. Payloads carrying it need no further
//! action here.
//!
//! ## Field Presence
//!
//! A field counts as missing when it is absent, `null`, `false`, `0`, or an
//! empty string. A payload that parses but is not an object (a string,
//! number, boolean or array) has no fields at all and is forwarded. A `null`
//! payload cannot be inspected and fails the record.
//!
//! Forwarded bodies keep the payload's key order.
//!
//! ## Batches
//!
//! Each record in a batch is processed independently. A malformed payload or
//! a failed forward marks that one record failed in the [`BatchReport`];
//! sibling records still complete. Failed record ids are reported so the
//! upstream queue redelivers only those.
//!
//! Redelivery of the same payload forwards it again. There is no dedup.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bus::{BusError, DurableQueue, EventHandler};
use crate::event::Event;

/// Field whose absence routes a payload to the rescue queue.
pub const DEFAULT_REQUIRED_FIELD: &str = "email";

/// Handler name used for the consumer destination.
pub const RESCUE_CONSUMER_NAME: &str = "rescue";

/// Result type for rescue operations.
pub type Result<T> = std::result::Result<T, RescueError>;

/// Per-record rescue failures.
#[derive(Debug, thiserror::Error)]
pub enum RescueError {
    #[error("Record {record_id}: payload is not valid JSON: {source}")]
    MalformedPayload {
        record_id: Uuid,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record {record_id}: payload is JSON null")]
    NullPayload { record_id: Uuid },

    #[error("Record {record_id}: forward to rescue queue failed: {source}")]
    Forward {
        record_id: Uuid,
        #[source]
        source: BusError,
    },
}

impl RescueError {
    pub fn record_id(&self) -> Uuid {
        match self {
            Self::MalformedPayload { record_id, .. }
            | Self::NullPayload { record_id }
            | Self::Forward { record_id, .. } => *record_id,
        }
    }
}

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Required field present; nothing forwarded.
    Accepted,
    /// Required field missing; payload forwarded to the rescue queue.
    Rescued { message_id: String },
}

/// Payload re-emitted to the rescue queue.
#[derive(Debug, Clone, PartialEq)]
pub struct RescueRecord {
    /// Id of the record the payload came from.
    pub source_id: Uuid,
    /// The full original payload.
    pub payload: Value,
}

impl RescueRecord {
    /// Queue body: compact JSON of the original payload.
    pub fn to_body(&self) -> Bytes {
        Bytes::from(self.payload.to_string())
    }
}

/// Per-record results for a batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<(Uuid, Result<RecordOutcome>)>,
}

impl BatchReport {
    /// Ids of records that failed and should be redelivered.
    pub fn item_failures(&self) -> Vec<Uuid> {
        self.outcomes
            .iter()
            .filter(|(_, result)| result.is_err())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn rescued(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, r)| matches!(r, Ok(RecordOutcome::Rescued { .. })))
            .count()
    }

    pub fn accepted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, r)| matches!(r, Ok(RecordOutcome::Accepted)))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, r)| r.is_ok())
    }
}

/// Inspects payloads and forwards incomplete ones to the rescue queue.
#[derive(Clone)]
pub struct RescueConsumer {
    queue: Arc<dyn DurableQueue>,
    required_field: String,
}

impl RescueConsumer {
    pub fn new(queue: Arc<dyn DurableQueue>) -> Self {
        Self::with_required_field(queue, DEFAULT_REQUIRED_FIELD)
    }

    pub fn with_required_field(queue: Arc<dyn DurableQueue>, field: impl Into<String>) -> Self {
        let required_field = field.into();
        info!(
            queue = %queue.name(),
            required_field = %required_field,
            "Rescue consumer initialized"
        );
        Self {
            queue,
            required_field,
        }
    }

    pub fn required_field(&self) -> &str {
        &self.required_field
    }

    pub fn queue(&self) -> &Arc<dyn DurableQueue> {
        &self.queue
    }

    /// Inspect one record and forward it if the required field is missing.
    pub async fn handle_record(&self, record_id: Uuid, payload: &[u8]) -> Result<RecordOutcome> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|source| RescueError::MalformedPayload { record_id, source })?;

        let field = match &value {
            Value::Object(fields) => fields.get(&self.required_field),
            Value::Null => return Err(RescueError::NullPayload { record_id }),
            _ => None,
        };

        if !is_missing(field) {
            debug!(record_id = %record_id, field = %self.required_field, "Required field present");
            return Ok(RecordOutcome::Accepted);
        }

        let record = RescueRecord {
            source_id: record_id,
            payload: value,
        };
        let message_id = self
            .queue
            .enqueue(record.to_body())
            .await
            .map_err(|source| RescueError::Forward { record_id, source })?;

        info!(
            record_id = %record_id,
            field = %self.required_field,
            queue = %self.queue.name(),
            message_id = %message_id,
            "Required field missing, payload forwarded to rescue queue"
        );
        Ok(RecordOutcome::Rescued { message_id })
    }

    /// Process a batch, one independent outcome per record.
    pub async fn handle_batch(&self, records: &[Arc<Event>]) -> BatchReport {
        let mut report = BatchReport::default();

        for event in records {
            let result = self.handle_record(event.id(), event.payload()).await;
            if let Err(e) = &result {
                warn!(record_id = %event.id(), error = %e, "Record failed");
            }
            report.outcomes.push((event.id(), result));
        }

        if !report.is_success() {
            warn!(
                records = records.len(),
                failures = report.item_failures().len(),
                "Batch completed with failures"
            );
        }
        report
    }
}

impl EventHandler for RescueConsumer {
    fn name(&self) -> &str {
        RESCUE_CONSUMER_NAME
    }

    fn handle(&self, event: Arc<Event>) -> BoxFuture<'static, std::result::Result<(), BusError>> {
        let consumer = self.clone();
        Box::pin(async move {
            consumer
                .handle_record(event.id(), event.payload())
                .await
                .map(|_| ())
                .map_err(handler_error)
        })
    }

    fn handle_records(
        &self,
        events: Vec<Arc<Event>>,
    ) -> BoxFuture<'static, Vec<(Uuid, std::result::Result<(), BusError>)>> {
        let consumer = self.clone();
        Box::pin(async move {
            consumer
                .handle_batch(&events)
                .await
                .outcomes
                .into_iter()
                .map(|(id, result)| (id, result.map(|_| ()).map_err(handler_error)))
                .collect()
        })
    }
}

fn handler_error(error: RescueError) -> BusError {
    BusError::Handler {
        name: RESCUE_CONSUMER_NAME.to_string(),
        message: error.to_string(),
    }
}

/// Absent, `null`, `false`, `0` and `""` all count as missing.
fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::Array(_)) | Some(Value::Object(_)) => false,
    }
}
