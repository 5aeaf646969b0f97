//! Published events.
//!
//! An [`Event`] is the unit the router fans out: a set of classification
//! attributes plus an opaque payload. Events are built once by the publisher
//! and shared between destinations as `Arc<Event>`; nothing mutates them after
//! publish.
//!
//! ## Wire Format
//!
//! Queues carry events as a JSON envelope:
//!
//! ```json
//! {"id": "...", "attributes": {"country": "France"}, "payload": "{\"email\":null}"}
//! ```
//!
//! Payloads that are not valid UTF-8 are base64-encoded and flagged with
//! `"encoding": "base64"`.

use std::collections::HashMap;

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Attribute carrying the country of origin in the calibration topology.
pub const COUNTRY_ATTR: &str = "country";

/// Errors encoding or decoding the queue envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("Invalid envelope JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// An immutable published event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    id: Uuid,
    attributes: HashMap<String, String>,
    payload: Bytes,
}

impl Event {
    /// Create an event with a fresh id and no attributes.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            id: Uuid::new_v4(),
            attributes: HashMap::new(),
            payload: payload.into(),
        }
    }

    /// Create an event from an attribute map.
    pub fn with_attributes(attributes: HashMap<String, String>, payload: impl Into<Bytes>) -> Self {
        Self {
            id: Uuid::new_v4(),
            attributes,
            payload: payload.into(),
        }
    }

    /// Add a classification attribute (builder style, before publish).
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Override the generated id. Used when rehydrating a redelivered message.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    /// Look up a single attribute value.
    pub fn attribute_value(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Serialize to the queue envelope.
    pub fn encode(&self) -> Result<Bytes, EnvelopeError> {
        let (payload, encoding) = match std::str::from_utf8(&self.payload) {
            Ok(text) => (text.to_string(), PayloadEncoding::Utf8),
            Err(_) => (BASE64_STANDARD.encode(&self.payload), PayloadEncoding::Base64),
        };

        let envelope = Envelope {
            id: self.id,
            attributes: self.attributes.clone(),
            payload,
            encoding,
        };
        Ok(Bytes::from(serde_json::to_vec(&envelope)?))
    }

    /// Deserialize from the queue envelope.
    pub fn decode(data: &[u8]) -> Result<Self, EnvelopeError> {
        let envelope: Envelope = serde_json::from_slice(data)?;
        let payload = match envelope.encoding {
            PayloadEncoding::Utf8 => Bytes::from(envelope.payload),
            PayloadEncoding::Base64 => Bytes::from(BASE64_STANDARD.decode(envelope.payload)?),
        };

        Ok(Self {
            id: envelope.id,
            attributes: envelope.attributes,
            payload,
        })
    }

    /// Build an event from one line of publisher input.
    ///
    /// Accepts either `{"attributes": {...}, "payload": ...}` or a bare JSON
    /// object, in which case its `country` field (if a string) becomes the
    /// country attribute and the line itself is the payload. A string
    /// `payload` is used verbatim; anything else is re-serialized.
    pub fn from_input_line(line: &str) -> Result<Self, EnvelopeError> {
        let value: serde_json::Value = serde_json::from_str(line)?;

        if let Ok(input) = serde_json::from_value::<PublishInput>(value.clone()) {
            let payload = match input.payload {
                serde_json::Value::String(text) => Bytes::from(text),
                other => Bytes::from(serde_json::to_vec(&other)?),
            };
            return Ok(Self::with_attributes(input.attributes, payload));
        }

        let mut event = Self::new(Bytes::from(line.trim().to_string()));
        if let Some(country) = value.get(COUNTRY_ATTR).and_then(|v| v.as_str()) {
            event = event.attribute(COUNTRY_ATTR, country);
        }
        Ok(event)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PublishInput {
    attributes: HashMap<String, String>,
    payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PayloadEncoding {
    #[default]
    Utf8,
    Base64,
}

impl PayloadEncoding {
    fn is_utf8(&self) -> bool {
        matches!(self, Self::Utf8)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    id: Uuid,
    #[serde(default)]
    attributes: HashMap<String, String>,
    payload: String,
    #[serde(default, skip_serializing_if = "PayloadEncoding::is_utf8")]
    encoding: PayloadEncoding,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_lookup() {
        let event = Event::new("{}").attribute(COUNTRY_ATTR, "Ireland");

        assert_eq!(event.attribute_value(COUNTRY_ATTR), Some("Ireland"));
        assert_eq!(event.attribute_value("region"), None);
    }

    #[test]
    fn test_envelope_keeps_json_payload_readable() {
        let event = Event::new(r#"{"country":"France"}"#).attribute(COUNTRY_ATTR, "France");

        let encoded = event.encode().unwrap();
        let raw: serde_json::Value = serde_json::from_slice(&encoded).unwrap();

        assert_eq!(raw["payload"], r#"{"country":"France"}"#);
        assert!(raw.get("encoding").is_none());
        assert_eq!(Event::decode(&encoded).unwrap(), event);
    }

    #[test]
    fn test_envelope_base64_for_binary_payload() {
        let event = Event::new(vec![0xff, 0xfe, 0x00]);

        let encoded = event.encode().unwrap();
        let raw: serde_json::Value = serde_json::from_slice(&encoded).unwrap();

        assert_eq!(raw["encoding"], "base64");
        assert_eq!(Event::decode(&encoded).unwrap().payload().as_ref(), &[0xff, 0xfe, 0x00]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Event::decode(b"not an envelope"),
            Err(EnvelopeError::Json(_))
        ));
    }

    #[test]
    fn test_input_line_with_explicit_attributes() {
        let event = Event::from_input_line(
            r#"{"attributes":{"country":"China"},"payload":{"name":"Li"}}"#,
        )
        .unwrap();

        assert_eq!(event.attribute_value(COUNTRY_ATTR), Some("China"));
        assert_eq!(event.payload().as_ref(), br#"{"name":"Li"}"#);
    }

    #[test]
    fn test_input_line_bare_object_uses_country_field() {
        let line = r#"{"country":"France","email":"a@b.com"}"#;

        let event = Event::from_input_line(line).unwrap();

        assert_eq!(event.attribute_value(COUNTRY_ATTR), Some("France"));
        assert_eq!(event.payload().as_ref(), line.as_bytes());
    }

    #[test]
    fn test_input_line_without_country_has_no_attributes() {
        let event = Event::from_input_line(r#"{"email":"a@b.com"}"#).unwrap();

        assert!(event.attributes().is_empty());
    }
}
