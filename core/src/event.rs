//! Bus envelope and its two wire encodings.
//!
//! Every message on the bus is a `CloudEvent` carried by a [`BusMessage`]. Two
//! encodings are understood:
//!
//! - **Structured**: the whole envelope is a JSON document in the payload and the
//!   message content type is [`STRUCTURED_CONTENT_TYPE`].
//! - **Headers**: each envelope attribute travels as its own header
//!   (`ce_<attr>` or `cloudEvents:<attr>`), and the payload is the bare `data`.
//!
//! Outbound messages are always header-encoded with the `ce_` prefix.
//!
//! # Example
//!
//! ```
//! use concourse_core::event::CloudEvent;
//!
//! let event = CloudEvent::new("Reset", "Controller").with_defaults();
//! assert_eq!(event.specversion, "0.3");
//! assert!(!event.id.is_empty());
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Content type marking a structured (single JSON body) envelope.
pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

/// Content type of controller-originated `data`.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Spec version stamped on controller-originated events.
pub const SPEC_VERSION: &str = "0.3";

/// Header prefix used when encoding (Kafka binding).
pub const HEADER_PREFIX: &str = "ce_";

/// Header prefix accepted when decoding (AMQP binding).
pub const LEGACY_HEADER_PREFIX: &str = "cloudEvents:";

/// Errors raised while decoding an envelope or its data.
#[derive(Error, Debug)]
pub enum CloudEventError {
    /// The structured JSON body could not be parsed.
    #[error("Malformed structured envelope: {0}")]
    MalformedEnvelope(String),

    /// The event carries no `data` but the caller needs one.
    #[error("Event {id} has no data")]
    MissingData {
        /// Id of the offending event
        id: String,
    },

    /// `data` exists but does not have the expected shape.
    #[error("Event {id} has invalid data: {reason}")]
    InvalidData {
        /// Id of the offending event
        id: String,
        /// Deserializer message
        reason: String,
    },
}

/// Raw transport message.
///
/// This is what actually crosses the bus. The controller keeps the inbound
/// message next to the decoded [`CloudEvent`] so the watchdog can republish it
/// byte-for-byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusMessage {
    /// Transport level content type
    pub content_type: Option<String>,
    /// Application headers
    pub headers: BTreeMap<String, String>,
    /// Message body
    pub payload: Vec<u8>,
}

impl BusMessage {
    /// Look up an envelope attribute header under either accepted prefix.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&format!("{HEADER_PREFIX}{name}"))
            .or_else(|| self.headers.get(&format!("{LEGACY_HEADER_PREFIX}{name}")))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Whether the payload holds a structured envelope.
    #[must_use]
    pub fn is_structured(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.eq_ignore_ascii_case(STRUCTURED_CONTENT_TYPE))
    }
}

/// Decoded bus envelope.
///
/// Attribute names follow the serialized form used on the dashboard feed
/// (`type`, `contenttype`, `cause`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudEvent {
    /// Envelope spec version
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub specversion: String,

    /// Event type, e.g. `Order.OrderStatus.OrderReleased`
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub event_type: String,

    /// Originating participant, e.g. `Retailer.north`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,

    /// Subject the event is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Unique event id
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// RFC 3339 timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,

    /// Content type of `data`
    #[serde(
        rename = "contenttype",
        alias = "datacontenttype",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub content_type: Option<String>,

    /// Payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Id of the event this one responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl CloudEvent {
    /// Create an event with a type and source; every other attribute is empty.
    #[must_use]
    pub fn new(event_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
            ..Self::default()
        }
    }

    /// Set the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the JSON data.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Set the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the correlation cause.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Fill the attributes every outbound event must carry.
    ///
    /// Missing spec version becomes `0.3`, a missing id a fresh UUID v4 and a
    /// missing time the current instant (RFC 3339 with nanoseconds).
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        if self.specversion.is_empty() {
            self.specversion = SPEC_VERSION.to_string();
        }
        if self.id.is_empty() {
            self.id = uuid::Uuid::new_v4().to_string();
        }
        if self.time.is_none() {
            self.time = Some(
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
            );
        }
        if self.content_type.is_none() && self.data.is_some() {
            self.content_type = Some(JSON_CONTENT_TYPE.to_string());
        }
        self
    }

    /// The subject, or an empty string.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or_default()
    }

    /// The cause, if present and non-empty.
    #[must_use]
    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref().filter(|c| !c.is_empty())
    }

    /// `data` as a JSON object, when it is one.
    #[must_use]
    pub fn data_object(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref().and_then(Value::as_object)
    }

    /// Deserialize `data` into a typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`CloudEventError::MissingData`] when the event has no data and
    /// [`CloudEventError::InvalidData`] when the data has the wrong shape.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, CloudEventError> {
        let data = self.data.clone().ok_or_else(|| CloudEventError::MissingData {
            id: self.id.clone(),
        })?;
        serde_json::from_value(data).map_err(|e| CloudEventError::InvalidData {
            id: self.id.clone(),
            reason: e.to_string(),
        })
    }

    /// Decode an envelope from a transport message.
    ///
    /// Structured messages are parsed as one JSON document; anything else is
    /// read attribute by attribute from headers. A header-encoded payload that
    /// is not JSON is kept as a string so typed access fails later instead of
    /// losing the whole envelope.
    ///
    /// # Errors
    ///
    /// Returns [`CloudEventError::MalformedEnvelope`] if a structured body is not
    /// a valid envelope.
    pub fn from_message(message: &BusMessage) -> Result<Self, CloudEventError> {
        if message.is_structured() {
            if message.payload.is_empty() {
                return Ok(Self::default());
            }
            return serde_json::from_slice(&message.payload)
                .map_err(|e| CloudEventError::MalformedEnvelope(e.to_string()));
        }

        let attr = |name: &str| message.attribute(name).map(str::to_string);
        let data = if message.payload.is_empty() {
            None
        } else {
            Some(serde_json::from_slice(&message.payload).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&message.payload).into_owned())
            }))
        };

        Ok(Self {
            specversion: attr("specversion").unwrap_or_default(),
            event_type: attr("type").unwrap_or_default(),
            source: attr("source").unwrap_or_default(),
            subject: attr("subject"),
            id: attr("id").unwrap_or_default(),
            time: attr("time"),
            content_type: message.content_type.clone(),
            data,
            cause: attr("cause"),
        })
    }

    /// Encode as a header-encoded transport message.
    #[must_use]
    pub fn to_message(&self) -> BusMessage {
        let mut headers = BTreeMap::new();
        let mut put = |name: &str, value: &str| {
            if !value.is_empty() {
                headers.insert(format!("{HEADER_PREFIX}{name}"), value.to_string());
            }
        };
        put("specversion", &self.specversion);
        put("type", &self.event_type);
        put("source", &self.source);
        put("subject", self.subject());
        put("id", &self.id);
        put("time", self.time.as_deref().unwrap_or_default());
        put("cause", self.cause().unwrap_or_default());

        let payload = self
            .data
            .as_ref()
            .map(|data| data.to_string().into_bytes())
            .unwrap_or_default();

        BusMessage {
            content_type: Some(
                self.content_type
                    .clone()
                    .unwrap_or_else(|| JSON_CONTENT_TYPE.to_string()),
            ),
            headers,
            payload,
        }
    }

    /// Encode as a structured transport message (whole envelope in the body).
    ///
    /// # Errors
    ///
    /// Returns [`CloudEventError::MalformedEnvelope`] if serialization fails.
    pub fn to_structured_message(&self) -> Result<BusMessage, CloudEventError> {
        let payload = serde_json::to_vec(self)
            .map_err(|e| CloudEventError::MalformedEnvelope(e.to_string()))?;
        Ok(BusMessage {
            content_type: Some(STRUCTURED_CONTENT_TYPE.to_string()),
            headers: BTreeMap::new(),
            payload,
        })
    }
}
