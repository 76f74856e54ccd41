//! Wire envelope for the live-update protocol.
//!
//! Every frame, in both directions, is one JSON object of the shape
//! `{ "type": string, "data": any }`. The client originates only the
//! `subscribe`, `unsubscribe` and `ping` control frames; everything inbound
//! is routed by its tag.

use bon::Builder;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::types::{Channel, EventType};

/// One unit of wire traffic: a type tag plus an opaque payload.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
pub struct Frame {
    /// The frame's type tag
    #[serde(rename = "type")]
    pub event: EventType,
    /// Event-specific payload; `null` when the frame carries none
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    /// Control frame subscribing to a channel.
    #[must_use]
    pub fn subscribe(channel: &Channel) -> Self {
        Self {
            event: EventType::Subscribe,
            data: json!({ "channel": channel }),
        }
    }

    /// Control frame unsubscribing from a channel.
    #[must_use]
    pub fn unsubscribe(channel: &Channel) -> Self {
        Self {
            event: EventType::Unsubscribe,
            data: json!({ "channel": channel }),
        }
    }

    /// Keep-alive control frame stamped with the current unix time in
    /// milliseconds.
    #[must_use]
    pub fn ping() -> Self {
        Self {
            event: EventType::Ping,
            data: json!({ "timestamp": Utc::now().timestamp_millis() }),
        }
    }

    /// Parse an inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns the underlying deserialization error when the text is not a
    /// JSON object carrying a string `type` field. Callers drop and count
    /// such frames instead of surfacing them.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serialize this frame for the wire.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized, which only
    /// happens for non-string map keys and similar pathological values.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
