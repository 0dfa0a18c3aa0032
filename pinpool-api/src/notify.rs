//! # Notifications
//!
//! Wire format exchanged with external observers.
//!
//! Outbound, from the pool to every connected observer:
//! `{"status": 200, "message": "Some message", "state": {}}`. Exactly one of
//! `message` and `state` is set, so observers that did not issue a command can
//! still tell what changed.
//!
//! Inbound, from an observer: any JSON object. `{"command": "pause"}` and
//! `{"command": "resume"}` control the pool; everything else is passed through
//! untouched for task submission.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::NotificationError;

/// A status update broadcast to observers.
///
/// Deserialization goes through [`Notification::new`], so a decoded
/// notification always carries exactly one body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNotification")]
pub struct Notification {
    status: u16,
    message: Option<String>,
    state: Option<Value>,
}

/// Unchecked wire shape of a [`Notification`].
#[derive(Deserialize)]
struct RawNotification {
    status: u16,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    state: Option<Value>,
}

impl TryFrom<RawNotification> for Notification {
    type Error = NotificationError;

    fn try_from(raw: RawNotification) -> Result<Self, Self::Error> {
        Notification::new(raw.status, raw.message, raw.state)
    }
}

impl Notification {
    /// Build a notification, checking that exactly one body is present.
    ///
    /// A JSON `null` state serializes the same as no state, so it counts as absent.
    pub fn new(
        status: u16,
        message: Option<String>,
        state: Option<Value>,
    ) -> Result<Self, NotificationError> {
        let state = state.filter(|value| !value.is_null());
        match (&message, &state) {
            (None, None) => Err(NotificationError::MissingBody),
            (Some(_), Some(_)) => Err(NotificationError::AmbiguousBody),
            _ => Ok(Self { status, message, state }),
        }
    }

    pub fn message(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
            state: None,
        }
    }

    /// State notification. Fails with `MissingBody` for a `null` state.
    pub fn state(status: u16, state: Value) -> Result<Self, NotificationError> {
        Self::new(status, None, Some(state))
    }

    /// State notification from a JSON object, which can never be empty on the wire.
    pub fn state_map(status: u16, state: Map<String, Value>) -> Self {
        Self {
            status,
            message: None,
            state: Some(Value::Object(state)),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn message_text(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn state_value(&self) -> Option<&Value> {
        self.state.as_ref()
    }

    /// Serialize to the JSON text sent over the wire.
    pub fn to_json(&self) -> String {
        // A struct of a u16, a string and a JSON value cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

/// Receives pool events for broadcast to observers.
pub trait NotificationSink: Send + Sync + fmt::Debug {
    fn notify(&self, notification: Notification);
}

/// Control command decoded from an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundCommand {
    Pause,
    Resume,
    /// Anything that is not a pool control command, passed through unmodified.
    Other(Value),
}

impl InboundCommand {
    /// Decode raw message text received from an observer.
    pub fn parse(raw: &str) -> Result<Self, NotificationError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| NotificationError::InvalidJson(e.to_string()))?;
        Ok(Self::from_value(value))
    }

    pub fn from_value(value: Value) -> Self {
        match value.get("command").and_then(Value::as_str) {
            Some("pause") => Self::Pause,
            Some("resume") => Self::Resume,
            _ => Self::Other(value),
        }
    }
}
