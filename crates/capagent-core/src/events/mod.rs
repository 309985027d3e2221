//! Outbound event envelope.
//!
//! Events are what a capability agent sends back to the remote service.
//! Transport and final encoding belong to the [`MessageSender`] adapter; this
//! module only fixes the shape.
//!
//! # Wire Format
//!
//! ```json
//! {
//!   "event": {
//!     "header": { "namespace": "SpeechSynthesizer", "name": "SpeechFinished", "messageId": "..." },
//!     "payload": { "token": "..." }
//!   }
//! }
//! ```
//!
//! [`MessageSender`]: crate::ports::MessageSender

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::{NamespaceAndName, SPEECH_FINISHED, SPEECH_STARTED, TokenPayload};

/// Header identifying an outbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHeader {
    pub namespace: String,
    pub name: String,
    /// Fresh v4 UUID per event.
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialog_request_id: Option<String>,
}

/// An event ready to hand to a [`MessageSender`](crate::ports::MessageSender).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub header: EventHeader,
    pub payload: serde_json::Value,
}

impl OutboundEvent {
    /// Create an event with a freshly generated message id.
    pub fn new(nn: &NamespaceAndName, payload: serde_json::Value) -> Self {
        Self {
            header: EventHeader {
                namespace: nn.namespace.to_string(),
                name: nn.name.to_string(),
                message_id: Uuid::new_v4().to_string(),
                dialog_request_id: None,
            },
            payload,
        }
    }

    /// Create a `SpeechStarted` event.
    pub fn speech_started(token: impl Into<String>) -> Self {
        Self::with_token(&SPEECH_STARTED, token)
    }

    /// Create a `SpeechFinished` event.
    pub fn speech_finished(token: impl Into<String>) -> Self {
        Self::with_token(&SPEECH_FINISHED, token)
    }

    fn with_token(nn: &NamespaceAndName, token: impl Into<String>) -> Self {
        let payload = TokenPayload {
            token: token.into(),
        };
        Self::new(nn, json!(payload))
    }

    /// Whether this event is `namespace.name`.
    pub fn is(&self, nn: &NamespaceAndName) -> bool {
        nn.matches(&self.header.namespace, &self.header.name)
    }

    /// The `token` field of the payload, if present.
    pub fn token(&self) -> Option<&str> {
        self.payload.get("token").and_then(serde_json::Value::as_str)
    }

    /// Wrap in the `{"event": ...}` envelope and serialize.
    pub fn to_json(&self) -> String {
        json!({ "event": self }).to_string()
    }
}
