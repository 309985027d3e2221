//! Directive envelope and handler configuration.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::NamespaceAndName;
use crate::ports::DirectiveHandlerResult;

/// An inbound instruction from the remote service.
///
/// The payload is kept as the raw JSON text: each capability agent parses
/// only the fields it understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    namespace: String,
    name: String,
    message_id: String,
    dialog_request_id: Option<String>,
    payload: String,
    unparsed: String,
}

impl Directive {
    /// Create a directive, synthesizing the unparsed envelope text from its parts.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        message_id: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        let namespace = namespace.into();
        let name = name.into();
        let message_id = message_id.into();
        let payload = payload.into();
        let unparsed = envelope_text(&namespace, &name, &message_id, None, &payload);
        Self {
            namespace,
            name,
            message_id,
            dialog_request_id: None,
            payload,
            unparsed,
        }
    }

    /// Attach the dialog request id this directive answers.
    #[must_use]
    pub fn with_dialog_request_id(mut self, dialog_request_id: impl Into<String>) -> Self {
        let id = dialog_request_id.into();
        self.unparsed = envelope_text(
            &self.namespace,
            &self.name,
            &self.message_id,
            Some(&id),
            &self.payload,
        );
        self.dialog_request_id = Some(id);
        self
    }

    /// Replace the synthesized envelope with the exact text received on the wire.
    #[must_use]
    pub fn with_unparsed(mut self, unparsed: impl Into<String>) -> Self {
        self.unparsed = unparsed.into();
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique id of this directive; used as the correlation key by handlers.
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn dialog_request_id(&self) -> Option<&str> {
        self.dialog_request_id.as_deref()
    }

    /// Raw JSON payload text.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Full envelope text, forwarded verbatim in exception reports.
    pub fn unparsed(&self) -> &str {
        &self.unparsed
    }

    /// Whether this directive is `namespace.name`.
    pub fn is(&self, nn: &NamespaceAndName) -> bool {
        nn.matches(&self.namespace, &self.name)
    }
}

fn envelope_text(
    namespace: &str,
    name: &str,
    message_id: &str,
    dialog_request_id: Option<&str>,
    payload: &str,
) -> String {
    // Embed the payload as JSON when it parses, otherwise as an opaque string.
    let payload = serde_json::from_str::<serde_json::Value>(payload)
        .unwrap_or_else(|_| serde_json::Value::String(payload.to_owned()));
    let mut header = json!({
        "namespace": namespace,
        "name": name,
        "messageId": message_id,
    });
    if let Some(id) = dialog_request_id {
        header["dialogRequestId"] = json!(id);
    }
    json!({ "directive": { "header": header, "payload": payload } }).to_string()
}

/// A directive paired with the callback used to report how handling went.
///
/// `result` is absent for directives handled immediately, which bypass the
/// sequencer's completion tracking.
#[derive(Clone)]
pub struct DirectiveInfo {
    pub directive: Arc<Directive>,
    pub result: Option<Arc<dyn DirectiveHandlerResult>>,
}

impl DirectiveInfo {
    pub fn new(directive: Directive, result: Option<Arc<dyn DirectiveHandlerResult>>) -> Self {
        Self {
            directive: Arc::new(directive),
            result,
        }
    }

    /// Correlation key of the wrapped directive.
    pub fn message_id(&self) -> &str {
        self.directive.message_id()
    }
}

impl fmt::Debug for DirectiveInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveInfo")
            .field("directive", &self.directive)
            .field("has_result", &self.result.is_some())
            .finish()
    }
}

/// How a sequencer must schedule directives routed to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockingPolicy {
    /// Subsequent directives wait until this one completes.
    Blocking,
    /// Subsequent directives may be handled while this one runs.
    NonBlocking,
    /// The handler does not accept this directive.
    None,
}

/// Directives a handler accepts, keyed by namespace/name.
pub type DirectiveHandlerConfiguration = HashMap<NamespaceAndName, BlockingPolicy>;
