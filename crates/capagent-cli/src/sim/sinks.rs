//! Console-backed protocol layer, context store and attachment store.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use capagent_core::{
    AttachmentManager, AttachmentReader, ContextManager, DirectiveHandlerResult,
    ExceptionEncounteredSender, ExceptionErrorType, MessageSender, NamespaceAndName, OutboundEvent,
    SetStateResult, StateProvider, StateRefreshPolicy,
};

/// Prints outbound events as JSON lines on stdout and logs exceptions.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl MessageSender for ConsoleSink {
    fn send_event(&self, event: OutboundEvent) {
        tracing::debug!(
            name = %event.header.name,
            message_id = %event.header.message_id,
            "Event sent"
        );
        println!("{}", event.to_json());
    }
}

impl ExceptionEncounteredSender for ConsoleSink {
    fn send_exception_encountered(
        &self,
        unparsed_directive: &str,
        kind: ExceptionErrorType,
        message: &str,
    ) {
        tracing::warn!(%kind, %message, directive = %unparsed_directive, "ExceptionEncountered");
    }
}

/// Keeps the latest state per entry and the registered providers.
#[derive(Default)]
pub struct InMemoryContext {
    states: Mutex<HashMap<String, String>>,
    providers: Mutex<HashMap<String, Arc<dyn StateProvider>>>,
}

impl InMemoryContext {
    pub fn state(&self, entry: &NamespaceAndName) -> Option<String> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&entry.to_string())
            .cloned()
    }

    /// Ask every provider for fresh state, as a context snapshot would.
    pub fn refresh(&self, request_token: u32) {
        let providers: Vec<_> = self
            .providers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for provider in providers {
            provider.provide_state(request_token);
        }
    }
}

impl ContextManager for InMemoryContext {
    fn set_state_provider(
        &self,
        state: &NamespaceAndName,
        provider: Option<Arc<dyn StateProvider>>,
    ) {
        let mut providers = self.providers.lock().unwrap_or_else(PoisonError::into_inner);
        match provider {
            Some(provider) => providers.insert(state.to_string(), provider),
            None => providers.remove(&state.to_string()),
        };
    }

    fn set_state(
        &self,
        state: &NamespaceAndName,
        json_state: &str,
        refresh_policy: StateRefreshPolicy,
        state_request_token: u32,
    ) -> SetStateResult {
        tracing::debug!(
            entry = %state,
            json = %json_state,
            ?refresh_policy,
            state_request_token,
            "Context updated"
        );
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(state.to_string(), json_state.to_owned());
        SetStateResult::Success
    }
}

/// Attachments keyed by attachment id; each can be read once.
#[derive(Debug, Default)]
pub struct InMemoryAttachments {
    attachments: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryAttachments {
    pub fn insert(&self, attachment_id: impl Into<String>, bytes: Vec<u8>) {
        self.attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(attachment_id.into(), bytes);
    }
}

impl AttachmentManager for InMemoryAttachments {
    fn create_reader(&self, attachment_id: &str) -> Option<Box<dyn AttachmentReader>> {
        let bytes = self
            .attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(attachment_id)?;
        Some(Box::new(Cursor::new(bytes)))
    }
}

/// How a directive ended, as seen by the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Handled(String),
    Failed { message_id: String, description: String },
}

/// Result callback that forwards outcomes to the scenario runner.
pub struct ChannelResult {
    message_id: String,
    outcomes: mpsc::UnboundedSender<Outcome>,
}

impl ChannelResult {
    pub fn new(message_id: impl Into<String>, outcomes: mpsc::UnboundedSender<Outcome>) -> Self {
        Self {
            message_id: message_id.into(),
            outcomes,
        }
    }
}

impl DirectiveHandlerResult for ChannelResult {
    fn report_handled(&self) {
        let _ = self.outcomes.send(Outcome::Handled(self.message_id.clone()));
    }

    fn report_failed(&self, description: &str) {
        let _ = self.outcomes.send(Outcome::Failed {
            message_id: self.message_id.clone(),
            description: description.to_owned(),
        });
    }
}
