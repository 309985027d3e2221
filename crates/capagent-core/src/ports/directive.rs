//! Directive handling port: the surface a sequencer drives.
//!
//! Handling is two-phase: [`DirectiveHandler::pre_handle_directive`] registers
//! and validates, [`DirectiveHandler::handle_directive`] admits the directive
//! for execution once the sequencer decides it may run. Directives that skip
//! sequencing go through [`DirectiveHandler::handle_directive_immediately`].

use std::sync::Arc;

use thiserror::Error;

use crate::domain::{Directive, DirectiveHandlerConfiguration, DirectiveInfo};

/// Reports how handling of one directive ended.
///
/// Implementations may assume each method is called at most once, and never
/// both, per directive.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait DirectiveHandlerResult: Send + Sync {
    /// Handling finished successfully.
    fn report_handled(&self);

    /// Handling failed; `description` is a human-readable reason.
    fn report_failed(&self, description: &str);
}

/// Errors a handler returns synchronously from admission calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    /// A required payload property is missing or unusable.
    #[error("Malformed payload for {message_id}: {property}")]
    MalformedPayload {
        message_id: String,
        property: &'static str,
    },

    /// A directive with this message id is already pre-handled.
    #[error("Directive {0} is already registered")]
    DuplicateKey(String),

    /// No pre-handled directive with this message id.
    #[error("Unknown directive {0}")]
    UnknownKey(String),

    /// The handler does not accept this namespace/name.
    #[error("Unsupported directive {0}")]
    Unsupported(String),

    /// The handler has shut down.
    #[error("Handler is shut down")]
    ShutDown,
}

/// A capability agent that accepts directives from a sequencer.
pub trait DirectiveHandler: Send + Sync {
    /// Directives this handler accepts, with their blocking policies.
    fn configuration(&self) -> DirectiveHandlerConfiguration;

    /// Handle `directive` right away, with no result reporting.
    fn handle_directive_immediately(&self, directive: Arc<Directive>) -> Result<(), DirectiveError>;

    /// Validate and register a directive ahead of handling.
    fn pre_handle_directive(&self, info: DirectiveInfo) -> Result<(), DirectiveError>;

    /// Admit a previously pre-handled directive for execution.
    fn handle_directive(&self, message_id: &str) -> Result<(), DirectiveError>;

    /// Cancel a pre-handled or admitted directive. Unknown ids are ignored.
    fn cancel_directive(&self, message_id: &str);

    /// The handler was removed from its sequencer; drop all outstanding work.
    fn on_deregistered(&self);
}

/// A component owning threads or external registrations that must be torn
/// down explicitly.
pub trait RequiresShutdown: Send + Sync {
    /// Name used in shutdown logs.
    fn name(&self) -> &str;

    /// Release everything and stop accepting work. Idempotent.
    fn shutdown(&self);

    fn is_shutdown(&self) -> bool;
}
