//! Protocol-layer ports: outbound events and exception reports.

use crate::domain::ExceptionErrorType;
use crate::events::OutboundEvent;

/// Sends events to the remote service.
///
/// Implementations should queue or hand off; this method should not block.
pub trait MessageSender: Send + Sync {
    fn send_event(&self, event: OutboundEvent);
}

/// Reports directives that could not be processed at all.
pub trait ExceptionEncounteredSender: Send + Sync {
    /// `unparsed_directive` is the directive text as received, or empty when
    /// only its message id is known.
    fn send_exception_encountered(
        &self,
        unparsed_directive: &str,
        kind: ExceptionErrorType,
        message: &str,
    );
}
