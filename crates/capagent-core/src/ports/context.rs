//! Context store port.
//!
//! The context manager aggregates state entries from every agent and attaches
//! them to outgoing requests. Agents push updates with [`ContextManager::set_state`]
//! and answer on-demand refreshes through [`StateProvider::provide_state`].

use std::sync::Arc;

use crate::domain::NamespaceAndName;

/// Whether the context manager should poll the provider before each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateRefreshPolicy {
    /// State changes continuously (e.g. playback offset); always ask.
    Always,
    /// The last pushed value stays valid until the next push.
    Never,
}

/// Outcome of a [`ContextManager::set_state`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetStateResult {
    Success,
    /// The request identified by the token already timed out.
    StateProviderTimedOut,
    /// The token does not match the outstanding request.
    StateTokenOutdated,
}

/// Answers state refresh requests from the context manager.
pub trait StateProvider: Send + Sync {
    /// Provide the current state, tagged with `state_request_token`.
    ///
    /// Implementations may answer asynchronously by calling
    /// [`ContextManager::set_state`] with the same token later.
    fn provide_state(&self, state_request_token: u32);
}

/// The context store.
pub trait ContextManager: Send + Sync {
    /// Register (`Some`) or deregister (`None`) the provider for an entry.
    fn set_state_provider(
        &self,
        state: &NamespaceAndName,
        provider: Option<Arc<dyn StateProvider>>,
    );

    /// Store `json_state` for an entry.
    ///
    /// A `state_request_token` of `0` marks an unsolicited update.
    fn set_state(
        &self,
        state: &NamespaceAndName,
        json_state: &str,
        refresh_policy: StateRefreshPolicy,
        state_request_token: u32,
    ) -> SetStateResult;
}
