//! State reporting: observer notifications and the `SpeechState` context entry.

use std::sync::{Arc, Mutex, PoisonError};

use capagent_core::domain::SPEECH_STATE;
use capagent_core::{
    ContextManager, SetStateResult, SpeechState, SpeechSynthesizerObserver, SpeechSynthesizerState,
    StateRefreshPolicy,
};

/// Registered [`SpeechSynthesizerObserver`]s.
///
/// Notifications iterate over a snapshot, so observers may be added or
/// removed from any thread while a notification is in flight.
#[derive(Default)]
pub struct ObserverSet {
    observers: Mutex<Vec<Arc<dyn SpeechSynthesizerObserver>>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `observer`. Adding the same handle twice is a no-op.
    pub fn add(&self, observer: Arc<dyn SpeechSynthesizerObserver>) {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        if !observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            observers.push(observer);
        }
    }

    /// Returns whether `observer` was registered.
    pub fn remove(&self, observer: &Arc<dyn SpeechSynthesizerObserver>) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|o| !Arc::ptr_eq(o, observer));
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn notify(&self, state: SpeechSynthesizerState) {
        let snapshot = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in snapshot {
            observer.on_state_changed(state);
        }
    }
}

/// Owns the externally visible state and publishes every transition.
///
/// Lives on the executor, so transitions are published in order and never
/// concurrently.
pub struct StateReporter {
    context: Arc<dyn ContextManager>,
    observers: Arc<ObserverSet>,
    state: SpeechSynthesizerState,
}

impl StateReporter {
    pub fn new(context: Arc<dyn ContextManager>, observers: Arc<ObserverSet>) -> Self {
        Self {
            context,
            observers,
            state: SpeechSynthesizerState::Idle,
        }
    }

    pub const fn state(&self) -> SpeechSynthesizerState {
        self.state
    }

    /// Move to `state`, notify observers and push the context entry.
    /// Repeating the current state publishes nothing.
    pub fn transition(&mut self, state: SpeechSynthesizerState, token: &str, offset_ms: u64) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = %self.state, to = %state, %token, "Speech state changed");
        self.state = state;
        self.observers.notify(state);
        self.push(token, offset_ms, 0);
    }

    /// Answer a context request with `request_token`.
    pub fn answer(&self, request_token: u32, token: &str, offset_ms: u64) {
        self.push(token, offset_ms, request_token);
    }

    const fn refresh_policy(&self) -> StateRefreshPolicy {
        match self.state {
            SpeechSynthesizerState::Playing => StateRefreshPolicy::Always,
            SpeechSynthesizerState::Idle => StateRefreshPolicy::Never,
        }
    }

    fn push(&self, token: &str, offset_ms: u64, request_token: u32) {
        let json = SpeechState {
            token: token.to_owned(),
            offset_in_milliseconds: offset_ms,
        }
        .to_json();
        let result =
            self.context
                .set_state(&SPEECH_STATE, &json, self.refresh_policy(), request_token);
        if result != SetStateResult::Success {
            tracing::warn!(?result, request_token, "Context store rejected SpeechState");
        }
    }
}
