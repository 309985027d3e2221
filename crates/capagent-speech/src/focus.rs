//! Focus client: the synthesizer's side of the audio focus protocol.
//!
//! The arbiter calls [`FocusClient::on_focus_changed`] on its own thread.
//! The new focus is recorded in a [`FocusSnapshot`] right away, then the
//! state-change task is queued on the executor and the caller is held until
//! it has run. Calls made from the executor thread itself (an arbiter that
//! answers synchronously inside `acquire_channel`) only queue the task.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use capagent_core::{ChannelObserver, FocusState};

use crate::controller::Controller;
use crate::executor::Spawner;

/// Where playback should be heading given the current focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DesiredState {
    Playing,
    #[default]
    Finished,
}

impl DesiredState {
    /// Only foreground focus allows speech.
    pub const fn for_focus(focus: FocusState) -> Self {
        match focus {
            FocusState::Foreground => Self::Playing,
            FocusState::Background | FocusState::None => Self::Finished,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct FocusInner {
    current: FocusState,
    desired: DesiredState,
    /// `acquire_channel` was called and focus has not been released since.
    requested: bool,
}

/// Focus state shared between the arbiter's thread and the executor.
///
/// The lock is held only for field reads and writes, never across a call
/// into a collaborator.
#[derive(Debug, Default)]
pub struct FocusSnapshot {
    inner: Mutex<FocusInner>,
}

impl FocusSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FocusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> FocusState {
        self.lock().current
    }

    pub fn desired(&self) -> DesiredState {
        self.lock().desired
    }

    pub fn is_requested(&self) -> bool {
        self.lock().requested
    }

    /// Record a focus change from the arbiter.
    pub fn set_focus(&self, focus: FocusState) {
        let mut inner = self.lock();
        inner.current = focus;
        inner.desired = DesiredState::for_focus(focus);
        if focus == FocusState::None {
            inner.requested = false;
        }
    }

    pub fn mark_requested(&self) {
        self.lock().requested = true;
    }

    pub fn clear_requested(&self) {
        self.lock().requested = false;
    }

    /// Forget all focus. Returns whether focus was held or requested, i.e.
    /// whether the arbiter needs to hear about a release.
    pub fn reset(&self) -> bool {
        let mut inner = self.lock();
        let held = inner.requested || inner.current != FocusState::None;
        *inner = FocusInner::default();
        held
    }
}

/// [`ChannelObserver`] registered with the focus arbiter.
pub struct FocusClient {
    snapshot: Arc<FocusSnapshot>,
    spawner: Spawner<Controller>,
}

impl FocusClient {
    pub const fn new(snapshot: Arc<FocusSnapshot>, spawner: Spawner<Controller>) -> Self {
        Self { snapshot, spawner }
    }
}

impl ChannelObserver for FocusClient {
    fn on_focus_changed(&self, new_focus: FocusState) {
        self.snapshot.set_focus(new_focus);
        tracing::debug!(focus = %new_focus, "Focus changed");

        if self.spawner.is_worker_thread() {
            self.spawner.submit(Controller::execute_state_change);
        } else if self
            .spawner
            .submit_and_wait(Controller::execute_state_change)
            .is_none()
        {
            tracing::debug!(focus = %new_focus, "Focus change arrived after shutdown");
        }
    }
}

impl fmt::Debug for FocusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FocusClient")
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}
