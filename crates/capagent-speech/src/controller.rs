//! Playback controller: the state owned by the executor thread.
//!
//! Every method here runs on the worker. Callers elsewhere reach it by
//! submitting closures through a [`Spawner<Controller>`](crate::executor::Spawner).
//!
//! ```text
//!   enqueue ──► queue empty? ──► acquire focus
//!                                   │
//!   on_focus_changed ──► execute_state_change
//!        desired PLAYING, idle ──► set_source + play ──► started ──► PLAYING
//!        desired FINISHED, busy ──► stop
//!   finished / stopped / error ──► pop head, IDLE ──► next head | release focus
//! ```

use std::sync::Arc;

use capagent_core::{
    ChannelObserver, ExceptionEncounteredSender, FocusManager, FocusState, MediaErrorKind,
    MediaPlayer, MediaPlayerError, MessageSender, OutboundEvent, PlaybackId,
    SpeechSynthesizerState,
};

use crate::config::{ErrorPolicy, SpeechSynthesizerConfig};
use crate::error::SpeechError;
use crate::focus::{DesiredState, FocusSnapshot};
use crate::queue::PlaybackQueue;
use crate::registry::PendingRegistry;
use crate::reporter::StateReporter;
use crate::request::SpeakRequest;

/// Collaborators the controller calls out to.
pub struct ControllerPorts {
    pub player: Arc<dyn MediaPlayer>,
    pub focus_manager: Arc<dyn FocusManager>,
    pub messages: Arc<dyn MessageSender>,
    pub exceptions: Arc<dyn ExceptionEncounteredSender>,
}

/// The playback handed to the engine for the head of the queue.
#[derive(Debug, Clone, Copy)]
struct Current {
    playback: PlaybackId,
    /// `stop` has been issued; further stop requests are redundant.
    stopping: bool,
}

pub struct Controller {
    config: SpeechSynthesizerConfig,
    ports: ControllerPorts,
    reporter: StateReporter,
    focus: Arc<FocusSnapshot>,
    focus_observer: Arc<dyn ChannelObserver>,
    registry: Arc<PendingRegistry>,
    queue: PlaybackQueue,
    current: Option<Current>,
}

impl Controller {
    pub fn new(
        config: SpeechSynthesizerConfig,
        ports: ControllerPorts,
        reporter: StateReporter,
        focus: Arc<FocusSnapshot>,
        focus_observer: Arc<dyn ChannelObserver>,
        registry: Arc<PendingRegistry>,
    ) -> Self {
        Self {
            config,
            ports,
            reporter,
            focus,
            focus_observer,
            registry,
            queue: PlaybackQueue::new(),
            current: None,
        }
    }

    // ── Admission ──────────────────────────────────────────────────

    /// Queue an admitted request; the first one in an empty queue asks for focus.
    pub fn enqueue(&mut self, request: SpeakRequest) {
        tracing::debug!(
            message_id = %request.message_id(),
            token = %request.token(),
            "Queued Speak"
        );
        if !self.queue.push(request) {
            return;
        }
        match self.focus.current() {
            FocusState::Foreground => self.execute_state_change(),
            _ if self.focus.is_requested() => {}
            _ => self.acquire_focus(),
        }
    }

    /// Cancel a queued request.
    ///
    /// A waiting request is dropped silently. The playing one is stopped with
    /// its notifications suppressed; its stop callback does the bookkeeping.
    pub fn cancel(&mut self, message_id: &str) {
        if self.queue.is_head(message_id) {
            if self.current.is_some() {
                if let Some(head) = self.queue.head_mut() {
                    head.suppress_notifications();
                }
                tracing::debug!(%message_id, "Cancelling current Speak");
                self.stop_current();
                return;
            }
            // Head still waiting for focus.
            drop(self.queue.pop_head());
            tracing::debug!(%message_id, "Cancelled Speak awaiting focus");
            if self.queue.is_empty() {
                self.release_focus();
            } else if self.focus.current() == FocusState::Foreground {
                self.execute_state_change();
            }
            return;
        }

        if self.queue.remove_waiting(message_id).is_some() {
            tracing::debug!(%message_id, "Cancelled queued Speak");
        } else {
            tracing::debug!(%message_id, "Cancel for unknown Speak ignored");
        }
    }

    /// Drop every pending and queued request without reporting, stop
    /// playback and release focus. Used on shutdown and deregistration.
    pub fn cancel_all(&mut self) {
        let pending = self.registry.drain();
        let queued = self.queue.drain();
        tracing::debug!(
            pending = pending.len(),
            queued = queued.len(),
            "Cancelling all Speak requests"
        );
        if let Some(current) = self.current.take() {
            if !current.stopping {
                if let Err(e) = self.ports.player.stop(current.playback) {
                    tracing::warn!(
                        playback = current.playback,
                        error = %e,
                        "Stop failed during cancel"
                    );
                }
            }
        }
        let token = queued.first().map(|r| r.token().to_owned()).unwrap_or_default();
        drop(pending);
        drop(queued);
        self.reporter
            .transition(SpeechSynthesizerState::Idle, &token, 0);
        self.release_focus();
    }

    // ── Focus ──────────────────────────────────────────────────────

    fn acquire_focus(&mut self) {
        self.focus.mark_requested();
        let granted = self.ports.focus_manager.acquire_channel(
            &self.config.channel_name,
            Arc::clone(&self.focus_observer),
            &self.config.activity_id,
        );
        if granted {
            tracing::debug!(channel = %self.config.channel_name, "Focus requested");
        } else {
            self.focus.clear_requested();
            tracing::warn!(
                channel = %self.config.channel_name,
                queued = self.queue.len(),
                "Focus denied; requests stay queued"
            );
        }
    }

    fn release_focus(&mut self) {
        if !self.focus.reset() {
            return;
        }
        tracing::debug!(channel = %self.config.channel_name, "Releasing focus");
        self.ports
            .focus_manager
            .release_channel(&self.config.channel_name, &self.focus_observer);
    }

    /// Reconcile playback with the desired state derived from focus.
    ///
    /// Heads whose playback cannot be started are failed in a loop, so a run
    /// of bad sources never deepens the stack.
    pub fn execute_state_change(&mut self) {
        if self.focus.desired() == DesiredState::Finished {
            self.stop_current();
            return;
        }
        while self.current.is_none() {
            if self.queue.is_empty() {
                self.release_focus();
                return;
            }
            let Err(error) = self.start_head() else {
                return;
            };
            self.drop_failed_head(&error);
            match self.config.error_policy {
                ErrorPolicy::AbortFocusSession => {
                    self.abort_focus_session();
                    return;
                }
                ErrorPolicy::ContinueWithNext => {
                    if self.focus.desired() != DesiredState::Playing {
                        self.advance();
                        return;
                    }
                }
            }
        }
    }

    // ── Engine commands ────────────────────────────────────────────

    /// Hand the head's audio to the engine and play it.
    fn start_head(&mut self) -> Result<(), SpeechError> {
        let Some(head) = self.queue.head_mut() else {
            return Ok(());
        };
        let audio = head.take_audio().ok_or_else(|| {
            SpeechError::playback(
                MediaErrorKind::InternalDeviceError,
                "audio source already consumed",
            )
        })?;
        let message_id = head.message_id().to_owned();

        let playback = self
            .ports
            .player
            .set_source(audio)
            .map_err(|e| SpeechError::playback(kind_of(&e), format!("setSourceFailed: {e}")))?;
        tracing::debug!(%message_id, playback, "Starting speech");

        self.ports
            .player
            .play(playback)
            .map_err(|e| SpeechError::playback(kind_of(&e), format!("playFailed: {e}")))?;
        self.current = Some(Current {
            playback,
            stopping: false,
        });
        Ok(())
    }

    /// Ask the engine to stop the current playback.
    ///
    /// The request stays current until the engine's terminal callback
    /// arrives. A rejected stop does not change that: the engine has already
    /// finished or errored, and that callback is on its way.
    fn stop_current(&mut self) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        if current.stopping {
            return;
        }
        current.stopping = true;
        let playback = current.playback;
        if let Err(e) = self.ports.player.stop(playback) {
            tracing::warn!(playback, error = %e, "Stop rejected; awaiting engine callback");
        }
    }

    // ── Engine callbacks ───────────────────────────────────────────

    fn is_current(&self, playback: PlaybackId) -> bool {
        self.current.is_some_and(|c| c.playback == playback)
    }

    pub fn on_playback_started(&mut self, playback: PlaybackId) {
        if !self.is_current(playback) {
            tracing::trace!(playback, "Ignoring start of stale playback");
            return;
        }
        let Some(token) = self.queue.head().map(|r| r.token().to_owned()) else {
            return;
        };
        let offset = self.offset_ms(playback);
        self.reporter
            .transition(SpeechSynthesizerState::Playing, &token, offset);
        self.ports
            .messages
            .send_event(OutboundEvent::speech_started(token));

        if self.focus.desired() == DesiredState::Finished {
            tracing::debug!(playback, "Focus lost before start; stopping");
            self.stop_current();
        }
    }

    /// Finished and stopped are handled alike.
    pub fn on_playback_done(&mut self, playback: PlaybackId) {
        if !self.is_current(playback) {
            tracing::trace!(playback, "Ignoring completion of stale playback");
            return;
        }
        let offset = self.offset_ms(playback);
        self.current = None;
        let Some(request) = self.queue.pop_head() else {
            return;
        };
        let token = request.token().to_owned();
        request.complete(self.ports.messages.as_ref());
        self.reporter
            .transition(SpeechSynthesizerState::Idle, &token, offset);
        self.advance();
    }

    pub fn on_playback_error(
        &mut self,
        playback: PlaybackId,
        kind: MediaErrorKind,
        message: &str,
    ) {
        if !self.is_current(playback) {
            tracing::trace!(playback, %kind, "Ignoring error of stale playback");
            return;
        }
        self.current = None;
        self.drop_failed_head(&SpeechError::playback(kind, message));
        match self.config.error_policy {
            ErrorPolicy::AbortFocusSession => self.abort_focus_session(),
            ErrorPolicy::ContinueWithNext => self.advance(),
        }
    }

    /// Pop the head and report it as failed.
    fn drop_failed_head(&mut self, error: &SpeechError) {
        let Some(request) = self.queue.pop_head() else {
            return;
        };
        tracing::warn!(message_id = %request.message_id(), %error, "Speech playback failed");

        let token = request.token().to_owned();
        request.fail(&error.to_string(), self.ports.exceptions.as_ref());
        self.reporter
            .transition(SpeechSynthesizerState::Idle, &token, 0);
    }

    /// Give focus back and, if requests remain, start a fresh session.
    fn abort_focus_session(&mut self) {
        self.release_focus();
        if !self.queue.is_empty() {
            self.acquire_focus();
        }
    }

    /// Move on after the head left the queue.
    fn advance(&mut self) {
        if self.queue.is_empty() {
            self.release_focus();
            return;
        }
        match self.focus.current() {
            FocusState::Foreground => self.execute_state_change(),
            // Resumes when the arbiter hands foreground back.
            FocusState::Background => {}
            FocusState::None => {
                if !self.focus.is_requested() {
                    self.acquire_focus();
                }
            }
        }
    }

    // ── Context ────────────────────────────────────────────────────

    pub fn provide_state(&mut self, request_token: u32) {
        let (token, offset) = match (self.current, self.queue.head()) {
            (Some(current), Some(head)) => {
                (head.token().to_owned(), self.offset_ms(current.playback))
            }
            _ => (String::new(), 0),
        };
        self.reporter.answer(request_token, &token, offset);
    }

    pub const fn state(&self) -> SpeechSynthesizerState {
        self.reporter.state()
    }

    /// Message ids in playback order.
    pub fn queued(&self) -> Vec<String> {
        self.queue.message_ids()
    }

    fn offset_ms(&self, playback: PlaybackId) -> u64 {
        u64::try_from(self.ports.player.offset(playback).as_millis()).unwrap_or(u64::MAX)
    }
}

const fn kind_of(error: &MediaPlayerError) -> MediaErrorKind {
    match error {
        MediaPlayerError::InvalidSource(_) | MediaPlayerError::UnknownPlayback(_) => {
            MediaErrorKind::InvalidRequest
        }
        MediaPlayerError::Device(_) => MediaErrorKind::InternalDeviceError,
    }
}
