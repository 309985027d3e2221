//! Recording fakes for the speech synthesizer's collaborators.
//!
//! None of the fakes calls back on its own thread: the test drives engine and
//! focus callbacks explicitly, then [`Harness::settle`] flushes the executor.

#![allow(dead_code)]

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use capagent_core::{
    AttachmentManager, AttachmentReader, ChannelObserver, ContextManager, Directive,
    DirectiveHandler, DirectiveHandlerResult, DirectiveInfo, ExceptionEncounteredSender,
    ExceptionErrorType, FocusManager, FocusState, MediaErrorKind, MediaPlayer, MediaPlayerError,
    MediaPlayerObserver, MessageSender, NamespaceAndName, OutboundEvent, PlaybackId,
    SetStateResult, SpeechSynthesizerObserver, SpeechSynthesizerState, StateProvider,
    StateRefreshPolicy,
};
use capagent_speech::{
    ErrorPolicy, SpeechSynthesizer, SpeechSynthesizerConfig, SpeechSynthesizerPorts,
};

// ── Media player ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCall {
    SetSource(PlaybackId),
    Play(PlaybackId),
    Stop(PlaybackId),
}

/// Engine double. `stop` answers with a stopped callback, like a real engine,
/// unless `defer_stop_callback` is set (the test delivers the terminal
/// callback itself) or `reject_stop` is set (the source already ended and
/// `stop` fails with `UnknownPlayback`).
pub struct FakePlayer {
    calls: Mutex<Vec<PlayerCall>>,
    observers: Mutex<Vec<Arc<dyn MediaPlayerObserver>>>,
    next_id: AtomicU64,
    offset: Mutex<Duration>,
    pub fail_play: AtomicBool,
    pub fail_set_source: AtomicBool,
    pub defer_stop_callback: AtomicBool,
    pub reject_stop: AtomicBool,
}

impl Default for FakePlayer {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            observers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            offset: Mutex::new(Duration::ZERO),
            fail_play: AtomicBool::new(false),
            fail_set_source: AtomicBool::new(false),
            defer_stop_callback: AtomicBool::new(false),
            reject_stop: AtomicBool::new(false),
        }
    }
}

impl FakePlayer {
    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().unwrap().len()
    }

    pub fn set_offset(&self, offset: Duration) {
        *self.offset.lock().unwrap() = offset;
    }

    fn each_observer(&self, f: impl Fn(&dyn MediaPlayerObserver)) {
        let snapshot = self.observers.lock().unwrap().clone();
        for observer in snapshot {
            f(observer.as_ref());
        }
    }

    pub fn started(&self, id: PlaybackId) {
        self.each_observer(|o| o.on_playback_started(id));
    }

    pub fn finished(&self, id: PlaybackId) {
        self.each_observer(|o| o.on_playback_finished(id));
    }

    pub fn stopped(&self, id: PlaybackId) {
        self.each_observer(|o| o.on_playback_stopped(id));
    }

    /// Ids passed to `play`, in order.
    pub fn played(&self) -> Vec<PlaybackId> {
        self.calls()
            .iter()
            .filter_map(|c| match c {
                PlayerCall::Play(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn error(&self, id: PlaybackId, kind: MediaErrorKind, message: &str) {
        self.each_observer(|o| o.on_playback_error(id, kind, message));
    }
}

impl MediaPlayer for FakePlayer {
    fn set_source(
        &self,
        _reader: Box<dyn AttachmentReader>,
    ) -> Result<PlaybackId, MediaPlayerError> {
        if self.fail_set_source.load(Ordering::SeqCst) {
            return Err(MediaPlayerError::InvalidSource("unreadable".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(PlayerCall::SetSource(id));
        Ok(id)
    }

    fn play(&self, id: PlaybackId) -> Result<(), MediaPlayerError> {
        self.calls.lock().unwrap().push(PlayerCall::Play(id));
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(MediaPlayerError::Device("no output device".into()));
        }
        Ok(())
    }

    fn stop(&self, id: PlaybackId) -> Result<(), MediaPlayerError> {
        self.calls.lock().unwrap().push(PlayerCall::Stop(id));
        if self.reject_stop.load(Ordering::SeqCst) {
            return Err(MediaPlayerError::UnknownPlayback(id));
        }
        if !self.defer_stop_callback.load(Ordering::SeqCst) {
            self.stopped(id);
        }
        Ok(())
    }

    fn offset(&self, _id: PlaybackId) -> Duration {
        *self.offset.lock().unwrap()
    }

    fn add_observer(&self, observer: Arc<dyn MediaPlayerObserver>) {
        self.observers.lock().unwrap().push(observer);
    }

    fn remove_observer(&self, observer: &Arc<dyn MediaPlayerObserver>) {
        self.observers
            .lock()
            .unwrap()
            .retain(|o| !Arc::ptr_eq(o, observer));
    }
}

// ── Focus manager ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusCall {
    Acquire { channel: String, activity_id: String },
    Release { channel: String },
}

/// Focus arbiter double. With `auto_grant` set it answers `acquire_channel`
/// synchronously with foreground focus, on the caller's thread.
#[derive(Default)]
pub struct FakeFocusManager {
    calls: Mutex<Vec<FocusCall>>,
    observer: Mutex<Option<Arc<dyn ChannelObserver>>>,
    pub auto_grant: AtomicBool,
    pub deny: AtomicBool,
}

impl FakeFocusManager {
    pub fn calls(&self) -> Vec<FocusCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn acquires(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, FocusCall::Acquire { .. }))
            .count()
    }

    pub fn releases(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, FocusCall::Release { .. }))
            .count()
    }

    /// Deliver a focus change to the last acquiring observer. Blocks until
    /// the synthesizer has acted on it.
    pub fn grant(&self, focus: FocusState) {
        let observer = self.observer.lock().unwrap().clone();
        observer
            .expect("focus was never acquired")
            .on_focus_changed(focus);
    }
}

impl FocusManager for FakeFocusManager {
    fn acquire_channel(
        &self,
        channel: &str,
        observer: Arc<dyn ChannelObserver>,
        activity_id: &str,
    ) -> bool {
        self.calls.lock().unwrap().push(FocusCall::Acquire {
            channel: channel.to_owned(),
            activity_id: activity_id.to_owned(),
        });
        if self.deny.load(Ordering::SeqCst) {
            return false;
        }
        *self.observer.lock().unwrap() = Some(Arc::clone(&observer));
        if self.auto_grant.load(Ordering::SeqCst) {
            observer.on_focus_changed(FocusState::Foreground);
        }
        true
    }

    fn release_channel(&self, channel: &str, _observer: &Arc<dyn ChannelObserver>) -> bool {
        self.calls.lock().unwrap().push(FocusCall::Release {
            channel: channel.to_owned(),
        });
        true
    }
}

// ── Context manager ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePush {
    pub json: String,
    pub policy: StateRefreshPolicy,
    pub request_token: u32,
}

#[derive(Default)]
pub struct FakeContext {
    pushes: Mutex<Vec<StatePush>>,
    provider: Mutex<Option<Arc<dyn StateProvider>>>,
    provider_changes: AtomicUsize,
}

impl FakeContext {
    pub fn pushes(&self) -> Vec<StatePush> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn last_push(&self) -> Option<StatePush> {
        self.pushes.lock().unwrap().last().cloned()
    }

    pub fn has_provider(&self) -> bool {
        self.provider.lock().unwrap().is_some()
    }

    pub fn provider_changes(&self) -> usize {
        self.provider_changes.load(Ordering::SeqCst)
    }

    /// Ask the registered provider for state.
    pub fn request_state(&self, token: u32) {
        let provider = self.provider.lock().unwrap().clone();
        if let Some(provider) = provider {
            provider.provide_state(token);
        }
    }
}

impl ContextManager for FakeContext {
    fn set_state_provider(
        &self,
        _state: &NamespaceAndName,
        provider: Option<Arc<dyn StateProvider>>,
    ) {
        *self.provider.lock().unwrap() = provider;
        self.provider_changes.fetch_add(1, Ordering::SeqCst);
    }

    fn set_state(
        &self,
        _state: &NamespaceAndName,
        json_state: &str,
        refresh_policy: StateRefreshPolicy,
        state_request_token: u32,
    ) -> SetStateResult {
        self.pushes.lock().unwrap().push(StatePush {
            json: json_state.to_owned(),
            policy: refresh_policy,
            request_token: state_request_token,
        });
        SetStateResult::Success
    }
}

// ── Protocol layer ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionReport {
    pub unparsed: String,
    pub kind: ExceptionErrorType,
    pub message: String,
}

#[derive(Default)]
pub struct RecordingSender {
    events: Mutex<Vec<OutboundEvent>>,
    exceptions: Mutex<Vec<ExceptionReport>>,
}

impl RecordingSender {
    /// `(name, token)` of each event sent, in order.
    pub fn events(&self) -> Vec<(String, String)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| {
                (
                    e.header.name.clone(),
                    e.token().unwrap_or_default().to_owned(),
                )
            })
            .collect()
    }

    pub fn exceptions(&self) -> Vec<ExceptionReport> {
        self.exceptions.lock().unwrap().clone()
    }
}

impl MessageSender for RecordingSender {
    fn send_event(&self, event: OutboundEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl ExceptionEncounteredSender for RecordingSender {
    fn send_exception_encountered(
        &self,
        unparsed_directive: &str,
        kind: ExceptionErrorType,
        message: &str,
    ) {
        self.exceptions.lock().unwrap().push(ExceptionReport {
            unparsed: unparsed_directive.to_owned(),
            kind,
            message: message.to_owned(),
        });
    }
}

// ── Attachments ────────────────────────────────────────────────────

/// Serves an empty audio stream for every registered attachment id, once.
#[derive(Default)]
pub struct FakeAttachments {
    available: Mutex<HashSet<String>>,
}

impl FakeAttachments {
    pub fn add(&self, attachment_id: impl Into<String>) {
        self.available.lock().unwrap().insert(attachment_id.into());
    }
}

impl AttachmentManager for FakeAttachments {
    fn create_reader(&self, attachment_id: &str) -> Option<Box<dyn AttachmentReader>> {
        self.available
            .lock()
            .unwrap()
            .remove(attachment_id)
            .then(|| Box::new(Cursor::new(vec![0u8; 16])) as Box<dyn AttachmentReader>)
    }
}

// ── Result and observer ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingResult {
    handled: AtomicUsize,
    failed: Mutex<Vec<String>>,
}

impl RecordingResult {
    pub fn handled(&self) -> usize {
        self.handled.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> Vec<String> {
        self.failed.lock().unwrap().clone()
    }

    /// No report of any kind was made.
    pub fn untouched(&self) -> bool {
        self.handled() == 0 && self.failed().is_empty()
    }
}

impl DirectiveHandlerResult for RecordingResult {
    fn report_handled(&self) {
        self.handled.fetch_add(1, Ordering::SeqCst);
    }

    fn report_failed(&self, description: &str) {
        self.failed.lock().unwrap().push(description.to_owned());
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    states: Mutex<Vec<SpeechSynthesizerState>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<SpeechSynthesizerState> {
        self.states.lock().unwrap().clone()
    }
}

impl SpeechSynthesizerObserver for RecordingObserver {
    fn on_state_changed(&self, state: SpeechSynthesizerState) {
        self.states.lock().unwrap().push(state);
    }
}

// ── Harness ────────────────────────────────────────────────────────

pub struct Harness {
    pub agent: Arc<SpeechSynthesizer>,
    pub player: Arc<FakePlayer>,
    pub focus: Arc<FakeFocusManager>,
    pub context: Arc<FakeContext>,
    pub sender: Arc<RecordingSender>,
    pub attachments: Arc<FakeAttachments>,
    pub observer: Arc<RecordingObserver>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SpeechSynthesizerConfig::default())
    }

    pub fn with_policy(policy: ErrorPolicy) -> Self {
        Self::with_config(SpeechSynthesizerConfig::default().with_error_policy(policy))
    }

    pub fn with_config(config: SpeechSynthesizerConfig) -> Self {
        let player = Arc::new(FakePlayer::default());
        let focus = Arc::new(FakeFocusManager::default());
        let context = Arc::new(FakeContext::default());
        let sender = Arc::new(RecordingSender::default());
        let attachments = Arc::new(FakeAttachments::default());
        let observer = Arc::new(RecordingObserver::default());

        let agent = SpeechSynthesizer::create(
            config,
            SpeechSynthesizerPorts {
                player: player.clone(),
                focus_manager: focus.clone(),
                context: context.clone(),
                messages: sender.clone(),
                exceptions: sender.clone(),
                attachments: attachments.clone(),
            },
        )
        .unwrap();
        agent.add_observer(observer.clone());

        Self {
            agent,
            player,
            focus,
            context,
            sender,
            attachments,
            observer,
        }
    }

    /// A valid Speak directive whose audio attachment is available.
    pub fn speak(&self, message_id: &str, token: &str) -> Directive {
        self.attachments.add(format!("{message_id}:audio"));
        speak_directive(message_id, token)
    }

    /// `pre_handle` + `handle` a valid Speak; returns its result recorder.
    pub fn admit(&self, message_id: &str, token: &str) -> Arc<RecordingResult> {
        let result = self.pre_handle(message_id, token);
        self.agent.handle_directive(message_id).unwrap();
        result
    }

    pub fn pre_handle(&self, message_id: &str, token: &str) -> Arc<RecordingResult> {
        let result = Arc::new(RecordingResult::default());
        self.agent
            .pre_handle_directive(DirectiveInfo::new(
                self.speak(message_id, token),
                Some(result.clone()),
            ))
            .unwrap();
        result
    }

    /// Let every task, and the tasks those tasks queue, run.
    pub fn settle(&self) {
        for _ in 0..5 {
            self.agent.wait_until_idle();
        }
    }
}

pub fn speak_directive(message_id: &str, token: &str) -> Directive {
    Directive::new(
        "SpeechSynthesizer",
        "Speak",
        message_id,
        format!(r#"{{"token":"{token}","format":"AUDIO_MPEG","url":"cid:audio"}}"#),
    )
}

pub fn event(name: &str, token: &str) -> (String, String) {
    (name.to_owned(), token.to_owned())
}
