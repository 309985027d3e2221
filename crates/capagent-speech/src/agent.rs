//! The `SpeechSynthesizer` capability agent.
//!
//! [`SpeechSynthesizer`] is the public handle. It validates directives on the
//! caller's thread, keeps pre-handled requests in a [`PendingRegistry`] and
//! forwards everything else to the [`Controller`] on the executor thread.
//!
//! Two small adapters connect the executor to the outside world:
//!
//! - [`PlayerCallbacks`] turns engine callbacks into executor tasks.
//! - [`StateRequests`] turns context requests into executor tasks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use capagent_core::domain::{SPEAK, SPEECH_STATE};
use capagent_core::{
    AttachmentManager, BlockingPolicy, ChannelObserver, ContextManager, Directive, DirectiveError,
    DirectiveHandler, DirectiveHandlerConfiguration, DirectiveHandlerResult, DirectiveInfo,
    ExceptionEncounteredSender, ExceptionErrorType, FocusManager, MediaErrorKind, MediaPlayer,
    MediaPlayerObserver, MessageSender, PlaybackId, RequiresShutdown, SpeechSynthesizerObserver,
    SpeechSynthesizerState, StateProvider,
};

use crate::config::SpeechSynthesizerConfig;
use crate::controller::{Controller, ControllerPorts};
use crate::error::SpeechError;
use crate::executor::{self, Executor, Spawner};
use crate::focus::{FocusClient, FocusSnapshot};
use crate::registry::PendingRegistry;
use crate::reporter::{ObserverSet, StateReporter};
use crate::request::SpeakRequest;

const AGENT_NAME: &str = "SpeechSynthesizer";

/// External collaborators of a [`SpeechSynthesizer`].
#[derive(Clone)]
pub struct SpeechSynthesizerPorts {
    pub player: Arc<dyn MediaPlayer>,
    pub focus_manager: Arc<dyn FocusManager>,
    pub context: Arc<dyn ContextManager>,
    pub messages: Arc<dyn MessageSender>,
    pub exceptions: Arc<dyn ExceptionEncounteredSender>,
    pub attachments: Arc<dyn AttachmentManager>,
}

// ── Adapters ───────────────────────────────────────────────────────

/// Engine observer registered with the [`MediaPlayer`].
struct PlayerCallbacks {
    spawner: Spawner<Controller>,
}

impl MediaPlayerObserver for PlayerCallbacks {
    fn on_playback_started(&self, id: PlaybackId) {
        self.spawner.submit(move |c| c.on_playback_started(id));
    }

    fn on_playback_finished(&self, id: PlaybackId) {
        self.spawner.submit(move |c| c.on_playback_done(id));
    }

    fn on_playback_stopped(&self, id: PlaybackId) {
        self.spawner.submit(move |c| c.on_playback_done(id));
    }

    fn on_playback_error(&self, id: PlaybackId, kind: MediaErrorKind, message: &str) {
        let message = message.to_owned();
        self.spawner
            .submit(move |c| c.on_playback_error(id, kind, &message));
    }
}

/// `SpeechState` provider registered with the [`ContextManager`].
struct StateRequests {
    spawner: Spawner<Controller>,
}

impl StateProvider for StateRequests {
    fn provide_state(&self, state_request_token: u32) {
        self.spawner
            .submit(move |c| c.provide_state(state_request_token));
    }
}

// ── SpeechSynthesizer ──────────────────────────────────────────────

/// Speaks `SpeechSynthesizer.Speak` directives one at a time, holding the
/// configured focus channel while anything is queued.
///
/// All methods may be called from any thread. Only focus changes block the
/// caller; everything else returns once the work is queued.
pub struct SpeechSynthesizer {
    config: SpeechSynthesizerConfig,
    player: Arc<dyn MediaPlayer>,
    context: Arc<dyn ContextManager>,
    exceptions: Arc<dyn ExceptionEncounteredSender>,
    attachments: Arc<dyn AttachmentManager>,
    registry: Arc<PendingRegistry>,
    observers: Arc<ObserverSet>,
    player_observer: Arc<dyn MediaPlayerObserver>,
    executor: Executor<Controller>,
    shut_down: AtomicBool,
}

impl SpeechSynthesizer {
    /// Build the agent, start its executor and register with the engine and
    /// the context store.
    pub fn create(
        config: SpeechSynthesizerConfig,
        ports: SpeechSynthesizerPorts,
    ) -> Result<Arc<Self>, SpeechError> {
        config.validate()?;

        let (spawner, inbox) = executor::channel::<Controller>();
        let focus = Arc::new(FocusSnapshot::new());
        let focus_observer: Arc<dyn ChannelObserver> =
            Arc::new(FocusClient::new(Arc::clone(&focus), spawner.clone()));
        let registry = Arc::new(PendingRegistry::new());
        let observers = Arc::new(ObserverSet::new());

        let controller = Controller::new(
            config.clone(),
            ControllerPorts {
                player: Arc::clone(&ports.player),
                focus_manager: Arc::clone(&ports.focus_manager),
                messages: Arc::clone(&ports.messages),
                exceptions: Arc::clone(&ports.exceptions),
            },
            StateReporter::new(Arc::clone(&ports.context), Arc::clone(&observers)),
            focus,
            focus_observer,
            Arc::clone(&registry),
        );
        let executor = Executor::start(&config.executor_thread_name, spawner, inbox, controller)?;

        let player_observer: Arc<dyn MediaPlayerObserver> = Arc::new(PlayerCallbacks {
            spawner: executor.spawner().clone(),
        });
        ports.player.add_observer(Arc::clone(&player_observer));
        ports.context.set_state_provider(
            &SPEECH_STATE,
            Some(Arc::new(StateRequests {
                spawner: executor.spawner().clone(),
            })),
        );

        tracing::info!(
            channel = %config.channel_name,
            error_policy = ?config.error_policy,
            "SpeechSynthesizer created"
        );

        Ok(Arc::new(Self {
            config,
            player: ports.player,
            context: ports.context,
            exceptions: ports.exceptions,
            attachments: ports.attachments,
            registry,
            observers,
            player_observer,
            executor,
            shut_down: AtomicBool::new(false),
        }))
    }

    pub const fn config(&self) -> &SpeechSynthesizerConfig {
        &self.config
    }

    pub fn add_observer(&self, observer: Arc<dyn SpeechSynthesizerObserver>) {
        self.observers.add(observer);
    }

    /// Remove `observer`. Once this returns the observer will not be called
    /// again. Must not be called from inside an observer notification.
    pub fn remove_observer(&self, observer: &Arc<dyn SpeechSynthesizerObserver>) {
        if self.observers.remove(observer) {
            // Wait out a notification that may already hold a snapshot.
            let _ = self.spawner().submit_and_wait(|_| ());
        }
    }

    /// Current state as seen by the executor, after everything queued so far.
    pub fn state(&self) -> SpeechSynthesizerState {
        self.spawner()
            .submit_and_wait(|c| c.state())
            .unwrap_or_default()
    }

    /// Message ids of queued requests in playback order, after everything
    /// queued so far.
    pub fn queued(&self) -> Vec<String> {
        self.spawner()
            .submit_and_wait(|c| c.queued())
            .unwrap_or_default()
    }

    /// Block until every task queued before this call has run.
    pub fn wait_until_idle(&self) {
        let _ = self.spawner().submit_and_wait(|_| ());
    }

    const fn spawner(&self) -> &Spawner<Controller> {
        self.executor.spawner()
    }

    fn check_running(&self) -> Result<(), DirectiveError> {
        if self.shut_down.load(Ordering::SeqCst) {
            Err(DirectiveError::ShutDown)
        } else {
            Ok(())
        }
    }

    fn enqueue(&self, request: SpeakRequest) -> Result<(), DirectiveError> {
        if self.spawner().submit(move |c| c.enqueue(request)) {
            Ok(())
        } else {
            Err(DirectiveError::ShutDown)
        }
    }

    /// Validate and build a request, reporting any problem.
    fn admit(
        &self,
        directive: Arc<Directive>,
        result: Option<Arc<dyn DirectiveHandlerResult>>,
    ) -> Result<SpeakRequest, DirectiveError> {
        if !directive.is(&SPEAK) {
            let error = DirectiveError::Unsupported(format!(
                "{}.{}",
                directive.namespace(),
                directive.name()
            ));
            self.report_rejection(
                &directive,
                result.as_deref(),
                ExceptionErrorType::UnsupportedOperation,
                &error,
            );
            return Err(error);
        }

        let attachments = self.attachments.as_ref();
        SpeakRequest::from_directive(Arc::clone(&directive), result.clone(), attachments).map_err(
            |e| {
                let message_id = directive.message_id();
                tracing::warn!(%message_id, error = %e, "Rejected Speak payload");
                let error = DirectiveError::MalformedPayload {
                    message_id: message_id.to_owned(),
                    property: e.property(),
                };
                self.report_rejection(
                    &directive,
                    result.as_deref(),
                    ExceptionErrorType::UnexpectedInformationReceived,
                    &error,
                );
                error
            },
        )
    }

    fn report_rejection(
        &self,
        directive: &Directive,
        result: Option<&dyn DirectiveHandlerResult>,
        kind: ExceptionErrorType,
        error: &DirectiveError,
    ) {
        let message = error.to_string();
        self.exceptions
            .send_exception_encountered(directive.unparsed(), kind, &message);
        if let Some(result) = result {
            result.report_failed(&message);
        }
    }
}

impl DirectiveHandler for SpeechSynthesizer {
    fn configuration(&self) -> DirectiveHandlerConfiguration {
        HashMap::from([(SPEAK, BlockingPolicy::Blocking)])
    }

    fn handle_directive_immediately(
        &self,
        directive: Arc<Directive>,
    ) -> Result<(), DirectiveError> {
        self.check_running()?;
        let request = self.admit(directive, None)?;
        self.enqueue(request)
    }

    fn pre_handle_directive(&self, info: DirectiveInfo) -> Result<(), DirectiveError> {
        self.check_running()?;
        let request = self.admit(Arc::clone(&info.directive), info.result)?;
        let message_id = request.message_id().to_owned();

        self.registry.insert(request).map_err(|_rejected| {
            let error = DirectiveError::DuplicateKey(message_id.clone());
            tracing::warn!(%message_id, "Duplicate Speak message id");
            self.exceptions.send_exception_encountered(
                info.directive.unparsed(),
                ExceptionErrorType::UnexpectedInformationReceived,
                &error.to_string(),
            );
            error
        })?;
        tracing::debug!(%message_id, "Pre-handled Speak");
        Ok(())
    }

    fn handle_directive(&self, message_id: &str) -> Result<(), DirectiveError> {
        self.check_running()?;
        let Some(request) = self.registry.take(message_id) else {
            let error = DirectiveError::UnknownKey(message_id.to_owned());
            tracing::warn!(%message_id, "Handle for unknown Speak");
            self.exceptions.send_exception_encountered(
                "",
                ExceptionErrorType::UnexpectedInformationReceived,
                &error.to_string(),
            );
            return Err(error);
        };
        self.enqueue(request)
    }

    fn cancel_directive(&self, message_id: &str) {
        if self.registry.take(message_id).is_some() {
            tracing::debug!(%message_id, "Cancelled pre-handled Speak");
            return;
        }
        let message_id = message_id.to_owned();
        self.spawner().submit(move |c| c.cancel(&message_id));
    }

    fn on_deregistered(&self) {
        tracing::debug!("SpeechSynthesizer deregistered");
        let _ = self.spawner().submit_and_wait(Controller::cancel_all);
    }
}

impl RequiresShutdown for SpeechSynthesizer {
    fn name(&self) -> &str {
        AGENT_NAME
    }

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Shutting down SpeechSynthesizer");

        let _ = self.spawner().submit_and_wait(Controller::cancel_all);
        self.player.remove_observer(&self.player_observer);
        self.context.set_state_provider(&SPEECH_STATE, None);
        self.executor.shutdown();
    }

    fn is_shutdown(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl Drop for SpeechSynthesizer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for SpeechSynthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechSynthesizer")
            .field("config", &self.config)
            .field("pending", &self.registry.len())
            .field("observers", &self.observers.len())
            .field("shut_down", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}
