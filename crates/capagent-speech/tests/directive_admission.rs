//! Integration tests for directive admission, cancellation, observers and
//! shutdown.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use capagent_core::domain::SPEAK;
use capagent_core::ports::MockDirectiveHandlerResult;
use capagent_core::{
    BlockingPolicy, Directive, DirectiveError, DirectiveHandler, DirectiveInfo,
    ExceptionErrorType, FocusState, RequiresShutdown, SpeechSynthesizerObserver,
    SpeechSynthesizerState,
};

use common::{Harness, PlayerCall, RecordingResult, event};

#[test]
fn declares_blocking_speak() {
    let h = Harness::new();
    assert_eq!(
        h.agent.configuration(),
        HashMap::from([(SPEAK, BlockingPolicy::Blocking)])
    );
    assert_eq!(h.agent.name(), "SpeechSynthesizer");
}

#[test]
fn malformed_payload_is_rejected_then_unknown() {
    let h = Harness::new();
    let result = Arc::new(RecordingResult::default());
    let directive = Directive::new("SpeechSynthesizer", "Speak", "m1", r#"{"url":"cid:audio"}"#);
    let unparsed = directive.unparsed().to_owned();

    let err = h
        .agent
        .pre_handle_directive(DirectiveInfo::new(directive, Some(result.clone())))
        .unwrap_err();
    assert_eq!(
        err,
        DirectiveError::MalformedPayload {
            message_id: "m1".into(),
            property: "token",
        }
    );
    assert_eq!(result.failed().len(), 1);
    let exceptions = h.sender.exceptions();
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].kind, ExceptionErrorType::UnexpectedInformationReceived);
    assert_eq!(exceptions[0].unparsed, unparsed);

    let err = h.agent.handle_directive("m1").unwrap_err();
    assert_eq!(err, DirectiveError::UnknownKey("m1".into()));
    assert_eq!(h.sender.exceptions().len(), 2);

    h.settle();
    assert!(h.player.calls().is_empty());
    assert!(h.focus.calls().is_empty());
    assert!(h.sender.events().is_empty());
}

#[test]
fn missing_attachment_is_malformed() {
    let h = Harness::new();
    let result = Arc::new(RecordingResult::default());
    // Built without registering the attachment.
    let directive = common::speak_directive("m1", "T1");

    let err = h
        .agent
        .pre_handle_directive(DirectiveInfo::new(directive, Some(result.clone())))
        .unwrap_err();
    assert!(matches!(
        err,
        DirectiveError::MalformedPayload { property: "url", .. }
    ));
    assert_eq!(result.failed().len(), 1);
}

#[test]
fn non_speak_directive_is_unsupported() {
    let h = Harness::new();
    let result = Arc::new(RecordingResult::default());
    let directive = Directive::new("SpeechSynthesizer", "Whisper", "m1", "{}");

    let err = h
        .agent
        .pre_handle_directive(DirectiveInfo::new(directive, Some(result.clone())))
        .unwrap_err();
    assert!(matches!(err, DirectiveError::Unsupported(_)));
    assert_eq!(h.sender.exceptions()[0].kind, ExceptionErrorType::UnsupportedOperation);
    assert_eq!(result.failed().len(), 1);
}

#[test]
fn duplicate_key_is_rejected_without_mutation() {
    let h = Harness::new();
    let first = h.pre_handle("m1", "T1");

    let second = Arc::new(RecordingResult::default());
    let err = h
        .agent
        .pre_handle_directive(DirectiveInfo::new(h.speak("m1", "T2"), Some(second.clone())))
        .unwrap_err();
    assert_eq!(err, DirectiveError::DuplicateKey("m1".into()));
    assert_eq!(h.sender.exceptions().len(), 1);
    assert!(second.untouched());

    h.agent.handle_directive("m1").unwrap();
    h.settle();
    h.focus.grant(FocusState::Foreground);
    h.player.started(1);
    h.player.finished(1);
    h.settle();
    assert_eq!(first.handled(), 1);
    assert_eq!(h.sender.events()[0], event("SpeechStarted", "T1"));
}

#[test]
fn handle_twice_is_unknown_the_second_time() {
    let h = Harness::new();
    h.admit("m1", "T1");
    assert_eq!(
        h.agent.handle_directive("m1"),
        Err(DirectiveError::UnknownKey("m1".into()))
    );
}

#[test]
fn immediate_directive_plays_without_result() {
    let h = Harness::new();
    h.agent
        .handle_directive_immediately(Arc::new(h.speak("m1", "T1")))
        .unwrap();
    h.settle();
    h.focus.grant(FocusState::Foreground);
    h.player.started(1);
    h.player.finished(1);
    h.settle();

    assert_eq!(
        h.sender.events(),
        vec![event("SpeechStarted", "T1"), event("SpeechFinished", "T1")]
    );
    assert!(h.sender.exceptions().is_empty());
}

#[test]
fn result_is_reported_exactly_once() {
    let h = Harness::new();
    let mut mock = MockDirectiveHandlerResult::new();
    mock.expect_report_handled().times(1).return_const(());
    mock.expect_report_failed().never();

    h.agent
        .pre_handle_directive(DirectiveInfo::new(h.speak("m1", "T1"), Some(Arc::new(mock))))
        .unwrap();
    h.agent.handle_directive("m1").unwrap();
    h.settle();
    h.focus.grant(FocusState::Foreground);
    h.player.started(1);
    h.player.finished(1);
    // Duplicate and late callbacks for the same playback.
    h.player.finished(1);
    h.player.error(1, capagent_core::MediaErrorKind::Unknown, "late");
    h.settle();
}

// ── Cancellation ───────────────────────────────────────────────────

#[test]
fn cancel_pre_handled_drops_it() {
    let h = Harness::new();
    let result = h.pre_handle("m1", "T1");
    h.agent.cancel_directive("m1");

    assert_eq!(
        h.agent.handle_directive("m1"),
        Err(DirectiveError::UnknownKey("m1".into()))
    );
    h.settle();
    assert!(result.untouched());
    assert!(h.focus.calls().is_empty());
}

#[test]
fn cancel_of_queued_request_makes_no_calls() {
    let h = Harness::new();
    h.admit("m1", "T1");
    let second = h.admit("m2", "T2");
    h.settle();
    h.focus.grant(FocusState::Foreground);
    h.player.started(1);
    h.settle();

    let player_calls = h.player.calls();
    let focus_calls = h.focus.calls();
    h.agent.cancel_directive("m2");
    h.settle();

    assert_eq!(h.player.calls(), player_calls);
    assert_eq!(h.focus.calls(), focus_calls);
    assert_eq!(h.sender.events(), vec![event("SpeechStarted", "T1")]);
    assert!(second.untouched());
    assert_eq!(h.agent.queued(), vec!["m1"]);

    h.player.finished(1);
    h.settle();
    assert_eq!(h.focus.releases(), 1);
    assert!(!h.player.calls().contains(&PlayerCall::SetSource(2)));
}

#[test]
fn cancel_of_current_request_is_silent() {
    let h = Harness::new();
    let result = h.admit("m1", "T1");
    h.settle();
    h.focus.grant(FocusState::Foreground);
    h.player.started(1);
    h.settle();

    h.agent.cancel_directive("m1");
    h.settle();

    assert_eq!(h.player.calls().last(), Some(&PlayerCall::Stop(1)));
    assert!(result.untouched());
    assert_eq!(h.sender.events(), vec![event("SpeechStarted", "T1")]);
    assert_eq!(
        h.observer.states(),
        vec![SpeechSynthesizerState::Playing, SpeechSynthesizerState::Idle]
    );
    assert_eq!(h.focus.releases(), 1);
}

#[test]
fn cancel_of_request_awaiting_focus_releases_focus() {
    let h = Harness::new();
    let result = h.admit("m1", "T1");
    h.settle();

    h.agent.cancel_directive("m1");
    h.settle();

    assert!(h.player.calls().is_empty());
    assert_eq!(h.focus.releases(), 1);
    assert!(result.untouched());
}

// ── Observers ──────────────────────────────────────────────────────

#[test]
fn removed_observer_is_not_notified() {
    let h = Harness::new();
    let observer: Arc<dyn SpeechSynthesizerObserver> = h.observer.clone();
    h.agent.remove_observer(&observer);

    h.admit("m1", "T1");
    h.settle();
    h.focus.grant(FocusState::Foreground);
    h.player.started(1);
    h.settle();

    assert!(h.observer.states().is_empty());
}

// ── Shutdown and deregistration ────────────────────────────────────

#[test]
fn shutdown_cancels_everything_silently() {
    let h = Harness::new();
    let first = h.admit("m1", "T1");
    let second = h.admit("m2", "T2");
    let pending = h.pre_handle("m3", "T3");
    h.settle();
    h.focus.grant(FocusState::Foreground);
    h.player.started(1);
    h.settle();
    assert!(h.context.has_provider());

    h.agent.shutdown();

    assert!(h.agent.is_shutdown());
    assert_eq!(h.player.calls().last(), Some(&PlayerCall::Stop(1)));
    assert!(first.untouched());
    assert!(second.untouched());
    assert!(pending.untouched());
    assert_eq!(h.sender.events(), vec![event("SpeechStarted", "T1")]);
    assert_eq!(h.focus.releases(), 1);
    assert_eq!(h.player.observer_count(), 0);
    assert!(!h.context.has_provider());
    assert_eq!(
        h.observer.states(),
        vec![SpeechSynthesizerState::Playing, SpeechSynthesizerState::Idle]
    );
}

#[test]
fn calls_after_shutdown_are_refused() {
    let h = Harness::new();
    h.agent.shutdown();
    h.agent.shutdown();

    let result = Arc::new(RecordingResult::default());
    assert_eq!(
        h.agent
            .pre_handle_directive(DirectiveInfo::new(h.speak("m1", "T1"), Some(result.clone()))),
        Err(DirectiveError::ShutDown)
    );
    assert_eq!(h.agent.handle_directive("m1"), Err(DirectiveError::ShutDown));
    assert_eq!(
        h.agent
            .handle_directive_immediately(Arc::new(h.speak("m2", "T2"))),
        Err(DirectiveError::ShutDown)
    );
    h.agent.cancel_directive("m1");
    h.agent.on_deregistered();

    assert_eq!(h.agent.state(), SpeechSynthesizerState::Idle);
    assert!(result.untouched());
    assert!(h.sender.exceptions().is_empty());
    assert_eq!(h.context.provider_changes(), 2);
}

#[test]
fn deregistration_cancels_but_stays_usable() {
    let h = Harness::new();
    let first = h.admit("m1", "T1");
    h.settle();
    h.focus.grant(FocusState::Foreground);
    h.player.started(1);
    h.settle();

    h.agent.on_deregistered();
    assert!(first.untouched());
    assert_eq!(h.focus.releases(), 1);
    assert!(!h.agent.is_shutdown());

    let second = h.admit("m2", "T2");
    h.settle();
    assert_eq!(h.focus.acquires(), 2);
    h.focus.grant(FocusState::Foreground);
    h.player.started(2);
    h.player.finished(2);
    h.settle();
    assert_eq!(second.handled(), 1);
}

#[test]
fn dropping_the_agent_shuts_it_down() {
    let h = Harness::new();
    h.admit("m1", "T1");
    h.settle();

    let common::Harness {
        agent,
        player,
        focus,
        ..
    } = h;
    drop(agent);

    assert_eq!(player.observer_count(), 0);
    assert_eq!(focus.releases(), 1);
}
