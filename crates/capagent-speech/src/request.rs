//! A single admitted `Speak` request and its resources.
//!
//! A [`SpeakRequest`] owns everything tied to one directive: its audio stream
//! (until handed to the engine) and its result callback. The terminal methods
//! [`SpeakRequest::complete`] and [`SpeakRequest::fail`] consume the request,
//! so a result can be reported at most once and the request is released
//! exactly once, whichever path ends it. Dropping a request without calling
//! either is a silent cancellation.

use std::fmt;
use std::sync::Arc;

use capagent_core::ports::attachment_id;
use capagent_core::{
    AttachmentManager, AttachmentReader, Directive, DirectiveHandlerResult, ExceptionErrorType,
    ExceptionEncounteredSender, MessageSender, OutboundEvent, PayloadError, SpeakPayload,
};

pub struct SpeakRequest {
    directive: Arc<Directive>,
    token: String,
    audio: Option<Box<dyn AttachmentReader>>,
    result: Option<Arc<dyn DirectiveHandlerResult>>,
    /// Send `SpeechFinished` when playback completes.
    notify_on_finish: bool,
    /// Call `report_handled` when playback completes.
    notify_completion: bool,
    cancelled: bool,
}

impl SpeakRequest {
    /// Validate `directive` and open its audio attachment.
    ///
    /// `result` is `None` for directives handled immediately.
    pub fn from_directive(
        directive: Arc<Directive>,
        result: Option<Arc<dyn DirectiveHandlerResult>>,
        attachments: &dyn AttachmentManager,
    ) -> Result<Self, PayloadError> {
        let payload = SpeakPayload::parse(directive.payload())?;
        let id = attachment_id(directive.message_id(), &payload.content_id);
        let audio = attachments
            .create_reader(&id)
            .ok_or(PayloadError::MissingAttachment(id))?;

        let notify_completion = result.is_some();
        Ok(Self {
            directive,
            token: payload.token,
            audio: Some(audio),
            result,
            notify_on_finish: true,
            notify_completion,
            cancelled: false,
        })
    }

    /// Correlation key (the directive's message id).
    pub fn message_id(&self) -> &str {
        self.directive.message_id()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    #[cfg(test)]
    pub const fn has_result(&self) -> bool {
        self.result.is_some()
    }

    /// Hand the audio stream over to the engine. Returns `None` the second time.
    pub fn take_audio(&mut self) -> Option<Box<dyn AttachmentReader>> {
        self.audio.take()
    }

    /// Suppress the finish event and every result report; used when the
    /// sequencer cancels a request that is already playing.
    pub const fn suppress_notifications(&mut self) {
        self.notify_on_finish = false;
        self.notify_completion = false;
        self.cancelled = true;
    }

    /// Playback ended normally: send `SpeechFinished` and report handled, as flagged.
    pub fn complete(self, messages: &dyn MessageSender) {
        if self.notify_on_finish {
            messages.send_event(OutboundEvent::speech_finished(&self.token));
        }
        if self.notify_completion {
            if let Some(result) = &self.result {
                result.report_handled();
            }
        }
        tracing::debug!(message_id = %self.message_id(), "Speak request completed");
    }

    /// Playback failed: report through the result callback, or as an
    /// exception when there is none.
    pub fn fail(self, description: &str, exceptions: &dyn ExceptionEncounteredSender) {
        if self.cancelled {
            tracing::debug!(
                message_id = %self.message_id(),
                %description,
                "Cancelled Speak request failed"
            );
            return;
        }
        match &self.result {
            Some(result) => result.report_failed(description),
            None => exceptions.send_exception_encountered(
                self.directive.unparsed(),
                ExceptionErrorType::InternalError,
                description,
            ),
        }
        tracing::debug!(message_id = %self.message_id(), %description, "Speak request failed");
    }
}

impl fmt::Debug for SpeakRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeakRequest")
            .field("message_id", &self.message_id())
            .field("token", &self.token)
            .field("has_audio", &self.audio.is_some())
            .field("has_result", &self.result.is_some())
            .field("notify_on_finish", &self.notify_on_finish)
            .field("notify_completion", &self.notify_completion)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;

    use capagent_core::ports::MockDirectiveHandlerResult;

    #[derive(Default)]
    struct Attachments(Mutex<HashMap<String, Vec<u8>>>);

    impl AttachmentManager for Attachments {
        fn create_reader(&self, attachment_id: &str) -> Option<Box<dyn AttachmentReader>> {
            let bytes = self.0.lock().unwrap().remove(attachment_id)?;
            Some(Box::new(Cursor::new(bytes)))
        }
    }

    #[derive(Default)]
    struct Sink {
        events: Mutex<Vec<OutboundEvent>>,
        exceptions: Mutex<Vec<(ExceptionErrorType, String)>>,
    }

    impl MessageSender for Sink {
        fn send_event(&self, event: OutboundEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl ExceptionEncounteredSender for Sink {
        fn send_exception_encountered(&self, _: &str, kind: ExceptionErrorType, message: &str) {
            self.exceptions.lock().unwrap().push((kind, message.to_owned()));
        }
    }

    fn speak(message_id: &str) -> Arc<Directive> {
        Arc::new(Directive::new(
            "SpeechSynthesizer",
            "Speak",
            message_id,
            r#"{"token":"T1","format":"AUDIO_MPEG","url":"cid:audio"}"#,
        ))
    }

    fn attachments_for(message_id: &str) -> Attachments {
        let a = Attachments::default();
        a.0.lock()
            .unwrap()
            .insert(format!("{message_id}:audio"), vec![0u8; 4]);
        a
    }

    #[test]
    fn builds_from_valid_directive() {
        let mut req =
            SpeakRequest::from_directive(speak("m1"), None, &attachments_for("m1")).unwrap();
        assert_eq!(req.message_id(), "m1");
        assert_eq!(req.token(), "T1");
        assert!(!req.has_result());
        assert!(req.take_audio().is_some());
        assert!(req.take_audio().is_none());
    }

    #[test]
    fn missing_attachment_is_malformed() {
        let err = SpeakRequest::from_directive(speak("m1"), None, &Attachments::default())
            .unwrap_err();
        assert_eq!(err, PayloadError::MissingAttachment("m1:audio".into()));
        assert_eq!(err.property(), "url");
    }

    #[test]
    fn complete_reports_handled_once_and_sends_finished() {
        let mut mock = MockDirectiveHandlerResult::new();
        mock.expect_report_handled().times(1).return_const(());
        mock.expect_report_failed().never();

        let req = SpeakRequest::from_directive(
            speak("m1"),
            Some(Arc::new(mock)),
            &attachments_for("m1"),
        )
        .unwrap();
        let sink = Sink::default();
        req.complete(&sink);

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].header.name, "SpeechFinished");
        assert_eq!(events[0].token(), Some("T1"));
    }

    #[test]
    fn suppressed_request_completes_silently() {
        let mut mock = MockDirectiveHandlerResult::new();
        mock.expect_report_handled().never();
        mock.expect_report_failed().never();

        let mut req = SpeakRequest::from_directive(
            speak("m1"),
            Some(Arc::new(mock)),
            &attachments_for("m1"),
        )
        .unwrap();
        req.suppress_notifications();
        let sink = Sink::default();
        req.complete(&sink);

        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[test]
    fn cancelled_request_fails_silently() {
        let mut req =
            SpeakRequest::from_directive(speak("m1"), None, &attachments_for("m1")).unwrap();
        req.suppress_notifications();
        let sink = Sink::default();
        req.fail("stopFailed", &sink);

        assert!(sink.exceptions.lock().unwrap().is_empty());
    }

    #[test]
    fn fail_without_result_sends_exception() {
        let req = SpeakRequest::from_directive(speak("m1"), None, &attachments_for("m1")).unwrap();
        let sink = Sink::default();
        req.fail("decoder crashed", &sink);

        let exceptions = sink.exceptions.lock().unwrap();
        assert_eq!(
            *exceptions,
            vec![(ExceptionErrorType::InternalError, "decoder crashed".to_owned())]
        );
    }

    #[test]
    fn fail_with_result_reports_failed() {
        let mut mock = MockDirectiveHandlerResult::new();
        mock.expect_report_failed()
            .withf(|d| d == "decoder crashed")
            .times(1)
            .return_const(());
        let req = SpeakRequest::from_directive(
            speak("m1"),
            Some(Arc::new(mock)),
            &attachments_for("m1"),
        )
        .unwrap();
        let sink = Sink::default();
        req.fail("decoder crashed", &sink);

        assert!(sink.exceptions.lock().unwrap().is_empty());
    }
}
