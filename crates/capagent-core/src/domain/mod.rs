//! Domain types shared by capability agents.
//!
//! Everything in here is plain data: no threads, no channels, no I/O.

mod directive;
mod exception;
mod focus;
mod namespace;
mod speech;

pub use directive::{BlockingPolicy, Directive, DirectiveHandlerConfiguration, DirectiveInfo};
pub use exception::ExceptionErrorType;
pub use focus::{DIALOG_CHANNEL, FocusState};
pub use namespace::NamespaceAndName;
pub use speech::{
    SPEAK, SPEECH_FINISHED, SPEECH_STARTED, SPEECH_STATE, SPEECH_SYNTHESIZER_NAMESPACE,
    PayloadError, SpeakPayload, SpeechState, SpeechSynthesizerState, TokenPayload,
};
