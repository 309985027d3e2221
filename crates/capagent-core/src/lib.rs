#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod events;
pub mod ports;

// Re-export commonly used types for convenience
pub use domain::{
    BlockingPolicy, DIALOG_CHANNEL, Directive, DirectiveHandlerConfiguration, DirectiveInfo,
    ExceptionErrorType, FocusState, NamespaceAndName, PayloadError, SpeakPayload, SpeechState,
    SpeechSynthesizerState, TokenPayload,
};
pub use events::{EventHeader, OutboundEvent};
pub use ports::{
    AttachmentManager, AttachmentReader, ChannelObserver, ContextManager, DirectiveError,
    DirectiveHandler, DirectiveHandlerResult, ExceptionEncounteredSender, FocusManager,
    MediaErrorKind, MediaPlayer, MediaPlayerError, MediaPlayerObserver, MessageSender, PlaybackId,
    RequiresShutdown, SetStateResult, SpeechSynthesizerObserver, StateProvider,
    StateRefreshPolicy,
};

