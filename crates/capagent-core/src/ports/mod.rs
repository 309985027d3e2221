//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports define the interfaces a capability agent expects from the rest of
//! the client. They contain no implementation details and use only domain
//! types.
//!
//! # Design Rules
//!
//! - Every port is `Send + Sync`: callers may live on any thread
//! - Callbacks into an agent (observers) are separate traits from the
//!   commands an agent issues, so an adapter never needs the agent's concrete type
//! - No transport or codec types in any signature

pub mod attachment;
pub mod context;
pub mod directive;
pub mod focus;
pub mod media_player;
pub mod message_sender;
pub mod observer;

pub use attachment::{AttachmentManager, AttachmentReader, attachment_id};
pub use context::{ContextManager, SetStateResult, StateProvider, StateRefreshPolicy};
pub use directive::{DirectiveError, DirectiveHandler, DirectiveHandlerResult, RequiresShutdown};
pub use focus::{ChannelObserver, FocusManager};
pub use media_player::{
    MediaErrorKind, MediaPlayer, MediaPlayerError, MediaPlayerObserver, PlaybackId,
};
pub use message_sender::{ExceptionEncounteredSender, MessageSender};
pub use observer::SpeechSynthesizerObserver;

#[cfg(any(test, feature = "mock"))]
pub use directive::MockDirectiveHandlerResult;
