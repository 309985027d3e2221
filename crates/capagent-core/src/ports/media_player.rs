//! Audio engine port.
//!
//! The engine renders one source at a time. Sources are identified by a
//! [`PlaybackId`] handed out by [`MediaPlayer::set_source`]; every callback
//! carries the id it refers to so late callbacks for an old source can be
//! told apart from current ones.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AttachmentReader;

/// Identifier of one source loaded into the engine.
pub type PlaybackId = u64;

/// Category of an engine-reported playback failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaErrorKind {
    Unknown,
    InvalidRequest,
    ServiceUnavailable,
    InternalServerError,
    InternalDeviceError,
}

impl fmt::Display for MediaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "MEDIA_ERROR_UNKNOWN",
            Self::InvalidRequest => "MEDIA_ERROR_INVALID_REQUEST",
            Self::ServiceUnavailable => "MEDIA_ERROR_SERVICE_UNAVAILABLE",
            Self::InternalServerError => "MEDIA_ERROR_INTERNAL_SERVER_ERROR",
            Self::InternalDeviceError => "MEDIA_ERROR_INTERNAL_DEVICE_ERROR",
        })
    }
}

/// Synchronous failures of engine commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaPlayerError {
    #[error("Source rejected: {0}")]
    InvalidSource(String),

    #[error("Unknown playback id {0}")]
    UnknownPlayback(PlaybackId),

    #[error("Audio device error: {0}")]
    Device(String),
}

/// Playback notifications. Delivered on arbitrary engine threads.
pub trait MediaPlayerObserver: Send + Sync {
    fn on_playback_started(&self, id: PlaybackId);

    /// The source played to its end.
    fn on_playback_finished(&self, id: PlaybackId);

    /// Playback ended because [`MediaPlayer::stop`] was called.
    fn on_playback_stopped(&self, id: PlaybackId);

    fn on_playback_error(&self, id: PlaybackId, kind: MediaErrorKind, message: &str);
}

/// The audio decode/render engine.
pub trait MediaPlayer: Send + Sync {
    /// Load a new source, replacing any previous one.
    fn set_source(&self, reader: Box<dyn AttachmentReader>) -> Result<PlaybackId, MediaPlayerError>;

    /// Start rendering; `on_playback_started` follows asynchronously.
    fn play(&self, id: PlaybackId) -> Result<(), MediaPlayerError>;

    /// Stop rendering; `on_playback_stopped` follows asynchronously.
    ///
    /// Every played source ends with exactly one terminal callback
    /// (finished, stopped or error). `stop` may fail with
    /// [`MediaPlayerError::UnknownPlayback`] when the source already ended;
    /// its terminal callback is then still delivered.
    fn stop(&self, id: PlaybackId) -> Result<(), MediaPlayerError>;

    /// Position reached in the source.
    fn offset(&self, id: PlaybackId) -> Duration;

    fn add_observer(&self, observer: Arc<dyn MediaPlayerObserver>);

    fn remove_observer(&self, observer: &Arc<dyn MediaPlayerObserver>);
}
