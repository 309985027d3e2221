//! Speech synthesizer error types.

use std::path::PathBuf;

use capagent_core::MediaErrorKind;

/// Errors raised inside the speech synthesizer.
///
/// Admission failures visible to a sequencer are reported as
/// [`DirectiveError`](capagent_core::DirectiveError); this type covers
/// construction, configuration and the failure descriptions handed to
/// result callbacks.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    /// A configuration value is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to read the configuration file.
    #[error("Failed to read configuration {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON for the config schema.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The worker thread could not be started.
    #[error("Failed to spawn executor thread: {0}")]
    ExecutorSpawn(#[source] std::io::Error),

    /// The engine reported, or a command produced, a playback failure.
    #[error("{kind}: {message}")]
    Playback { kind: MediaErrorKind, message: String },
}

impl SpeechError {
    pub fn playback(kind: MediaErrorKind, message: impl Into<String>) -> Self {
        Self::Playback {
            kind,
            message: message.into(),
        }
    }
}
