//! Speech synthesizer wire shapes: the `Speak` payload, event payloads and
//! the context state entry.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::NamespaceAndName;

pub const SPEECH_SYNTHESIZER_NAMESPACE: &str = "SpeechSynthesizer";

/// Inbound directive asking the device to speak.
pub const SPEAK: NamespaceAndName =
    NamespaceAndName::from_static(SPEECH_SYNTHESIZER_NAMESPACE, "Speak");

/// Event sent when speech playback starts.
pub const SPEECH_STARTED: NamespaceAndName =
    NamespaceAndName::from_static(SPEECH_SYNTHESIZER_NAMESPACE, "SpeechStarted");

/// Event sent when speech playback finishes.
pub const SPEECH_FINISHED: NamespaceAndName =
    NamespaceAndName::from_static(SPEECH_SYNTHESIZER_NAMESPACE, "SpeechFinished");

/// Context entry describing what the synthesizer is doing.
pub const SPEECH_STATE: NamespaceAndName =
    NamespaceAndName::from_static(SPEECH_SYNTHESIZER_NAMESPACE, "SpeechState");

/// URL scheme referencing an attachment delivered alongside the directive.
const CID_PREFIX: &str = "cid:";

/// Externally observable synthesizer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpeechSynthesizerState {
    #[default]
    Idle,
    Playing,
}

impl fmt::Display for SpeechSynthesizerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::Playing => "PLAYING",
        })
    }
}

/// Reasons a `Speak` payload cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    /// A required property is absent or empty.
    #[error("missing property: {0}")]
    MissingProperty(&'static str),

    #[error("unsupported audio url: {0}")]
    UnsupportedUrl(String),

    /// The referenced attachment could not be opened.
    #[error("attachment not available: {0}")]
    MissingAttachment(String),
}

impl PayloadError {
    /// Name of the offending property, for exception reports.
    pub const fn property(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "payload",
            Self::MissingProperty(name) => *name,
            Self::UnsupportedUrl(_) | Self::MissingAttachment(_) => "url",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSpeakPayload {
    token: Option<String>,
    format: Option<String>,
    url: Option<String>,
}

/// Validated payload of a `SpeechSynthesizer.Speak` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakPayload {
    /// Opaque token echoed back in events and context.
    pub token: String,
    /// Audio format hint (e.g. `AUDIO_MPEG`), if supplied.
    pub format: Option<String>,
    /// Content id of the attachment carrying the audio (the `cid:` suffix of `url`).
    pub content_id: String,
}

impl SpeakPayload {
    /// Parse and validate the raw payload text.
    pub fn parse(payload: &str) -> Result<Self, PayloadError> {
        let raw: RawSpeakPayload =
            serde_json::from_str(payload).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;

        let token = raw
            .token
            .filter(|t| !t.is_empty())
            .ok_or(PayloadError::MissingProperty("token"))?;
        let url = raw
            .url
            .filter(|u| !u.is_empty())
            .ok_or(PayloadError::MissingProperty("url"))?;
        let content_id = url
            .strip_prefix(CID_PREFIX)
            .filter(|cid| !cid.is_empty())
            .ok_or_else(|| PayloadError::UnsupportedUrl(url.clone()))?
            .to_owned();

        tracing::trace!(%token, %content_id, "Parsed Speak payload");

        Ok(Self {
            token,
            format: raw.format,
            content_id,
        })
    }
}

/// Payload of `SpeechStarted` / `SpeechFinished`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub token: String,
}

/// The `SpeechState` context entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechState {
    pub token: String,
    pub offset_in_milliseconds: u64,
}

impl SpeechState {
    /// Serialize to the JSON text stored in the context.
    pub fn to_json(&self) -> String {
        // A struct of a string and an integer always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}
