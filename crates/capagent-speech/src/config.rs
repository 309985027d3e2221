//! Speech synthesizer configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config and
//! partial files only override what they name.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use capagent_core::DIALOG_CHANNEL;

use crate::error::SpeechError;

/// Default activity id presented to the focus manager.
pub const DEFAULT_ACTIVITY_ID: &str = "SpeechSynthesizer.Speak";

/// Default name of the executor thread.
pub const DEFAULT_EXECUTOR_THREAD_NAME: &str = "speech-synth";

/// What to do with the rest of the queue when playback of a request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorPolicy {
    /// Release focus; remaining requests wait for a fresh focus grant.
    #[default]
    AbortFocusSession,
    /// Keep focus and start the next queued request right away.
    ContinueWithNext,
}

/// Configuration for [`SpeechSynthesizer`](crate::SpeechSynthesizer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpeechSynthesizerConfig {
    /// Focus channel requested for speech.
    pub channel_name: String,

    /// Activity id presented when acquiring the channel.
    pub activity_id: String,

    /// Queue behaviour after a playback error.
    pub error_policy: ErrorPolicy,

    /// Name given to the worker thread (shows up in debuggers and logs).
    pub executor_thread_name: String,
}

impl Default for SpeechSynthesizerConfig {
    fn default() -> Self {
        Self {
            channel_name: DIALOG_CHANNEL.to_owned(),
            activity_id: DEFAULT_ACTIVITY_ID.to_owned(),
            error_policy: ErrorPolicy::default(),
            executor_thread_name: DEFAULT_EXECUTOR_THREAD_NAME.to_owned(),
        }
    }
}

impl SpeechSynthesizerConfig {
    /// Load a config from a JSON file and validate it.
    pub fn from_json_file(path: &Path) -> Result<Self, SpeechError> {
        let text = fs::read_to_string(path).map_err(|source| SpeechError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the error policy.
    #[must_use]
    pub const fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Check that all names are usable.
    pub fn validate(&self) -> Result<(), SpeechError> {
        for (field, value) in [
            ("channelName", &self.channel_name),
            ("activityId", &self.activity_id),
            ("executorThreadName", &self.executor_thread_name),
        ] {
            if value.trim().is_empty() {
                return Err(SpeechError::InvalidConfig(format!("{field} must not be empty")));
            }
        }
        // Thread names are passed to the OS as C strings.
        if self.executor_thread_name.contains('\0') {
            return Err(SpeechError::InvalidConfig(
                "executorThreadName must not contain NUL".into(),
            ));
        }
        Ok(())
    }
}
