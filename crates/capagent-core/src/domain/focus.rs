//! Audio focus states granted by a focus manager.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the channel used for spoken responses.
pub const DIALOG_CHANNEL: &str = "Dialog";

/// Focus an activity currently holds on its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FocusState {
    /// Exclusive right to produce audio.
    Foreground,
    /// Channel held, but another activity is in the foreground.
    Background,
    /// Channel not held.
    #[default]
    None,
}

impl fmt::Display for FocusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Foreground => "FOREGROUND",
            Self::Background => "BACKGROUND",
            Self::None => "NONE",
        };
        f.write_str(s)
    }
}
