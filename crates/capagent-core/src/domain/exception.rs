use std::fmt;

use serde::{Deserialize, Serialize};

/// Category attached to an exception report sent upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExceptionErrorType {
    /// The directive was malformed or referenced something unknown.
    UnexpectedInformationReceived,
    /// The directive is valid but not supported by this client.
    UnsupportedOperation,
    /// The client failed while handling a valid directive.
    InternalError,
}

impl fmt::Display for ExceptionErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnexpectedInformationReceived => "UNEXPECTED_INFORMATION_RECEIVED",
            Self::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            Self::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(s)
    }
}
