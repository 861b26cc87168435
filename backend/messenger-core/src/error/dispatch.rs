use crate::contract::Mode;
use crate::error::transport::TransportError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum DispatchError {
    #[error("Unknown Key Error: [{key}] is not declared in the contract {location}")]
    UnknownKey {
        key: String,
        location: ErrorLocation,
    },

    #[error("Mode Mismatch Error: [{key}] is a {declared} key, cannot {attempted} {location}")]
    ModeMismatch {
        key: String,
        declared: Mode,
        attempted: Mode,
        location: ErrorLocation,
    },

    #[error("Encode Error: {message} {location}")]
    Encode {
        message: String,
        location: ErrorLocation,
    },

    #[error("Decode Error: {message} {location}")]
    Decode {
        message: String,
        location: ErrorLocation,
    },

    /// The host handler failed; carries the message it failed with.
    #[error("InvokeError: {message} {location}")]
    Remote {
        message: String,
        stack: Option<String>,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    #[track_caller]
    pub(crate) fn encode(error: serde_json::Error) -> Self {
        DispatchError::Encode {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub(crate) fn decode(error: serde_json::Error) -> Self {
        DispatchError::Decode {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
