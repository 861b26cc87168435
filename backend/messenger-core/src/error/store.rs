use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum StoreError {
    /// `watch` named a key that was not in the initial state map.
    #[error("Unknown Key Error: no messenger with name [{key}] is found {location}")]
    UnknownKey {
        key: String,
        location: ErrorLocation,
    },

    #[error("Disposed Error: store has been disposed {location}")]
    Disposed { location: ErrorLocation },

    /// The scheduler returned without running the registration.
    #[error("Unscheduled Error: scheduler did not run the job {location}")]
    Unscheduled { location: ErrorLocation },

    #[error("State Decode Error: [{key}] {message} {location}")]
    Decode {
        key: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("State Encode Error: [{key}] {message} {location}")]
    Encode {
        key: String,
        message: String,
        location: ErrorLocation,
    },
}
