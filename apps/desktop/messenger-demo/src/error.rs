use common::ErrorLocation;

use messenger_core::error::{
    ConfigError, ContractError, CoreError, DispatchError, StoreError, TransportError,
};

use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the demo binary.
///
/// Kept serializable so a run report can carry the failure as data.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum DemoError {
    /// Error from this app
    #[error("Demo Error: {message} {location}")]
    Demo {
        message: String,
        location: ErrorLocation,
    },

    /// Error from messenger-core (store, contract, dispatch)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },

    #[error("Transport Error: {message} {location}")]
    Transport {
        message: String,
        location: ErrorLocation,
    },

    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },
}

impl DemoError {
    #[track_caller]
    pub fn demo(message: impl Into<String>) -> Self {
        DemoError::Demo {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<CoreError> for DemoError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        let message = error.to_string();
        let location = ErrorLocation::from(Location::caller());
        match error {
            CoreError::Transport(_) => DemoError::Transport { message, location },
            CoreError::Config(_) => DemoError::Config { message, location },
            CoreError::Store(_) | CoreError::Contract(_) | CoreError::Dispatch(_) => {
                DemoError::Core { message, location }
            }
        }
    }
}

impl From<StoreError> for DemoError {
    #[track_caller]
    fn from(error: StoreError) -> Self {
        DemoError::from(CoreError::from(error))
    }
}

impl From<ContractError> for DemoError {
    #[track_caller]
    fn from(error: ContractError) -> Self {
        DemoError::from(CoreError::from(error))
    }
}

impl From<DispatchError> for DemoError {
    #[track_caller]
    fn from(error: DispatchError) -> Self {
        DemoError::from(CoreError::from(error))
    }
}

impl From<TransportError> for DemoError {
    #[track_caller]
    fn from(error: TransportError) -> Self {
        DemoError::from(CoreError::from(error))
    }
}

impl From<ConfigError> for DemoError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        DemoError::from(CoreError::from(error))
    }
}
