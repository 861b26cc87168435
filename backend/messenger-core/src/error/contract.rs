use crate::contract::Mode;

use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Mismatch between a declared [`Contract`](crate::contract::Contract) and the
/// handlers supplied for it.
#[derive(Debug, ThisError)]
pub enum ContractError {
    #[error("Missing Handler Error: no {mode} handler for [{key}] {location}")]
    MissingHandler {
        key: String,
        mode: Mode,
        location: ErrorLocation,
    },

    #[error("Undeclared Handler Error: [{key}] is not part of the contract {location}")]
    UndeclaredHandler {
        key: String,
        location: ErrorLocation,
    },

    #[error(
        "Direction Mismatch Error: [{key}] is declared {declared} but handled as {registered} {location}"
    )]
    DirectionMismatch {
        key: String,
        declared: Mode,
        registered: Mode,
        location: ErrorLocation,
    },
}
