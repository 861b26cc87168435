pub mod config;
pub mod contract;
pub mod dispatch;
pub mod store;
pub mod transport;

pub use config::ConfigError;
pub use contract::ContractError;
pub use dispatch::DispatchError;
pub use store::StoreError;
pub use transport::TransportError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
