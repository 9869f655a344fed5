//! Crate-level error types.
//!
//! Each concern keeps its own enum next to its code (`TransportError`,
//! `ApiError`, `JoinError`). [`ChatError`] aggregates the ones an embedding
//! application can see from fallible entry points.

use crate::api::ApiError;
use crate::transport::TransportError;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held a value that cannot be used.
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// A REST call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The realtime transport could not be established.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
