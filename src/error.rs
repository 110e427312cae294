//! Client error types

use crate::connection::ConfigError;
use thiserror::Error;
use yarrboard_shared::codec::CodecError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to encode command: {0}")]
    Codec(#[from] CodecError),

    #[error("connection task has stopped")]
    Stopped,

    #[error("connection task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
