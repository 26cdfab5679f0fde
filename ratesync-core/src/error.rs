use ratesync_model::ModelError;
use thiserror::Error;

use crate::protocol::ContextId;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Context {context} unreachable: {reason}")]
    Unreachable { context: ContextId, reason: String },

    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(String),

    #[error("Unexpected broker response to {request}")]
    UnexpectedResponse { request: &'static str },
}

pub type Result<T> = std::result::Result<T, CoreError>;
