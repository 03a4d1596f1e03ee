//! Fake Chain Error

use thiserror::Error;

/// Fake Chain Error
#[derive(Debug, Error)]
pub enum Error {
    /// Scripted provider failure
    #[error("{0}")]
    Scripted(String),
    /// No handler registered for the call
    #[error("execution reverted: no handler for {0}")]
    NoHandler(String),
    /// Call data shorter than a selector
    #[error("Call data too short")]
    ShortCallData,
}

impl From<Error> for rdk_common::connector::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Scripted(message) => Self::Provider(message),
            Error::NoHandler(target) => Self::Reverted(format!("no handler for {target}")),
            err => Self::Custom(err.to_string()),
        }
    }
}
