use thiserror::Error;

use punchlight_core::DeviceReply;

/// Synchronous failure of the underlying channel (open or write).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors returned to the caller of a send.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("not connected to light controller")]
    NotConnected,

    #[error("light controller transport error: {0}")]
    Transport(#[from] TransportError),
}

/// An `error` reply from the native host. Only ever logged; it is never tied
/// back to the send that may have caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("light controller error: {message}")]
pub struct DeviceError {
    pub message: String,
}

impl From<&DeviceReply> for DeviceError {
    fn from(reply: &DeviceReply) -> Self {
        Self {
            message: reply
                .message
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        }
    }
}
