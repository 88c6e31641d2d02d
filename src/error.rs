//! Host-facing error taxonomy

use serde::Serialize;
use thiserror::Error;

/// Errors returned synchronously to the host
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Required argument missing or of the wrong type
    #[error("{0}")]
    InvalidArgument(String),

    /// Engine setup has failed, so the engine cannot take the call
    #[error("SDK setup not completed")]
    SdkNotSetUp,
}

impl BridgeError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        BridgeError::InvalidArgument(message.into())
    }

    /// Stable code the host codec puts on the wire
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::InvalidArgument(_) => "INVALID_ARGUMENT",
            BridgeError::SdkNotSetUp => "SDK_NOT_SETUP",
        }
    }

    pub fn to_wire(&self) -> WireError {
        WireError {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Serialized form of a `BridgeError`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireError {
    pub code: &'static str,
    pub message: String,
}
