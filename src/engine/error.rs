//! Engine error types

use thiserror::Error;

/// Engine error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn character_meta(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::CharacterMeta, message)
    }

    pub fn assets(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Assets, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Unsupported, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Rejected, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Unknown, message)
    }
}

/// Error classification used to pick the host-facing failure reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// Character metadata could not be resolved (unknown id, backend refused)
    CharacterMeta,
    /// Metadata resolved but asset download or unpacking failed
    Assets,
    /// The engine build does not implement the operation
    Unsupported,
    /// The engine refused the call in its current state
    Rejected,
    /// Anything else, including panics caught at the facade
    Unknown,
}

impl EngineErrorKind {
    pub fn is_unsupported(self) -> bool {
        matches!(self, Self::Unsupported)
    }
}
