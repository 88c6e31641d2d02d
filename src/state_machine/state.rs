//! Session state types

use crate::engine::LoadFailure;

/// Lifecycle of the single session a controller owns.
///
/// The engine handle exists exactly while the state is `Ready`, `Active` or
/// `Idle`; the controller keeps its `Option` handle in step with this.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// Nothing loaded yet
    #[default]
    Uninitialized,

    /// Load `generation` accepted, no progress reported yet
    Preparing { generation: u64 },

    /// Load `generation` downloading; `progress` never decreases
    Downloading { generation: u64, progress: f64 },

    /// Character loaded, conversation not started
    Ready,

    /// Conversation running
    Active,

    /// Conversation stopped, character still loaded
    Idle,

    /// Session torn down (terminal until the next load)
    Closed,

    /// Load ended without a character (terminal until the next load)
    Failed { reason: LoadFailure },
}

impl SessionState {
    pub fn has_handle(&self) -> bool {
        matches!(
            self,
            SessionState::Ready | SessionState::Active | SessionState::Idle
        )
    }

    /// Generation of the load in flight, if any
    pub fn loading_generation(&self) -> Option<u64> {
        match self {
            SessionState::Preparing { generation }
            | SessionState::Downloading { generation, .. } => Some(*generation),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Preparing { .. } => "preparing",
            SessionState::Downloading { .. } => "downloading",
            SessionState::Ready => "ready",
            SessionState::Active => "active",
            SessionState::Idle => "idle",
            SessionState::Closed => "closed",
            SessionState::Failed { .. } => "failed",
        }
    }
}
