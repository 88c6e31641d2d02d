//! Events delivered back to the host

use crate::engine::{ConnectionState, ConversationState, LoadFailure, PlayerState};
use serde_json::{json, Value};

/// Load lifecycle as reported in `loadCharacterState`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadState {
    Preparing,
    Downloading { progress: f64 },
    Completed,
    Failed(LoadFailure),
}

impl LoadState {
    pub fn state_name(&self) -> &'static str {
        match self {
            LoadState::Preparing => "preparing",
            LoadState::Downloading { .. } => "downloading",
            LoadState::Completed => "completed",
            LoadState::Failed(reason) => reason.as_str(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadState::Completed | LoadState::Failed(_))
    }
}

/// Every notification the bridge sends to the host
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    LoadState(LoadState),
    ConnectionState(ConnectionState),
    ConversationState(ConversationState),
    PlayerState(PlayerState),
    /// Engine error identifier
    Error(String),
}

impl Event {
    /// Method name the host channel is invoked with
    pub fn method(&self) -> &'static str {
        match self {
            Event::LoadState(_) => "loadCharacterState",
            Event::ConnectionState(_) => "didUpdatedConnectionState",
            Event::ConversationState(_) => "didUpdatedConversationState",
            Event::PlayerState(_) => "didUpdatedPlayerState",
            Event::Error(_) => "playerDidEncounteredError",
        }
    }

    /// Arguments the host channel is invoked with
    pub fn arguments(&self) -> Value {
        match self {
            Event::LoadState(LoadState::Downloading { progress }) => json!({
                "state": "downloading",
                "progress": progress,
            }),
            Event::LoadState(LoadState::Failed(reason)) => json!({
                "state": reason.as_str(),
                "error": reason.as_str(),
            }),
            Event::LoadState(state) => json!({ "state": state.state_name() }),
            Event::ConnectionState(state) => json!(state.as_str()),
            Event::ConversationState(state) => json!(state.as_str()),
            Event::PlayerState(state) => json!(state.as_str()),
            Event::Error(id) => json!(id),
        }
    }
}

/// An event as handed to the host sink, stamped in delivery order
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub seq: u64,
    pub event: Event,
}

impl OutboundMessage {
    pub fn method(&self) -> &'static str {
        self.event.method()
    }

    pub fn arguments(&self) -> Value {
        self.event.arguments()
    }
}
