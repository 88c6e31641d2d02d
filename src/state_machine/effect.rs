//! Effects produced by state transitions

use crate::engine::ConversationState;
use crate::event::{Event, LoadState};

/// Effects to be executed, in order, after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send an event to the host
    Emit(Event),

    /// Open the loaded character and subscribe to its callbacks
    InstallHandle,

    /// Unsubscribe and dispose the current handle
    ReleaseHandle,

    StartConversation,

    StopConversation,

    InterruptConversation,
}

impl Effect {
    pub fn load_state(state: LoadState) -> Self {
        Effect::Emit(Event::LoadState(state))
    }

    pub fn conversation(state: ConversationState) -> Self {
        Effect::Emit(Event::ConversationState(state))
    }
}
