//! Pure state transition function
//!
//! Given the same state and input this always produces the same result. All
//! engine calls and event delivery happen in the controller that executes the
//! returned effects.

use super::{Effect, Input, SessionState};
use crate::engine::ConversationState;
use crate::event::LoadState;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    pub fn is_noop(&self, previous: &SessionState) -> bool {
        self.effects.is_empty() && &self.new_state == previous
    }
}

/// Inputs the state machine refuses
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    /// Engine outcome for a load that is no longer the trusted one
    #[error("load {generation} was superseded")]
    StaleLoad { generation: u64 },
}

pub fn transition(state: &SessionState, input: Input) -> Result<TransitionResult, TransitionError> {
    match (state, input) {
        // ============================================================
        // Loading
        // ============================================================

        // Any state + LoadRequested -> Preparing (supersedes an in-flight load)
        (_, Input::LoadRequested { generation }) => {
            let active = matches!(state, SessionState::Active);
            let release = state.has_handle().then_some(Effect::ReleaseHandle);
            Ok(TransitionResult::new(SessionState::Preparing { generation })
                .with_effects(active.then_some(Effect::StopConversation))
                .with_effects(release)
                .with_effects(active.then(|| Effect::conversation(ConversationState::Idle)))
                .with_effect(Effect::load_state(LoadState::Preparing)))
        }

        (
            SessionState::Preparing { generation: current }
            | SessionState::Downloading {
                generation: current, ..
            },
            Input::LoadProgressed {
                generation,
                progress,
            },
        ) if *current == generation => {
            let floor = match state {
                SessionState::Downloading { progress, .. } => *progress,
                _ => 0.0,
            };
            let progress = monotonic_progress(floor, progress);
            Ok(
                TransitionResult::new(SessionState::Downloading {
                    generation,
                    progress,
                })
                .with_effect(Effect::load_state(LoadState::Downloading { progress })),
            )
        }

        (_, Input::LoadSucceeded { generation })
            if state.loading_generation() == Some(generation) =>
        {
            Ok(TransitionResult::new(SessionState::Ready)
                .with_effect(Effect::InstallHandle)
                .with_effect(Effect::load_state(LoadState::Completed)))
        }

        (_, Input::LoadFailed { generation, reason })
            if state.loading_generation() == Some(generation) =>
        {
            Ok(TransitionResult::new(SessionState::Failed { reason })
                .with_effect(Effect::load_state(LoadState::Failed(reason))))
        }

        // Outcomes for a superseded or abandoned load
        (
            _,
            Input::LoadProgressed { generation, .. }
            | Input::LoadSucceeded { generation }
            | Input::LoadFailed { generation, .. },
        ) => Err(TransitionError::StaleLoad { generation }),

        // ============================================================
        // Conversation
        // ============================================================

        (SessionState::Ready | SessionState::Idle, Input::Start) => {
            Ok(TransitionResult::new(SessionState::Active)
                .with_effect(Effect::StartConversation)
                .with_effect(Effect::conversation(ConversationState::Active)))
        }

        // Already active, or nothing loaded
        (_, Input::Start) => Ok(TransitionResult::new(state.clone())),

        (_, Input::Close { cleanup }) => {
            let has_handle = state.has_handle();
            let new_state = if cleanup {
                SessionState::Closed
            } else if has_handle {
                SessionState::Idle
            } else {
                state.clone()
            };
            Ok(TransitionResult::new(new_state)
                .with_effects(has_handle.then_some(Effect::StopConversation))
                .with_effects((cleanup && has_handle).then_some(Effect::ReleaseHandle))
                .with_effect(Effect::conversation(ConversationState::Idle)))
        }

        (_, Input::Interrupt) if state.has_handle() => {
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::InterruptConversation))
        }

        (_, Input::Interrupt) => Ok(TransitionResult::new(state.clone())),

        // ============================================================
        // Teardown
        // ============================================================

        (_, Input::Dispose) => {
            let has_handle = state.has_handle();
            Ok(TransitionResult::new(SessionState::Closed)
                .with_effects(has_handle.then_some(Effect::StopConversation))
                .with_effects(has_handle.then_some(Effect::ReleaseHandle)))
        }
    }
}

/// Clamp into `0.0..=1.0` and never go below what was already reported
fn monotonic_progress(floor: f64, reported: f64) -> f64 {
    if reported.is_nan() {
        return floor;
    }
    reported.clamp(0.0, 1.0).max(floor)
}
