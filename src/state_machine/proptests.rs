//! Property-based tests for the session state machine
//!
//! A small driver plays the controller's role (assigning generations and
//! tracking the handle) while arbitrary host commands and engine outcomes,
//! stale ones included, are fed through `transition`.

use super::*;
use crate::engine::{ConversationState, LoadFailure};
use crate::event::{Event, LoadState};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// Engine outcomes name a generation relative to the newest one issued
#[derive(Debug, Clone)]
enum Step {
    Load,
    Progress { back: u64, progress: f64 },
    Succeed { back: u64 },
    Fail { back: u64, reason: LoadFailure },
    Start,
    Close { cleanup: bool },
    Interrupt,
    Dispose,
}

fn arb_reason() -> impl Strategy<Value = LoadFailure> {
    prop_oneof![
        Just(LoadFailure::FetchCharacterMetaFailed),
        Just(LoadFailure::DownloadAssetsFailed),
    ]
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => Just(Step::Load),
        4 => (0u64..3, -0.5f64..1.5).prop_map(|(back, progress)| Step::Progress { back, progress }),
        2 => (0u64..3).prop_map(|back| Step::Succeed { back }),
        1 => (0u64..3, arb_reason()).prop_map(|(back, reason)| Step::Fail { back, reason }),
        2 => Just(Step::Start),
        2 => any::<bool>().prop_map(|cleanup| Step::Close { cleanup }),
        1 => Just(Step::Interrupt),
        1 => Just(Step::Dispose),
    ]
}

// ============================================================================
// Driver
// ============================================================================

#[derive(Default)]
struct Driver {
    state: SessionState,
    newest_generation: u64,
    handle: bool,
    /// Load events emitted since the newest LoadRequested
    load_events: Vec<LoadState>,
}

impl Driver {
    fn input_for(&mut self, step: &Step) -> Input {
        let generation_back = |back: u64, newest: u64| newest.saturating_sub(back).max(1);
        match *step {
            Step::Load => {
                self.newest_generation += 1;
                Input::LoadRequested {
                    generation: self.newest_generation,
                }
            }
            Step::Progress { back, progress } => Input::LoadProgressed {
                generation: generation_back(back, self.newest_generation),
                progress,
            },
            Step::Succeed { back } => Input::LoadSucceeded {
                generation: generation_back(back, self.newest_generation),
            },
            Step::Fail { back, reason } => Input::LoadFailed {
                generation: generation_back(back, self.newest_generation),
                reason,
            },
            Step::Start => Input::Start,
            Step::Close { cleanup } => Input::Close { cleanup },
            Step::Interrupt => Input::Interrupt,
            Step::Dispose => Input::Dispose,
        }
    }

    /// Apply one step, returning the effects it produced (empty when rejected)
    fn step(&mut self, step: &Step) -> Result<Vec<Effect>, TestCaseError> {
        let input = self.input_for(step);
        if matches!(input, Input::LoadRequested { .. }) {
            self.load_events.clear();
        }

        let Ok(result) = transition(&self.state, input) else {
            return Ok(vec![]);
        };

        for effect in &result.effects {
            match effect {
                Effect::InstallHandle => {
                    prop_assert!(!self.handle, "handle installed twice");
                    self.handle = true;
                }
                Effect::ReleaseHandle => {
                    prop_assert!(self.handle, "released a handle that was not held");
                    self.handle = false;
                }
                Effect::StartConversation
                | Effect::StopConversation
                | Effect::InterruptConversation => {
                    prop_assert!(self.handle, "engine call without a handle: {:?}", effect);
                }
                Effect::Emit(Event::LoadState(state)) => self.load_events.push(*state),
                Effect::Emit(_) => {}
            }
        }

        self.state = result.new_state;
        prop_assert_eq!(self.handle, self.state.has_handle());
        Ok(result.effects)
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn handle_tracks_state(steps in proptest::collection::vec(arb_step(), 1..60)) {
        let mut driver = Driver::default();
        for step in &steps {
            driver.step(step)?;
        }
    }

    #[test]
    fn load_events_are_well_formed(steps in proptest::collection::vec(arb_step(), 1..60)) {
        let mut driver = Driver::default();
        for step in &steps {
            driver.step(step)?;

            let events = &driver.load_events;
            if events.is_empty() {
                continue;
            }
            // Preparing first, at most one terminal value, and it comes last
            prop_assert_eq!(events[0], LoadState::Preparing);
            let terminal = events.iter().filter(|e| e.is_terminal()).count();
            prop_assert!(terminal <= 1);
            if terminal == 1 {
                prop_assert!(events.last().is_some_and(LoadState::is_terminal));
            }

            // Downloading progress stays in range and never decreases
            let mut last = 0.0f64;
            for event in events {
                if let LoadState::Downloading { progress } = event {
                    prop_assert!((0.0..=1.0).contains(progress));
                    prop_assert!(*progress >= last);
                    last = *progress;
                }
            }
        }
    }

    #[test]
    fn close_always_reports_idle(
        prefix in proptest::collection::vec(arb_step(), 0..30),
        cleanup in any::<bool>(),
    ) {
        let mut driver = Driver::default();
        for step in &prefix {
            driver.step(step)?;
        }

        for _ in 0..2 {
            let effects = driver.step(&Step::Close { cleanup })?;
            let idle = effects
                .iter()
                .filter(|e| **e == Effect::conversation(ConversationState::Idle))
                .count();
            prop_assert_eq!(idle, 1);
        }
        prop_assert!(matches!(driver.state, SessionState::Closed) || !cleanup);
    }

    #[test]
    fn start_without_handle_is_noop(prefix in proptest::collection::vec(arb_step(), 0..30)) {
        let mut driver = Driver::default();
        for step in &prefix {
            driver.step(step)?;
        }
        if !driver.state.has_handle() {
            let before = driver.state.clone();
            let effects = driver.step(&Step::Start)?;
            prop_assert!(effects.is_empty());
            prop_assert_eq!(driver.state, before);
        }
    }
}
