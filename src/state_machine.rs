//! Session state machine
//!
//! Pure transitions produce effects; the session controller executes them.

mod effect;
mod input;
mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use input::Input;
pub use state::SessionState;
pub use transition::{transition, TransitionError, TransitionResult};
