//! Avatar bridge
//!
//! Connects a host UI to a conversational avatar engine. The host sends named
//! commands with JSON argument bags; the bridge drives one character session
//! per view and reports progress and engine state back as ordered events.
//!
//! Layers, from the host inward:
//! - [`bridge`]: process entry point and per-view channels
//! - [`dispatcher`] / [`command`]: decode and route host commands
//! - [`session`]: the session controller, driven by the pure [`state_machine`]
//! - [`forwarder`]: ordered delivery of [`event::Event`]s to the host
//! - [`sdk`] / [`resources`]: the process-wide facade over the [`engine`] traits

pub mod bridge;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod event;
pub mod forwarder;
pub mod logging;
pub mod resources;
pub mod sdk;
pub mod session;
pub mod state_machine;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::{AvatarBridge, ViewChannel};
pub use config::BridgeConfig;
pub use dispatcher::Reply;
pub use engine::{AvatarEngine, CharacterController, EngineError, EngineObserver};
pub use error::BridgeError;
pub use event::{Event, OutboundMessage};
pub use forwarder::{EventSink, StreamSink};
pub use session::{SessionController, ViewParams};
