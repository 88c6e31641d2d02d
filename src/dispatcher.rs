//! Routes decoded host commands to the session controller and the SDK
//!
//! Every invocation gets exactly one reply: a value, an error, or
//! `NotImplemented` for names outside the catalogue. Argument validation
//! finishes before anything is routed, so a rejected call has no effects.

use crate::command::{Command, Decoded, GlobalCommand};
use crate::engine::AvatarEngine;
use crate::error::BridgeError;
use crate::sdk::{AvatarSdk, SetupState};
use crate::session::SessionController;
use serde_json::Value;
use std::sync::Arc;

/// Successful reply to a host invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Value(Value),
    /// Unknown method; hosts use this to detect missing capabilities
    NotImplemented,
}

impl Reply {
    fn unit() -> Self {
        Reply::Value(Value::Null)
    }
}

impl From<bool> for Reply {
    fn from(value: bool) -> Self {
        Reply::Value(Value::Bool(value))
    }
}

impl From<&str> for Reply {
    fn from(value: &str) -> Self {
        Reply::Value(Value::String(value.to_string()))
    }
}

/// Dispatcher for one view's session commands
pub struct CommandDispatcher<E: AvatarEngine + 'static> {
    controller: SessionController<E>,
}

impl<E: AvatarEngine + 'static> Clone for CommandDispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
        }
    }
}

impl<E: AvatarEngine + 'static> CommandDispatcher<E> {
    pub fn new(controller: SessionController<E>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &SessionController<E> {
        &self.controller
    }

    /// Decode and run one host invocation.
    ///
    /// `loadCharacterData` replies as soon as the load has started; its outcome
    /// arrives later as `loadCharacterState` events.
    ///
    /// # Errors
    /// `InvalidArgument` for malformed arguments, `SdkNotSetUp` for audio sent
    /// after engine setup failed.
    pub async fn dispatch(&self, method: &str, args: &Value) -> Result<Reply, BridgeError> {
        let command = match Command::decode(method, args) {
            Ok(Decoded::Command(command)) => command,
            Ok(Decoded::Unknown) => {
                tracing::debug!(method, "Unknown session method");
                return Ok(Reply::NotImplemented);
            }
            Err(e) => {
                tracing::warn!(method, error = %e, "Rejected host command");
                return Err(e);
            }
        };

        tracing::debug!(method, "Dispatching host command");
        self.execute(command).await
    }

    async fn execute(&self, command: Command) -> Result<Reply, BridgeError> {
        let controller = &self.controller;
        match command {
            Command::LoadCharacter { character_id, view } => {
                // Detached: the outcome is reported through events
                drop(controller.load_character(character_id, view));
                Ok(Reply::unit())
            }
            Command::PreloadCharacter { character_id } => {
                Ok(controller.preload_character(&character_id).await.into())
            }
            Command::DeleteAssets { character_id } => {
                controller.delete_assets(&character_id).await;
                Ok(Reply::unit())
            }
            Command::DeleteAllAssets => {
                controller.delete_all_assets().await;
                Ok(Reply::unit())
            }
            Command::Start => {
                controller.start();
                Ok(Reply::unit())
            }
            Command::Close { should_cleanup } => {
                controller.close(should_cleanup);
                Ok(Reply::unit())
            }
            Command::Interrupt => {
                controller.interrupt();
                Ok(Reply::unit())
            }
            Command::SendAudio { audio, end } => {
                if controller.sdk().setup_state() == SetupState::Failed {
                    return Err(BridgeError::SdkNotSetUp);
                }
                Ok(controller.send_audio(&audio, end).as_str().into())
            }
            Command::SetVolume { level } => {
                controller.set_volume(level);
                Ok(Reply::unit())
            }
        }
    }
}

/// Dispatcher for commands that act on the process-wide SDK
pub struct GlobalDispatcher<E: AvatarEngine> {
    sdk: Arc<AvatarSdk<E>>,
}

impl<E: AvatarEngine> GlobalDispatcher<E> {
    pub fn new(sdk: Arc<AvatarSdk<E>>) -> Self {
        Self { sdk }
    }

    /// # Errors
    /// `InvalidArgument` for a missing or unknown environment name.
    pub fn dispatch(&self, method: &str, args: &Value) -> Result<Reply, BridgeError> {
        let command = match GlobalCommand::decode(method, args)? {
            Decoded::Command(command) => command,
            Decoded::Unknown => {
                tracing::debug!(method, "Unknown global method");
                return Ok(Reply::NotImplemented);
            }
        };

        match command {
            GlobalCommand::SupportsCurrentDevice => Ok(self.sdk.supports_current_device().into()),
            GlobalCommand::SetUpEnvironment { environment } => {
                self.sdk.set_environment(environment);
                Ok(Reply::unit())
            }
        }
    }
}
