//! Capability traits over the external avatar engine
//!
//! The engine is consumed only through these traits so the session layer can
//! be driven by mock implementations in tests.

mod error;
mod types;

pub use error::{EngineError, EngineErrorKind};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Receives load progress from the engine while `AvatarEngine::load` runs
#[derive(Clone)]
pub struct ProgressSink {
    report: Arc<dyn Fn(LoadProgress) + Send + Sync>,
}

impl ProgressSink {
    pub fn new(report: impl Fn(LoadProgress) + Send + Sync + 'static) -> Self {
        Self {
            report: Arc::new(report),
        }
    }

    /// A sink that discards everything (used by preload)
    pub fn discard() -> Self {
        Self::new(|_| {})
    }

    pub fn report(&self, progress: LoadProgress) {
        (self.report)(progress);
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSink").finish_non_exhaustive()
    }
}

/// Process-wide engine entry points
#[async_trait]
pub trait AvatarEngine: Send + Sync {
    /// One-time engine setup
    async fn initialize(&self, config: &SdkConfig) -> Result<(), EngineError>;

    /// Apply a configuration change (token or environment) to a live engine
    fn apply_config(&self, config: &SdkConfig);

    fn supports_current_device(&self) -> bool;

    /// Resolve metadata and download assets, reporting progress along the way.
    /// Returns after the terminal progress value.
    async fn load(&self, character_id: &str, progress: ProgressSink)
        -> Result<Character, EngineError>;

    /// Warm the asset cache without opening a character
    async fn preload(&self, character_id: &str) -> Result<bool, EngineError>;

    async fn delete(&self, character_id: &str) -> Result<(), EngineError>;

    async fn delete_all(&self) -> Result<(), EngineError>;

    /// Open a conversation controller bound to a loaded character
    fn open(
        &self,
        character: &Character,
        view: &ViewOptions,
    ) -> Result<Arc<dyn CharacterController>, EngineError>;
}

/// Controller bound to one loaded character
pub trait CharacterController: Send + Sync {
    fn start(&self) -> Result<(), EngineError>;

    fn stop(&self) -> Result<(), EngineError>;

    fn interrupt(&self) -> Result<(), EngineError>;

    fn send_audio(&self, audio: &[u8], end: bool) -> Result<(), EngineError>;

    /// Engines without volume control keep the default
    fn set_volume(&self, _level: f32) -> Result<(), EngineError> {
        Err(EngineError::unsupported("volume control"))
    }

    /// Register (or clear, with `None`) the state-change observer
    fn set_observer(&self, observer: Option<Arc<dyn EngineObserver>>);

    /// Release the character's view and controller resources
    fn dispose(&self);
}

/// State-change callbacks the engine invokes, possibly from its own threads
pub trait EngineObserver: Send + Sync {
    fn on_connection_state(&self, state: ConnectionState);

    fn on_conversation_state(&self, state: ConversationState);

    fn on_player_state(&self, state: PlayerState);

    /// `error_id` is the engine's identifier for the failure
    fn on_error(&self, error_id: &str);
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: AvatarEngine + ?Sized> AvatarEngine for Arc<T> {
    async fn initialize(&self, config: &SdkConfig) -> Result<(), EngineError> {
        (**self).initialize(config).await
    }

    fn apply_config(&self, config: &SdkConfig) {
        (**self).apply_config(config);
    }

    fn supports_current_device(&self) -> bool {
        (**self).supports_current_device()
    }

    async fn load(
        &self,
        character_id: &str,
        progress: ProgressSink,
    ) -> Result<Character, EngineError> {
        (**self).load(character_id, progress).await
    }

    async fn preload(&self, character_id: &str) -> Result<bool, EngineError> {
        (**self).preload(character_id).await
    }

    async fn delete(&self, character_id: &str) -> Result<(), EngineError> {
        (**self).delete(character_id).await
    }

    async fn delete_all(&self) -> Result<(), EngineError> {
        (**self).delete_all().await
    }

    fn open(
        &self,
        character: &Character,
        view: &ViewOptions,
    ) -> Result<Arc<dyn CharacterController>, EngineError> {
        (**self).open(character, view)
    }
}
