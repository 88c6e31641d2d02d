//! Process-wide facade over the avatar engine
//!
//! One `AvatarSdk` is shared (via `Arc`) by every controller in the process.
//! Lifecycle: created by the host, initialized lazily exactly once, never torn
//! down. Configuration writes are last-write-wins and are pushed to the engine
//! as they happen.

use crate::engine::{
    AvatarEngine, Character, CharacterController, EngineError, EngineErrorKind, Environment,
    LoadFailure, ProgressSink, SdkConfig, ViewOptions,
};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::OnceCell;

/// Outcome of engine setup as seen by commands that need it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupState {
    /// No setup attempt has finished yet
    Pending,
    Succeeded,
    /// The last setup attempt failed; the next one retries
    Failed,
}

pub struct AvatarSdk<E: AvatarEngine> {
    engine: E,
    config: RwLock<SdkConfig>,
    initialized: OnceCell<()>,
    setup_failed: AtomicBool,
}

impl<E: AvatarEngine> AvatarSdk<E> {
    pub fn new(engine: E, config: SdkConfig) -> Self {
        Self {
            engine,
            config: RwLock::new(config),
            initialized: OnceCell::new(),
            setup_failed: AtomicBool::new(false),
        }
    }

    pub fn shared(engine: E, config: SdkConfig) -> Arc<Self> {
        Arc::new(Self::new(engine, config))
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> SdkConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_environment(&self, environment: Environment) {
        self.update_config(|config| config.environment = environment);
        tracing::info!(environment = %environment, "Engine environment set");
    }

    pub fn set_session_token(&self, token: impl Into<String>) {
        let token = token.into();
        self.update_config(|config| config.session_token = token);
        tracing::debug!("Engine session token updated");
    }

    fn update_config(&self, apply: impl FnOnce(&mut SdkConfig)) {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut config);
        // Applied under the write lock so the engine sees writes in order
        self.engine.apply_config(&config);
    }

    pub fn setup_state(&self) -> SetupState {
        if self.initialized.initialized() {
            SetupState::Succeeded
        } else if self.setup_failed.load(Ordering::Acquire) {
            SetupState::Failed
        } else {
            SetupState::Pending
        }
    }

    /// Initialize the engine if no earlier call has succeeded.
    ///
    /// Concurrent callers wait for the one in progress. A failed attempt
    /// leaves the SDK uninitialized so a later call can retry.
    ///
    /// # Errors
    /// Returns the engine's error when initialization fails or panics.
    pub async fn ensure_initialized(&self) -> Result<(), EngineError> {
        let result = self
            .initialized
            .get_or_try_init(|| async {
                let config = self.config();
                tracing::info!(environment = %config.environment, "Initializing avatar engine");
                guarded("initialize", self.engine.initialize(&config)).await
            })
            .await;

        match result {
            Ok(_) => {
                self.setup_failed.store(false, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                self.setup_failed.store(true, Ordering::Release);
                tracing::warn!(error = %e, "Avatar engine initialization failed");
                Err(e)
            }
        }
    }

    pub fn supports_current_device(&self) -> bool {
        std::panic::catch_unwind(AssertUnwindSafe(|| self.engine.supports_current_device()))
            .unwrap_or_else(|_| {
                tracing::error!("Engine panicked during supports_current_device");
                false
            })
    }

    /// Load a character, reporting progress through `progress`.
    ///
    /// # Errors
    /// Any engine failure is reduced to the host-facing `LoadFailure` reason.
    pub async fn load(
        &self,
        character_id: &str,
        progress: ProgressSink,
    ) -> Result<Character, LoadFailure> {
        if let Err(e) = self.ensure_initialized().await {
            tracing::warn!(character_id, error = %e, "Cannot load character before engine setup");
            return Err(LoadFailure::FetchCharacterMetaFailed);
        }

        guarded("load", self.engine.load(character_id, progress))
            .await
            .map_err(|e| {
                let reason = load_failure_for(e.kind);
                tracing::warn!(character_id, error = %e, reason = %reason, "Character load failed");
                reason
            })
    }

    /// # Errors
    /// Returns the engine error (or a converted panic).
    pub async fn preload(&self, character_id: &str) -> Result<bool, EngineError> {
        self.ensure_initialized().await?;
        guarded("preload", self.engine.preload(character_id)).await
    }

    /// # Errors
    /// Returns the engine error (or a converted panic).
    pub async fn delete(&self, character_id: &str) -> Result<(), EngineError> {
        guarded("delete", self.engine.delete(character_id)).await
    }

    /// # Errors
    /// Returns the engine error (or a converted panic).
    pub async fn delete_all(&self) -> Result<(), EngineError> {
        guarded("delete_all", self.engine.delete_all()).await
    }

    /// # Errors
    /// Returns the engine error (or a converted panic).
    pub fn open(
        &self,
        character: &Character,
        view: &ViewOptions,
    ) -> Result<Arc<dyn CharacterController>, EngineError> {
        contained("open", || self.engine.open(character, view))
    }
}

/// Run a synchronous engine call, turning a panic into an `EngineError`
pub(crate) fn contained<T>(
    operation: &'static str,
    call: impl FnOnce() -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    std::panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|_| Err(panicked(operation)))
}

fn load_failure_for(kind: EngineErrorKind) -> LoadFailure {
    match kind {
        EngineErrorKind::Assets => LoadFailure::DownloadAssetsFailed,
        EngineErrorKind::CharacterMeta
        | EngineErrorKind::Unsupported
        | EngineErrorKind::Rejected
        | EngineErrorKind::Unknown => LoadFailure::FetchCharacterMetaFailed,
    }
}

fn panicked(operation: &str) -> EngineError {
    tracing::error!(operation, "Avatar engine panicked");
    EngineError::unknown(format!("engine panicked during {operation}"))
}

/// Run an engine future, turning a panic into an `EngineError`
async fn guarded<T>(
    operation: &'static str,
    fut: impl Future<Output = Result<T, EngineError>>,
) -> Result<T, EngineError> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(panicked(operation)),
    }
}
