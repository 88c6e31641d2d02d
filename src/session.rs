//! Session controller
//!
//! Owns the one session a host view talks to. Host commands and engine
//! outcomes are fed through the pure state machine under a single lock, and
//! the resulting effects (engine calls, events) run while that lock is held,
//! so event order always matches state order.
//!
//! Loads are tagged with a generation. A newer load, a cleanup close or
//! disposal makes older generations stale, and the state machine rejects
//! their outcomes instead of forwarding them.

use crate::engine::{
    AvatarEngine, Character, CharacterController, ConnectionState, ConversationState,
    EngineError, EngineObserver, LoadFailure, LoadProgress, PlayerState, ProgressSink,
    ViewOptions,
};
use crate::event::Event;
use crate::forwarder::EventForwarder;
use crate::resources::ResourceManager;
use crate::sdk::{contained, AvatarSdk};
use crate::state_machine::{transition, Effect, Input, SessionState};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::JoinHandle;

/// Error id forwarded when the engine reports an error without one
const DEFAULT_ERROR_ID: &str = "serviceError";

/// Token meaning "no handle installed"
const NO_HANDLE: u64 = 0;

/// Result of `send_audio`, rendered for the host as `"success"` or `""`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendAudioResult {
    Accepted,
    Rejected,
}

impl SendAudioResult {
    pub fn as_str(self) -> &'static str {
        match self {
            SendAudioResult::Accepted => "success",
            SendAudioResult::Rejected => "",
        }
    }
}

/// Parameters the host supplies when it creates the view backing a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewParams {
    pub view_id: Option<i64>,
    pub session_token: Option<String>,
    pub channel_name: Option<String>,
}

/// Controller for a single character session
pub struct SessionController<E: AvatarEngine + 'static> {
    inner: Arc<Inner<E>>,
}

impl<E: AvatarEngine + 'static> Clone for SessionController<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<E: AvatarEngine + 'static> {
    /// Identifies this controller in logs
    id: String,
    sdk: Arc<AvatarSdk<E>>,
    resources: ResourceManager<E>,
    forwarder: EventForwarder,
    session: Mutex<Session>,
    /// Token of the installed handle, read by engine observers without the lock
    live_handle: Arc<AtomicU64>,
    /// Set once the connection reported `disconnected` or `error`; cleared by the
    /// next start. While set, non-terminal connection states are dropped.
    connection_latched: Arc<AtomicBool>,
}

#[derive(Default)]
struct Session {
    state: SessionState,
    character_id: Option<String>,
    view: ViewOptions,
    handle: Option<EngineHandle>,
    /// Newest load generation issued
    generation: u64,
}

/// The loaded character's controller, owned by exactly one session.
/// Dropping it unsubscribes and disposes the engine side.
struct EngineHandle {
    character_id: String,
    token: u64,
    controller: Arc<dyn CharacterController>,
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        let controller = Arc::clone(&self.controller);
        let released = contained("dispose", move || {
            controller.set_observer(None);
            controller.dispose();
            Ok(())
        });
        if let Err(e) = released {
            tracing::warn!(
                character_id = %self.character_id,
                error = %e,
                "Engine handle release failed"
            );
        }
        tracing::debug!(
            character_id = %self.character_id,
            token = self.token,
            "Engine handle released"
        );
    }
}

impl<E: AvatarEngine + 'static> SessionController<E> {
    /// Create the controller for a newly created host view.
    ///
    /// Records the view's session token with the SDK and reports an initial
    /// `disconnected` connection state.
    pub fn open(sdk: Arc<AvatarSdk<E>>, forwarder: EventForwarder, params: &ViewParams) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            controller = %id,
            view_id = ?params.view_id,
            channel = ?params.channel_name,
            "Opening session controller"
        );

        if let Some(token) = &params.session_token {
            sdk.set_session_token(token.clone());
        }

        let inner = Inner {
            id,
            resources: ResourceManager::new(Arc::clone(&sdk)),
            sdk,
            forwarder,
            session: Mutex::new(Session::default()),
            live_handle: Arc::new(AtomicU64::new(NO_HANDLE)),
            connection_latched: Arc::new(AtomicBool::new(false)),
        };
        inner
            .forwarder
            .emit(Event::ConnectionState(ConnectionState::Disconnected));

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn sdk(&self) -> &Arc<AvatarSdk<E>> {
        &self.inner.sdk
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock_session().state.clone()
    }

    pub fn character_id(&self) -> Option<String> {
        self.inner.lock_session().character_id.clone()
    }

    pub fn has_handle(&self) -> bool {
        self.inner.lock_session().handle.is_some()
    }

    /// Start loading a character in the background.
    ///
    /// Returns once `preparing` has been emitted. The terminal outcome is only
    /// reported through `loadCharacterState` events, and only if no newer load
    /// (or cleanup close) has superseded this one by then.
    pub fn load_character(
        &self,
        character_id: impl Into<String>,
        view: ViewOptions,
    ) -> JoinHandle<()> {
        let character_id = character_id.into();

        let generation = {
            let mut session = self.inner.lock_session();
            session.generation += 1;
            let generation = session.generation;
            if let Some(previous) = session.state.loading_generation() {
                tracing::info!(
                    controller = %self.inner.id,
                    previous,
                    generation,
                    "Superseding in-flight character load"
                );
            }
            session.character_id = Some(character_id.clone());
            session.view = view;
            self.inner
                .apply(&mut session, Input::LoadRequested { generation }, None);
            generation
        };

        tracing::info!(
            controller = %self.inner.id,
            character_id = %character_id,
            generation,
            "Loading character"
        );
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run_load(character_id, generation).await })
    }

    /// # Returns
    /// `false` on any engine failure.
    pub async fn preload_character(&self, character_id: &str) -> bool {
        self.inner.resources.preload(character_id).await
    }

    pub async fn delete_assets(&self, character_id: &str) {
        self.inner.resources.delete(character_id).await;
    }

    pub async fn delete_all_assets(&self) {
        self.inner.resources.delete_all().await;
    }

    /// Start the conversation. No-op unless a character is loaded and idle.
    pub fn start(&self) {
        self.inner.command(Input::Start);
    }

    /// Stop the conversation, optionally tearing the session down.
    /// Always reports `idle`; safe to repeat.
    pub fn close(&self, should_cleanup: bool) {
        let mut session = self.inner.lock_session();
        self.inner
            .apply(&mut session, Input::Close { cleanup: should_cleanup }, None);
        if should_cleanup {
            session.character_id = None;
        }
        tracing::info!(controller = %self.inner.id, cleanup = should_cleanup, "Session closed");
    }

    pub fn interrupt(&self) {
        self.inner.command(Input::Interrupt);
    }

    pub fn send_audio(&self, audio: &[u8], end: bool) -> SendAudioResult {
        let session = self.inner.lock_session();
        let Some(handle) = session.handle.as_ref() else {
            tracing::debug!(controller = %self.inner.id, "Audio dropped, no character loaded");
            return SendAudioResult::Rejected;
        };

        let controller = Arc::clone(&handle.controller);
        match contained("send_audio", move || controller.send_audio(audio, end)) {
            Ok(()) => SendAudioResult::Accepted,
            Err(e) => {
                tracing::warn!(
                    controller = %self.inner.id,
                    bytes = audio.len(),
                    end,
                    error = %e,
                    "Engine rejected audio"
                );
                SendAudioResult::Rejected
            }
        }
    }

    /// Forward a volume change. Engines without volume control accept and ignore it.
    pub fn set_volume(&self, level: f64) {
        let clamped = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
        if !(0.0..=1.0).contains(&level) {
            tracing::warn!(level, clamped, "Volume outside 0.0..=1.0, clamped");
        }

        let session = self.inner.lock_session();
        let Some(handle) = session.handle.as_ref() else {
            tracing::debug!(controller = %self.inner.id, "Volume ignored, no character loaded");
            return;
        };

        let controller = Arc::clone(&handle.controller);
        #[allow(clippy::cast_possible_truncation)] // clamped to 0.0..=1.0
        let level = clamped as f32;
        match contained("set_volume", move || controller.set_volume(level)) {
            Ok(()) => tracing::debug!(level, "Volume set"),
            Err(e) if e.kind.is_unsupported() => {
                tracing::info!(level, "Volume control not supported by engine, ignoring");
            }
            Err(e) => tracing::warn!(level, error = %e, "Setting volume failed"),
        }
    }

    /// Release the session for good. Safe to call more than once, from any thread.
    pub fn dispose(&self) {
        self.inner.command(Input::Dispose);
        tracing::info!(controller = %self.inner.id, "Session controller disposed");
    }
}

impl<E: AvatarEngine + 'static> Inner<E> {
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn command(&self, input: Input) {
        let mut session = self.lock_session();
        self.apply(&mut session, input, None);
    }

    /// Feed one input through the state machine and execute its effects.
    /// `opened` carries the controller for `InstallHandle`.
    fn apply(
        &self,
        session: &mut Session,
        input: Input,
        mut opened: Option<Arc<dyn CharacterController>>,
    ) {
        let result = match transition(&session.state, input) {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(controller = %self.id, error = %e, "Ignoring engine outcome");
                return;
            }
        };

        let previous = std::mem::replace(&mut session.state, result.new_state);
        if previous != session.state {
            tracing::debug!(
                controller = %self.id,
                from = previous.name(),
                to = session.state.name(),
                "Session state changed"
            );
        }

        for effect in result.effects {
            if let Err(e) = self.execute_effect(session, effect, &mut opened) {
                tracing::warn!(
                    controller = %self.id,
                    error = %e,
                    "Engine refused to start conversation"
                );
                session.state = previous;
                return;
            }
        }
    }

    /// Execute one effect. Only a failed start is reported back, since it
    /// aborts the transition; every other engine failure is logged here.
    fn execute_effect(
        &self,
        session: &mut Session,
        effect: Effect,
        opened: &mut Option<Arc<dyn CharacterController>>,
    ) -> Result<(), EngineError> {
        match effect {
            Effect::Emit(event) => self.forwarder.emit(event),

            Effect::InstallHandle => {
                let Some(controller) = opened.take() else {
                    tracing::error!(
                        controller = %self.id,
                        "InstallHandle without an opened controller"
                    );
                    return Ok(());
                };
                let token = session.generation;
                controller.set_observer(Some(Arc::new(ForwardingObserver {
                    forwarder: self.forwarder.clone(),
                    live_handle: Arc::clone(&self.live_handle),
                    connection_latched: Arc::clone(&self.connection_latched),
                    token,
                })));
                self.connection_latched.store(false, Ordering::Release);
                self.live_handle.store(token, Ordering::Release);
                let replaced = session.handle.replace(EngineHandle {
                    character_id: session.character_id.clone().unwrap_or_default(),
                    token,
                    controller,
                });
                debug_assert!(replaced.is_none(), "handle installed over a live one");
            }

            Effect::ReleaseHandle => {
                self.live_handle.store(NO_HANDLE, Ordering::Release);
                drop(session.handle.take());
            }

            Effect::StartConversation => {
                if let Some(handle) = &session.handle {
                    let controller = Arc::clone(&handle.controller);
                    let latched = self.connection_latched.swap(false, Ordering::AcqRel);
                    if let Err(e) = contained("start", move || controller.start()) {
                        self.connection_latched.store(latched, Ordering::Release);
                        return Err(e);
                    }
                }
            }

            Effect::StopConversation => {
                if let Some(handle) = &session.handle {
                    let controller = Arc::clone(&handle.controller);
                    if let Err(e) = contained("stop", move || controller.stop()) {
                        tracing::warn!(
                            controller = %self.id,
                            error = %e,
                            "Stopping conversation failed"
                        );
                    }
                }
            }

            Effect::InterruptConversation => {
                if let Some(handle) = &session.handle {
                    let controller = Arc::clone(&handle.controller);
                    if let Err(e) = contained("interrupt", move || controller.interrupt()) {
                        tracing::warn!(controller = %self.id, error = %e, "Interrupt failed");
                    }
                }
            }
        }
        Ok(())
    }

    async fn run_load(self: Arc<Self>, character_id: String, generation: u64) {
        let weak = Arc::downgrade(&self);
        let progress = ProgressSink::new(move |progress| on_progress(&weak, generation, progress));

        let outcome = self.sdk.load(&character_id, progress).await;
        self.finish_load(generation, outcome);
    }

    fn finish_load(&self, generation: u64, outcome: Result<Character, LoadFailure>) {
        let mut session = self.lock_session();
        if session.state.loading_generation() != Some(generation) {
            tracing::debug!(
                controller = %self.id,
                generation,
                "Discarding result of superseded load"
            );
            return;
        }

        let mut opened = None;
        let input = match outcome {
            Ok(character) => match self.sdk.open(&character, &session.view) {
                Ok(controller) => {
                    opened = Some(controller);
                    tracing::info!(
                        controller = %self.id,
                        character_id = %character.id,
                        generation,
                        "Character loaded"
                    );
                    Input::LoadSucceeded { generation }
                }
                Err(e) => {
                    tracing::warn!(
                        controller = %self.id,
                        character_id = %character.id,
                        error = %e,
                        "Opening character failed"
                    );
                    Input::LoadFailed {
                        generation,
                        reason: LoadFailure::FetchCharacterMetaFailed,
                    }
                }
            },
            Err(reason) => Input::LoadFailed { generation, reason },
        };

        self.apply(&mut session, input, opened);
    }
}

/// Progress from the engine. Only downloading maps to an event: `preparing`
/// was reported when the load was requested and the terminal value comes
/// from the load's result.
fn on_progress<E: AvatarEngine + 'static>(
    inner: &Weak<Inner<E>>,
    generation: u64,
    progress: LoadProgress,
) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    if let LoadProgress::Downloading { progress } = progress {
        let mut session = inner.lock_session();
        inner.apply(
            &mut session,
            Input::LoadProgressed {
                generation,
                progress,
            },
            None,
        );
    }
}

/// Re-emits engine callbacks while its handle is the installed one
struct ForwardingObserver {
    forwarder: EventForwarder,
    live_handle: Arc<AtomicU64>,
    connection_latched: Arc<AtomicBool>,
    token: u64,
}

impl ForwardingObserver {
    fn is_live(&self) -> bool {
        self.live_handle.load(Ordering::Acquire) == self.token
    }

    fn forward(&self, event: Event) {
        if self.is_live() {
            self.forwarder.emit(event);
        } else {
            tracing::trace!(token = self.token, "Dropping callback from released handle");
        }
    }
}

impl EngineObserver for ForwardingObserver {
    fn on_connection_state(&self, state: ConnectionState) {
        if !self.is_live() {
            tracing::trace!(token = self.token, "Dropping callback from released handle");
            return;
        }
        if state.is_terminal() {
            self.connection_latched.store(true, Ordering::Release);
        } else if self.connection_latched.load(Ordering::Acquire) {
            tracing::debug!(
                token = self.token,
                state = state.as_str(),
                "Dropping connection update until the next start"
            );
            return;
        }
        self.forwarder.emit(Event::ConnectionState(state));
    }

    fn on_conversation_state(&self, state: ConversationState) {
        self.forward(Event::ConversationState(state));
    }

    fn on_player_state(&self, state: PlayerState) {
        self.forward(Event::PlayerState(state));
    }

    fn on_error(&self, error_id: &str) {
        let id = if error_id.is_empty() {
            DEFAULT_ERROR_ID
        } else {
            error_id
        };
        tracing::warn!(error_id = id, "Engine reported player error");
        self.forward(Event::Error(id.to_string()));
    }
}
