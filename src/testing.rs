//! Mock implementations for testing
//!
//! `MockEngine` plays back scripted loads and records every call so the
//! session layer can be exercised without a real avatar engine.

use crate::engine::{
    AvatarEngine, Character, CharacterController, ConnectionState, ConversationState,
    EngineError, EngineObserver, LoadProgress, PlayerState, ProgressSink, SdkConfig, ViewOptions,
};
use crate::event::{Event, OutboundMessage};
use crate::forwarder::{EventForwarder, StreamSink};
use crate::sdk::AvatarSdk;
use crate::session::{SessionController, ViewParams};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

// ============================================================================
// Load Scripts
// ============================================================================

#[derive(Debug, Clone)]
enum LoadOutcome {
    Succeed,
    Fail(EngineError),
    Panic,
}

/// How the mock engine plays out one character's load
#[derive(Debug, Clone)]
pub struct LoadScript {
    progress: Vec<f64>,
    outcome: LoadOutcome,
    /// Load waits here before reporting anything
    gate: Option<Arc<Notify>>,
}

impl Default for LoadScript {
    fn default() -> Self {
        Self::succeed()
    }
}

impl LoadScript {
    pub fn succeed() -> Self {
        Self {
            progress: vec![],
            outcome: LoadOutcome::Succeed,
            gate: None,
        }
    }

    pub fn fail(error: EngineError) -> Self {
        Self {
            outcome: LoadOutcome::Fail(error),
            ..Self::succeed()
        }
    }

    pub fn panic() -> Self {
        Self {
            outcome: LoadOutcome::Panic,
            ..Self::succeed()
        }
    }

    pub fn with_progress(mut self, progress: &[f64]) -> Self {
        self.progress = progress.to_vec();
        self
    }

    /// Hold the load until `gate.notify_one()`
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

// ============================================================================
// Mock Engine
// ============================================================================

#[derive(Default)]
pub struct MockEngine {
    scripts: Mutex<HashMap<String, LoadScript>>,
    initialize_calls: AtomicUsize,
    fail_initialize: AtomicBool,
    applied_configs: Mutex<Vec<SdkConfig>>,
    unsupported_device: AtomicBool,
    load_calls: Mutex<Vec<String>>,
    preload_failures: Mutex<HashMap<String, EngineError>>,
    preload_calls: Mutex<Vec<String>>,
    delete_failure: Mutex<Option<EngineError>>,
    delete_calls: Mutex<Vec<String>>,
    delete_all_calls: AtomicUsize,
    open_failure: Mutex<Option<EngineError>>,
    controllers: Mutex<Vec<Arc<MockCharacterController>>>,
    controller_template: Mutex<ControllerBehavior>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, character_id: &str, script: LoadScript) {
        self.scripts
            .lock()
            .unwrap()
            .insert(character_id.to_string(), script);
    }

    pub fn fail_next_initialize(&self) {
        self.fail_initialize.store(true, Ordering::SeqCst);
    }

    pub fn set_unsupported_device(&self) {
        self.unsupported_device.store(true, Ordering::SeqCst);
    }

    pub fn fail_preload(&self, character_id: &str, error: EngineError) {
        self.preload_failures
            .lock()
            .unwrap()
            .insert(character_id.to_string(), error);
    }

    pub fn fail_deletes(&self, error: EngineError) {
        *self.delete_failure.lock().unwrap() = Some(error);
    }

    pub fn fail_open(&self, error: EngineError) {
        *self.open_failure.lock().unwrap() = Some(error);
    }

    /// Behavior for controllers opened from now on
    pub fn controller_behavior(&self, behavior: ControllerBehavior) {
        *self.controller_template.lock().unwrap() = behavior;
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialize_calls.load(Ordering::SeqCst)
    }

    pub fn applied_configs(&self) -> Vec<SdkConfig> {
        self.applied_configs.lock().unwrap().clone()
    }

    pub fn load_calls(&self) -> Vec<String> {
        self.load_calls.lock().unwrap().clone()
    }

    pub fn preload_calls(&self) -> Vec<String> {
        self.preload_calls.lock().unwrap().clone()
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.delete_calls.lock().unwrap().clone()
    }

    pub fn delete_all_calls(&self) -> usize {
        self.delete_all_calls.load(Ordering::SeqCst)
    }

    pub fn controllers(&self) -> Vec<Arc<MockCharacterController>> {
        self.controllers.lock().unwrap().clone()
    }

    pub fn last_controller(&self) -> Arc<MockCharacterController> {
        self.controllers
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no controller opened")
    }
}

#[async_trait]
impl AvatarEngine for MockEngine {
    async fn initialize(&self, _config: &SdkConfig) -> Result<(), EngineError> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_initialize.swap(false, Ordering::SeqCst) {
            return Err(EngineError::rejected("license check failed"));
        }
        Ok(())
    }

    fn apply_config(&self, config: &SdkConfig) {
        self.applied_configs.lock().unwrap().push(config.clone());
    }

    fn supports_current_device(&self) -> bool {
        !self.unsupported_device.load(Ordering::SeqCst)
    }

    async fn load(
        &self,
        character_id: &str,
        progress: ProgressSink,
    ) -> Result<Character, EngineError> {
        self.load_calls
            .lock()
            .unwrap()
            .push(character_id.to_string());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(character_id)
            .cloned()
            .unwrap_or_default();

        if let Some(gate) = &script.gate {
            gate.notified().await;
        }

        progress.report(LoadProgress::Preparing);
        for p in &script.progress {
            progress.report(LoadProgress::Downloading { progress: *p });
            tokio::task::yield_now().await;
        }

        match script.outcome {
            LoadOutcome::Succeed => {
                progress.report(LoadProgress::Completed);
                Ok(Character::new(character_id))
            }
            LoadOutcome::Fail(error) => Err(error),
            LoadOutcome::Panic => panic!("mock engine exploded loading {character_id}"),
        }
    }

    async fn preload(&self, character_id: &str) -> Result<bool, EngineError> {
        self.preload_calls
            .lock()
            .unwrap()
            .push(character_id.to_string());
        match self.preload_failures.lock().unwrap().get(character_id) {
            Some(error) => Err(error.clone()),
            None => Ok(true),
        }
    }

    async fn delete(&self, character_id: &str) -> Result<(), EngineError> {
        self.delete_calls
            .lock()
            .unwrap()
            .push(character_id.to_string());
        match self.delete_failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn delete_all(&self) -> Result<(), EngineError> {
        self.delete_all_calls.fetch_add(1, Ordering::SeqCst);
        match self.delete_failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn open(
        &self,
        character: &Character,
        view: &ViewOptions,
    ) -> Result<Arc<dyn CharacterController>, EngineError> {
        if let Some(error) = self.open_failure.lock().unwrap().clone() {
            return Err(error);
        }
        let behavior = self.controller_template.lock().unwrap().clone();
        let controller = Arc::new(MockCharacterController::new(
            &character.id,
            view.clone(),
            behavior,
        ));
        self.controllers.lock().unwrap().push(controller.clone());
        Ok(controller)
    }
}

// ============================================================================
// Mock Character Controller
// ============================================================================

/// Calls recorded by `MockCharacterController`
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerCall {
    Start,
    Stop,
    Interrupt,
    SendAudio { len: usize, end: bool },
    SetVolume(f32),
    Dispose,
}

#[derive(Debug, Clone, Default)]
pub struct ControllerBehavior {
    pub reject_audio: bool,
    pub reject_start: bool,
    pub supports_volume: bool,
    /// Report `connecting`/`connected` from inside `start`
    pub connect_on_start: bool,
}

pub struct MockCharacterController {
    pub character_id: String,
    pub view: ViewOptions,
    behavior: ControllerBehavior,
    calls: Mutex<Vec<ControllerCall>>,
    observer: Mutex<Option<Arc<dyn EngineObserver>>>,
}

impl MockCharacterController {
    fn new(character_id: &str, view: ViewOptions, behavior: ControllerBehavior) -> Self {
        Self {
            character_id: character_id.to_string(),
            view,
            behavior,
            calls: Mutex::new(Vec::new()),
            observer: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> Vec<ControllerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn dispose_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == ControllerCall::Dispose)
            .count()
    }

    pub fn has_observer(&self) -> bool {
        self.observer.lock().unwrap().is_some()
    }

    fn record(&self, call: ControllerCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// The observer currently registered, kept alive past a later release
    pub fn observer(&self) -> Option<Arc<dyn EngineObserver>> {
        self.observer.lock().unwrap().clone()
    }

    // Simulated engine callbacks

    pub fn emit_connection(&self, state: ConnectionState) {
        if let Some(observer) = self.observer() {
            observer.on_connection_state(state);
        }
    }

    pub fn emit_conversation(&self, state: ConversationState) {
        if let Some(observer) = self.observer() {
            observer.on_conversation_state(state);
        }
    }

    pub fn emit_player(&self, state: PlayerState) {
        if let Some(observer) = self.observer() {
            observer.on_player_state(state);
        }
    }

    pub fn emit_error(&self, error_id: &str) {
        if let Some(observer) = self.observer() {
            observer.on_error(error_id);
        }
    }
}

impl CharacterController for MockCharacterController {
    fn start(&self) -> Result<(), EngineError> {
        self.record(ControllerCall::Start);
        if self.behavior.reject_start {
            return Err(EngineError::rejected("not ready"));
        }
        if self.behavior.connect_on_start {
            self.emit_connection(ConnectionState::Connecting);
            self.emit_connection(ConnectionState::Connected);
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), EngineError> {
        self.record(ControllerCall::Stop);
        Ok(())
    }

    fn interrupt(&self) -> Result<(), EngineError> {
        self.record(ControllerCall::Interrupt);
        Ok(())
    }

    fn send_audio(&self, audio: &[u8], end: bool) -> Result<(), EngineError> {
        self.record(ControllerCall::SendAudio {
            len: audio.len(),
            end,
        });
        if self.behavior.reject_audio {
            return Err(EngineError::rejected("not connected"));
        }
        Ok(())
    }

    fn set_volume(&self, level: f32) -> Result<(), EngineError> {
        self.record(ControllerCall::SetVolume(level));
        if self.behavior.supports_volume {
            Ok(())
        } else {
            Err(EngineError::unsupported("volume control"))
        }
    }

    fn set_observer(&self, observer: Option<Arc<dyn EngineObserver>>) {
        *self.observer.lock().unwrap() = observer;
    }

    fn dispose(&self) {
        self.record(ControllerCall::Dispose);
    }
}

// ============================================================================
// Stream Helpers
// ============================================================================

/// Collect up to `count` messages, giving up after `timeout`
pub async fn collect(
    stream: &mut UnboundedReceiverStream<OutboundMessage>,
    count: usize,
    timeout: Duration,
) -> Vec<OutboundMessage> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut messages = Vec::new();
    while messages.len() < count {
        match tokio::time::timeout_at(deadline, stream.next()).await {
            Ok(Some(message)) => messages.push(message),
            Ok(None) | Err(_) => break,
        }
    }
    messages
}

/// Everything that arrives within `window`
pub async fn drain_for(
    stream: &mut UnboundedReceiverStream<OutboundMessage>,
    window: Duration,
) -> Vec<OutboundMessage> {
    collect(stream, usize::MAX, window).await
}

// ============================================================================
// Test Bridge
// ============================================================================

pub type MockSdk = AvatarSdk<Arc<MockEngine>>;

/// A controller wired to a mock engine and a stream sink
pub struct TestBridge {
    pub engine: Arc<MockEngine>,
    pub sdk: Arc<MockSdk>,
    pub controller: SessionController<Arc<MockEngine>>,
    pub events: UnboundedReceiverStream<OutboundMessage>,
}

impl TestBridge {
    /// Build the bridge and consume the initial `disconnected` event
    pub async fn new(engine: MockEngine) -> Self {
        let engine = Arc::new(engine);
        let sdk = AvatarSdk::shared(engine.clone(), SdkConfig::default());
        let (sink, mut events) = StreamSink::new();
        let (forwarder, _task) = EventForwarder::spawn(sink);
        let controller = SessionController::open(sdk.clone(), forwarder, &ViewParams::default());

        let initial = collect(&mut events, 1, Duration::from_secs(1)).await;
        assert_eq!(
            initial.first().map(|m| &m.event),
            Some(&Event::ConnectionState(ConnectionState::Disconnected))
        );

        Self {
            engine,
            sdk,
            controller,
            events,
        }
    }

    pub async fn next_events(&mut self, count: usize) -> Vec<Event> {
        collect(&mut self.events, count, Duration::from_secs(2))
            .await
            .into_iter()
            .map(|m| m.event)
            .collect()
    }

    /// Events that arrive in the next 100ms
    pub async fn quiet(&mut self) -> Vec<Event> {
        drain_for(&mut self.events, Duration::from_millis(100))
            .await
            .into_iter()
            .map(|m| m.event)
            .collect()
    }
}
