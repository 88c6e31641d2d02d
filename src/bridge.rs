//! Host-facing entry point
//!
//! One `AvatarBridge` per process owns the shared SDK and answers global
//! commands. Each host view gets its own `ViewChannel`: a session controller,
//! its dispatcher and an ordered event forwarder.

use crate::config::BridgeConfig;
use crate::dispatcher::{CommandDispatcher, GlobalDispatcher, Reply};
use crate::engine::AvatarEngine;
use crate::error::WireError;
use crate::forwarder::{EventForwarder, EventSink};
use crate::sdk::AvatarSdk;
use crate::session::{SessionController, ViewParams};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct AvatarBridge<E: AvatarEngine + 'static> {
    sdk: Arc<AvatarSdk<E>>,
    global: GlobalDispatcher<E>,
}

impl<E: AvatarEngine + 'static> AvatarBridge<E> {
    pub fn new(engine: E, config: &BridgeConfig) -> Self {
        tracing::info!(
            environment = %config.environment,
            has_token = config.session_token.is_some(),
            "Avatar bridge created"
        );
        let sdk = AvatarSdk::shared(engine, config.sdk_config());
        Self {
            global: GlobalDispatcher::new(Arc::clone(&sdk)),
            sdk,
        }
    }

    pub fn sdk(&self) -> &Arc<AvatarSdk<E>> {
        &self.sdk
    }

    /// Handle a command that is not bound to any view.
    ///
    /// # Errors
    /// `INVALID_ARGUMENT` for malformed arguments.
    pub fn dispatch_global(&self, method: &str, args: &Value) -> Result<Reply, WireError> {
        self.global.dispatch(method, args).map_err(|e| e.to_wire())
    }

    /// Create the channel for a new host view. Events for the view are
    /// delivered to `sink` from a task on the current runtime.
    ///
    /// # Errors
    /// `INVALID_ARGUMENT` when the creation arguments are mistyped.
    pub fn create_view(
        &self,
        args: &Value,
        sink: impl EventSink + 'static,
    ) -> Result<ViewChannel<E>, WireError> {
        let params = ViewParams::from_args(args).map_err(|e| e.to_wire())?;
        let (forwarder, delivery) = EventForwarder::spawn(sink);
        let controller = SessionController::open(Arc::clone(&self.sdk), forwarder.clone(), &params);

        Ok(ViewChannel {
            params,
            dispatcher: CommandDispatcher::new(controller),
            forwarder,
            delivery,
        })
    }
}

/// Everything bound to one host view
pub struct ViewChannel<E: AvatarEngine + 'static> {
    params: ViewParams,
    dispatcher: CommandDispatcher<E>,
    forwarder: EventForwarder,
    delivery: JoinHandle<()>,
}

impl<E: AvatarEngine + 'static> ViewChannel<E> {
    pub fn params(&self) -> &ViewParams {
        &self.params
    }

    pub fn controller(&self) -> &SessionController<E> {
        self.dispatcher.controller()
    }

    /// Run one host invocation, rendering any error in its wire form.
    ///
    /// # Errors
    /// See [`CommandDispatcher::dispatch`].
    pub async fn dispatch(&self, method: &str, args: &Value) -> Result<Reply, WireError> {
        self.dispatcher
            .dispatch(method, args)
            .await
            .map_err(|e| e.to_wire())
    }

    /// Dispose the session and stop event delivery once queued events are out
    pub async fn close(self) {
        self.dispatcher.controller().dispose();
        self.forwarder.shutdown();
        if let Err(e) = self.delivery.await {
            tracing::warn!(error = %e, "Event delivery task ended abnormally");
        }
        tracing::info!(view_id = ?self.params.view_id, "View channel closed");
    }
}
