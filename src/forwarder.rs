//! Ordered event delivery to the host
//!
//! Engine callbacks arrive on arbitrary threads. Every event goes through one
//! unbounded queue drained by a single delivery task, so the host observes
//! events in exactly the order `emit` was called.

use crate::event::{Event, OutboundMessage};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

/// Host side of the outbound channel
pub trait EventSink: Send + Sync {
    /// Called on the delivery task, one message at a time. Must not block.
    fn deliver(&self, message: OutboundMessage);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn deliver(&self, message: OutboundMessage) {
        (**self).deliver(message);
    }
}

/// Sink that exposes delivered messages as a stream
pub struct StreamSink {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl StreamSink {
    pub fn new() -> (Self, UnboundedReceiverStream<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, UnboundedReceiverStream::new(rx))
    }
}

impl EventSink for StreamSink {
    fn deliver(&self, message: OutboundMessage) {
        if self.tx.send(message).is_err() {
            tracing::debug!("Host stream closed, outbound message discarded");
        }
    }
}

/// Cloneable handle for emitting events toward the host
#[derive(Clone)]
pub struct EventForwarder {
    tx: mpsc::UnboundedSender<Event>,
    shutdown: CancellationToken,
}

impl EventForwarder {
    /// Start the delivery task on the current runtime
    pub fn spawn(sink: impl EventSink + 'static) -> (Self, JoinHandle<()>) {
        Self::spawn_on(&Handle::current(), sink)
    }

    /// Start the delivery task on a specific runtime (e.g. the host's UI-affine one)
    pub fn spawn_on(runtime: &Handle, sink: impl EventSink + 'static) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let task = runtime.spawn(deliver_loop(rx, sink, shutdown.clone()));
        (Self { tx, shutdown }, task)
    }

    /// Queue an event. Never blocks and never reorders.
    pub fn emit(&self, event: Event) {
        tracing::trace!(method = event.method(), "Emitting event");
        if let Err(e) = self.tx.send(event) {
            tracing::warn!(method = e.0.method(), "Event forwarder stopped, event not delivered");
        }
    }

    /// Stop the delivery task once everything already queued has been delivered
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

async fn deliver_loop(
    mut rx: mpsc::UnboundedReceiver<Event>,
    sink: impl EventSink,
    shutdown: CancellationToken,
) {
    let mut seq: u64 = 0;
    let mut deliver = |event: Event| {
        seq += 1;
        sink.deliver(OutboundMessage { seq, event });
    };

    loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Some(event) => deliver(event),
                None => break,
            },
            () = shutdown.cancelled() => {
                while let Ok(event) = rx.try_recv() {
                    deliver(event);
                }
                break;
            }
        }
    }

    tracing::debug!(delivered = seq, "Event forwarder stopped");
}
