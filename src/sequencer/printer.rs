//! Output sinks for agent events.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::{AgentEvent, EventMessage, EventSequencer, RunSnapshot};

/// Sink for the events an agent run produces.
///
/// Implementations are transport-agnostic and must tolerate calls from
/// concurrently running sub-executors.
pub trait Printer: Send + Sync {
    /// Emit one event. A `None` message id gets a fresh one.
    fn send(&self, message_id: Option<&str>, message_type: &str, payload: Value, is_final: bool);

    /// Emit a final event with a fresh message id.
    fn send_final(&self, message_type: &str, payload: Value) {
        self.send(None, message_type, payload, true);
    }

    /// Signal that the run produced its last event.
    fn close(&self);
}

/// Printer that sequences every event and forwards it on a channel.
///
/// Sequencing and forwarding happen under one lock, so the channel order
/// always matches the assigned order numbers.
#[derive(Debug)]
pub struct SequencedPrinter {
    request_id: String,
    sequencer: Mutex<EventSequencer>,
    sender: Mutex<Option<mpsc::UnboundedSender<EventMessage>>>,
}

impl SequencedPrinter {
    /// Create a printer for one run and the receiver its events arrive on.
    pub fn new(
        request_id: impl Into<String>,
        sequencer: EventSequencer,
    ) -> (Self, mpsc::UnboundedReceiver<EventMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let printer = Self {
            request_id: request_id.into(),
            sequencer: Mutex::new(sequencer),
            sender: Mutex::new(Some(tx)),
        };
        (printer, rx)
    }

    fn sequencer(&self) -> MutexGuard<'_, EventSequencer> {
        self.sequencer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sender(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<EventMessage>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Payloads committed so far.
    pub fn snapshot(&self) -> RunSnapshot {
        self.sequencer().snapshot().clone()
    }

    /// Request this printer belongs to.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl Printer for SequencedPrinter {
    fn send(&self, message_id: Option<&str>, message_type: &str, payload: Value, is_final: bool) {
        let mut event = AgentEvent::new(message_type, payload, is_final);
        if let Some(id) = message_id {
            event = event.with_message_id(id);
        }

        let mut sequencer = self.sequencer();
        let message = sequencer.sequence(event);

        match self.sender().as_ref() {
            Some(tx) => {
                if tx.send(message).is_err() {
                    debug!(request_id = %self.request_id, "event receiver dropped");
                }
            }
            None => debug!(
                request_id = %self.request_id,
                message_type = %message_type,
                "event sent after close"
            ),
        }
    }

    fn close(&self) {
        self.sender().take();
    }
}

/// Printer that only logs events through `tracing`.
#[derive(Debug, Clone)]
pub struct TracingPrinter {
    request_id: String,
}

impl TracingPrinter {
    /// Create a logging printer for one request.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }
}

impl Printer for TracingPrinter {
    fn send(&self, message_id: Option<&str>, message_type: &str, payload: Value, is_final: bool) {
        let message_id = message_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info!(
            request_id = %self.request_id,
            message_id = %message_id,
            message_type = %message_type,
            is_final,
            "{}",
            payload
        );
    }

    fn close(&self) {
        info!(request_id = %self.request_id, "event stream closed");
    }
}
