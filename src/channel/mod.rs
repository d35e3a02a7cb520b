//! Realtime channel between the session client and the command service.
//!
//! The hosting application owns a [`Connection`] and hands it to the
//! session client explicitly; no global handle exists. The other end of the
//! pair is a
//! [`ServiceEndpoint`], consumed by whatever fulfils the service side of the
//! wire contract (see [`exec`]).
//!
//! Events are delivered in order. Handlers run on the UI thread when
//! [`Connection::dispatch_pending`] is called from the event loop; nothing
//! here blocks.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod exec;

/// Wire event: request attachment to a named target.
pub const EV_TERMINAL_START: &str = "terminal_start";
/// Wire event: raw command text from the client.
pub const EV_TERMINAL_INPUT: &str = "terminal_input";
/// Wire event: streamed text chunk to render.
pub const EV_TERMINAL_OUTPUT: &str = "terminal_output";
/// Wire event: target/runtime status for the status bar.
pub const EV_TERMINAL_STATUS: &str = "terminal_status";
/// Wire event: the service asks the client to wipe its pane.
pub const EV_TERMINAL_CLEAR: &str = "terminal_clear";
/// Wire event: a command was accepted by the service.
pub const EV_COMMAND_STARTED: &str = "terminal_command_started";
/// Wire event: structured result of a finished command.
pub const EV_COMMAND_RESULT: &str = "terminal_command_result";
/// Wire event: full command history snapshot from the service.
pub const EV_HISTORY_FULL: &str = "terminal_history_full";
/// Local synthetic event, fired exactly once when the service end goes away.
pub const EV_DISCONNECT: &str = "disconnect";

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("channel is disconnected")]
    Disconnected,

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Payload of `terminal_start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub container_id: String,
}

/// Payload of `terminal_input` and `terminal_output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextData {
    pub data: String,
}

/// Payload of `terminal_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    /// "up" or "down"
    pub docker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// "present", "missing" or "unknown"
    pub container: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_running: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Payload of `terminal_command_started`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandStarted {
    pub id: u64,
    pub command: String,
}

/// Payload of `terminal_command_result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub id: u64,
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}

/// A named event with a JSON payload.
#[derive(Debug, Clone)]
pub struct WireEvent {
    pub name: String,
    pub payload: Value,
}

/// Inbound event handler, invoked on the UI thread during dispatch.
pub type Handler = Box<dyn FnMut(&Value)>;

/// Proof of a subscription; pass back to [`Connection::unsubscribe`].
///
/// The session client keeps one token per subscription it makes and
/// unsubscribes all of them before resubscribing, so repeated
/// initialization never stacks duplicate handlers.
#[derive(Debug)]
pub struct SubscriptionToken {
    event: String,
    id: u64,
}

/// Client side of the channel.
pub struct Connection {
    outbound: Sender<WireEvent>,
    inbound: Receiver<WireEvent>,
    handlers: RefCell<HashMap<String, Vec<(u64, Handler)>>>,
    next_id: Cell<u64>,
    connected: Arc<AtomicBool>,
    disconnect_fired: Cell<bool>,
}

impl Connection {
    /// Create a connected pair: the client handle and the service end.
    pub fn pair() -> (Connection, ServiceEndpoint) {
        let (out_tx, out_rx) = mpsc::channel();
        let (in_tx, in_rx) = mpsc::channel();
        let connected = Arc::new(AtomicBool::new(true));

        let conn = Connection {
            outbound: out_tx,
            inbound: in_rx,
            handlers: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
            connected: connected.clone(),
            disconnect_fired: Cell::new(false),
        };
        let endpoint = ServiceEndpoint {
            incoming: out_rx,
            sink: EventSink {
                tx: in_tx,
                connected,
            },
        };
        (conn, endpoint)
    }

    /// Whether the service end is still attached.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Emit an outbound event to the service.
    pub fn emit<T: Serialize>(&self, event: &str, payload: &T) -> Result<(), ChannelError> {
        let payload = serde_json::to_value(payload)?;
        self.outbound
            .send(WireEvent {
                name: event.to_string(),
                payload,
            })
            .map_err(|_| {
                self.connected.store(false, Ordering::SeqCst);
                ChannelError::Disconnected
            })
    }

    /// Register a handler for an inbound event name.
    pub fn subscribe(&self, event: &str, handler: Handler) -> SubscriptionToken {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.handlers
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        SubscriptionToken {
            event: event.to_string(),
            id,
        }
    }

    /// Remove a previously registered handler.
    pub fn unsubscribe(&self, token: SubscriptionToken) {
        if let Some(list) = self.handlers.borrow_mut().get_mut(&token.event) {
            list.retain(|(id, _)| *id != token.id);
        }
    }

    /// Drain queued inbound events and invoke their handlers, in arrival
    /// order. Returns the number of events dispatched.
    ///
    /// When the service end has gone away a synthetic [`EV_DISCONNECT`]
    /// event is dispatched exactly once.
    pub fn dispatch_pending(&self) -> usize {
        let mut dispatched = 0;
        loop {
            match self.inbound.try_recv() {
                Ok(event) => {
                    self.dispatch(&event.name, &event.payload);
                    dispatched += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.connected.store(false, Ordering::SeqCst);
                    if !self.disconnect_fired.get() {
                        self.disconnect_fired.set(true);
                        self.dispatch(EV_DISCONNECT, &Value::Null);
                        dispatched += 1;
                    }
                    break;
                }
            }
        }
        dispatched
    }

    fn dispatch(&self, name: &str, payload: &Value) {
        // Take the list out for the duration of the calls so a handler can
        // subscribe or unsubscribe without hitting the RefCell borrow.
        let list = self.handlers.borrow_mut().remove(name);
        let Some(mut list) = list else {
            return;
        };
        for (_, handler) in list.iter_mut() {
            handler(payload);
        }
        let mut map = self.handlers.borrow_mut();
        let slot = map.entry(name.to_string()).or_default();
        let added = std::mem::take(slot);
        *slot = list;
        slot.extend(added);
    }
}

/// Sending half available to service worker threads.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<WireEvent>,
    connected: Arc<AtomicBool>,
}

impl EventSink {
    /// Send an inbound event towards the client.
    pub fn send<T: Serialize>(&self, event: &str, payload: &T) -> Result<(), ChannelError> {
        let payload = serde_json::to_value(payload)?;
        self.tx
            .send(WireEvent {
                name: event.to_string(),
                payload,
            })
            .map_err(|_| ChannelError::Disconnected)
    }
}

/// Service side of the channel.
pub struct ServiceEndpoint {
    incoming: Receiver<WireEvent>,
    sink: EventSink,
}

impl ServiceEndpoint {
    /// Block until the client emits an event. `None` once the client is gone.
    pub fn recv(&self) -> Option<WireEvent> {
        self.incoming.recv().ok()
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    #[allow(dead_code)]
    pub fn try_recv(&self) -> Option<WireEvent> {
        self.incoming.try_recv().ok()
    }

    /// Send an inbound event towards the client.
    pub fn send<T: Serialize>(&self, event: &str, payload: &T) -> Result<(), ChannelError> {
        self.sink.send(event, payload)
    }

    /// Clonable sender for worker threads.
    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }
}

impl Drop for ServiceEndpoint {
    fn drop(&mut self) {
        self.sink.connected.store(false, Ordering::SeqCst);
    }
}
