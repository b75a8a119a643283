use crate::{types::Frame, Client, HandlerError};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Buffer for server-level signals. Slow receivers observe a lag error and
/// resume with current events.
const SERVER_EVENT_BUFFER: usize = 32;

/// Shared boxed error carried by event payloads.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Signals observable on the server.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A client connection was accepted and the welcome frame dispatched.
    Connection(Client),
    /// A general engine failure, including a failing invoke-error converter.
    Error(SharedError),
    /// An inbound frame failed decoding. The raw message is attached for
    /// diagnostics; the offending connection is being closed.
    ParserError {
        /// The client whose frame failed to decode.
        client: Client,
        /// The raw inbound message.
        raw: String,
    },
    /// A handler rejection was converted to a 500 reply. Expected handler
    /// errors with a non-500 status do not raise this signal.
    InvokeError {
        /// The original handler failure.
        error: Arc<HandlerError>,
        /// The invoking client.
        client: Client,
        /// The invoke frame that triggered the failure.
        invoke: Frame,
    },
}

/// Typed broadcast bus for [`ServerEvent`]s.
///
/// Emitting never blocks; events are dropped when nobody is listening.
#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<ServerEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(SERVER_EVENT_BUFFER);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, event: ServerEvent) {
        let _ = self.tx.send(event);
    }
}
