use std::{
    fmt,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// Buffer for per-client lifecycle signals.
const CLIENT_EVENT_BUFFER: usize = 8;

/// Transport-level ready state of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    /// The transport handshake is still in progress.
    Connecting = 0,
    /// The connection is established and frames flow both ways.
    Open = 1,
    /// A close has been initiated but the transport has not finished.
    Closing = 2,
    /// The transport is gone. Sends are discarded.
    Closed = 3,
}

impl ReadyState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Signals observable on a single client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The transport closed.
    Close {
        /// Why the connection ended.
        reason: String,
        /// Error description, when the close was caused by one.
        error: Option<String>,
    },
    /// The transport reported an error.
    Error {
        /// Description of the failure.
        message: String,
    },
}

/// Instruction for a connection's write task.
#[derive(Debug)]
pub(crate) enum Outbound {
    /// An already-encoded frame to forward to the transport.
    Frame(String),
    /// Close the transport after the queued frames.
    Close,
}

/// Handle to one connected client.
///
/// Cheap to clone; equality is by connection id. A handle stays valid after
/// its connection is gone, but sends become silent no-ops.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    id: String,
    outbound: mpsc::Sender<Outbound>,
    ready: AtomicU8,
    events: broadcast::Sender<ClientEvent>,
}

impl Client {
    pub(crate) fn new(id: String, outbound: mpsc::Sender<Outbound>) -> Self {
        let (events, _) = broadcast::channel(CLIENT_EVENT_BUFFER);
        Self {
            inner: Arc::new(ClientInner {
                id,
                outbound,
                ready: AtomicU8::new(ReadyState::Connecting as u8),
                events,
            }),
        }
    }

    /// A client with no live transport behind it, for unit tests.
    #[cfg(test)]
    pub(crate) fn detached(id: &str) -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self::new(id.to_owned(), tx)
    }

    /// Stable connection id assigned at accept time.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Current transport ready state.
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.inner.ready.load(Ordering::Acquire))
    }

    /// Subscribe to this client's lifecycle signals.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Queue an already-encoded frame for the transport. Fire-and-forget:
    /// frames queued after close are discarded, and a saturated or closed
    /// outbound buffer drops the frame.
    pub(crate) fn send_frame(&self, frame: String) {
        if self.ready_state() == ReadyState::Closed {
            debug!(client = self.id(), "discarding frame for closed client");
            return;
        }
        if let Err(err) = self.inner.outbound.try_send(Outbound::Frame(frame)) {
            debug!(client = self.id(), %err, "dropping outbound frame");
        }
    }

    /// Ask the write task to close the transport.
    pub(crate) fn begin_close(&self) {
        let _ = self.inner.ready.compare_exchange(
            ReadyState::Open as u8,
            ReadyState::Closing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        let _ = self.inner.outbound.try_send(Outbound::Close);
    }

    pub(crate) fn set_ready_state(&self, state: ReadyState) {
        self.inner.ready.store(state as u8, Ordering::Release);
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        let _ = self.inner.events.send(event);
    }
}

impl PartialEq for Client {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Client {}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.inner.id)
            .field("ready_state", &self.ready_state())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn frames_for_closed_clients_are_discarded() {
        let (tx, mut rx) = mpsc::channel(4);
        let client = Client::new("c1".to_owned(), tx);
        client.set_ready_state(ReadyState::Open);

        client.send_frame("2$1|".to_owned());
        client.set_ready_state(ReadyState::Closed);
        client.send_frame("2$2|".to_owned());

        let Some(Outbound::Frame(first)) = rx.recv().await else {
            panic!("expected the pre-close frame");
        };
        assert_eq!(first, "2$1|");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn begin_close_queues_a_close_instruction() {
        let (tx, mut rx) = mpsc::channel(4);
        let client = Client::new("c1".to_owned(), tx);
        client.set_ready_state(ReadyState::Open);

        client.begin_close();
        assert_eq!(client.ready_state(), ReadyState::Closing);
        assert!(matches!(rx.recv().await, Some(Outbound::Close)));
    }

    #[test]
    fn equality_is_by_id() {
        let a = Client::detached("same");
        let b = Client::detached("same");
        let c = Client::detached("other");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
