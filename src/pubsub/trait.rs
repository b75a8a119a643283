use crate::{
    pubsub::{
        shared::{ListenerTask, DEFAULT_OUTBOUND_BUFFER_PER_CLIENT},
        ServerShutdown,
    },
    Server,
};
use std::future::Future;
use tokio::runtime::Handle;
use tokio_stream::Stream;

/// Convenience alias for naming a listener's sink half.
pub type Out<T> = <T as Listener>::FrameSink;

/// Convenience alias for naming a listener's stream half.
pub type In<T> = <T as Listener>::FrameStream;

/// Configuration object for connecting a [`Listener`].
///
/// A `Connect` implementor captures all connection-related setup (bind
/// addresses, TLS policy, and any other options of the underlying transport
/// engine) and produces only the configured [`Listener`], keeping that
/// configuration out of the server core.
///
/// ## Implementer's guide
///
/// Most implementations only provide [`Connect::make_listener`]. Give
/// [`Connect::outbound_buffer_size`] some thought: the buffer is allocated
/// per client and bounds the frames (replies and publishes) queued for a
/// client that has stopped reading. Frames beyond it are dropped, so size
/// it for your expected publish bursts.
pub trait Connect: Send + Sync + Sized {
    /// The listener type produced by the connect object.
    type Listener: Listener;

    /// The error type for instantiating a [`Listener`].
    type Error: core::error::Error + 'static;

    /// Create the listener.
    fn make_listener(self) -> impl Future<Output = Result<Self::Listener, Self::Error>> + Send;

    /// Outbound frame buffer allocated for each client connection.
    fn outbound_buffer_size(&self) -> usize {
        DEFAULT_OUTBOUND_BUFFER_PER_CLIENT
    }

    /// Instantiate the listener and run the accept loop on the given
    /// runtime handle, returning a shutdown guard.
    fn serve_on_handle(
        self,
        server: Server,
        handle: Handle,
    ) -> impl Future<Output = Result<ServerShutdown, Self::Error>> + Send {
        async move {
            let outbound_buffer_per_client = self.outbound_buffer_size();
            let tasks = server.tasks().on_handle(handle);

            ListenerTask {
                listener: self.make_listener().await?,
                server,
                outbound_buffer_per_client,
            }
            .spawn(&tasks);
            Ok(tasks.into())
        }
    }

    /// Instantiate the listener and run the accept loop on the current
    /// runtime, returning a shutdown guard.
    fn serve(self, server: Server) -> impl Future<Output = Result<ServerShutdown, Self::Error>> + Send {
        self.serve_on_handle(server, Handle::current())
    }
}

/// A `Listener` accepts incoming transport connections and splits each into
/// a [`FrameSink`] and a [`FrameStream`].
///
/// Typically this is done by accepting a combined object with a `Stream`
/// and a `Sink` and splitting it, with adapters translating between the
/// transport's message type and the protocol's text frames.
pub trait Listener: Send + 'static {
    /// The sink half produced by the listener.
    type FrameSink: FrameSink;
    /// The stream half produced by the listener.
    type FrameStream: FrameStream;
    /// The error type for the listener.
    type Error: core::error::Error;

    /// Accept an inbound connection, split into sink and stream halves.
    fn accept(
        &self,
    ) -> impl Future<Output = Result<(Self::FrameSink, Self::FrameStream), Self::Error>> + Send;
}

/// Outbound half of a connection: accepts encoded text frames.
pub trait FrameSink: Send + 'static {
    /// Error type for the sink.
    type Error: core::error::Error + 'static;

    /// Send one encoded frame.
    fn send_text(
        &mut self,
        frame: String,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Close the underlying transport.
    fn close(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Inbound half of a connection: a stream of discrete UTF-8 text messages.
pub trait FrameStream: Stream<Item = String> + Send + Unpin + 'static {}

impl<T> FrameStream for T where T: Stream<Item = String> + Send + Unpin + 'static {}
