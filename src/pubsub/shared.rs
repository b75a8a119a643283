use crate::{
    client::{ClientEvent, Outbound, ReadyState},
    pubsub::{FrameSink, In, Listener, Out},
    Client, Server, TaskSet,
};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::StreamExt;
use tracing::{debug, error, trace};

/// Default outbound frame buffer per client.
///
/// The buffer holds encoded frames (replies and publishes) awaiting the
/// write task. A client that stops reading fills it, after which further
/// frames for that client are dropped.
pub const DEFAULT_OUTBOUND_BUFFER_PER_CLIENT: usize = 64;

/// The `ListenerTask` accepts new connections and enrolls each with the
/// server, which spawns the connection's task pair.
pub(crate) struct ListenerTask<T: Listener> {
    pub(crate) listener: T,
    pub(crate) server: Server,
    pub(crate) outbound_buffer_per_client: usize,
}

impl<T> ListenerTask<T>
where
    T: Listener,
{
    /// Task future, which will be run by [`Self::spawn`].
    ///
    /// A simple loop: accept, hand the halves to the server, repeat.
    pub(crate) async fn task_future(self) {
        let ListenerTask {
            listener,
            server,
            outbound_buffer_per_client,
        } = self;

        loop {
            let (sink, stream) = match listener.accept().await {
                Ok(halves) => halves,
                Err(err) => {
                    error!(%err, "failed to accept connection");
                    continue;
                }
            };

            server.accept::<T>(sink, stream, outbound_buffer_per_client);
        }
    }

    /// Spawn the future produced by [`Self::task_future`].
    pub(crate) fn spawn(self, tasks: &TaskSet) -> JoinHandle<Option<()>> {
        tasks.spawn(self.task_future())
    }
}

/// Task that reads inbound messages from one connection and feeds them to
/// the server: invokes are dispatched, undecodable frames close the
/// connection. When the stream ends, it runs the disconnect cleanup.
pub(crate) struct ReadTask<T: Listener> {
    pub(crate) server: Server,
    pub(crate) client: Client,
    pub(crate) frames: In<T>,
}

impl<T> ReadTask<T>
where
    T: Listener,
{
    pub(crate) async fn task_future(self) {
        let ReadTask {
            server,
            client,
            mut frames,
        } = self;

        while let Some(raw) = frames.next().await {
            server.handle_message(&client, raw);
        }
        trace!(client = client.id(), "inbound stream closed");
        server.disconnect(&client, "connection closed", None);
    }
}

/// Task that drains a connection's outbound queue into its sink. One per
/// connection; dropping the queue's senders or a failing transport write
/// ends it.
pub(crate) struct WriteTask<T: Listener> {
    pub(crate) client: Client,
    pub(crate) items: mpsc::Receiver<Outbound>,
    pub(crate) sink: Out<T>,
}

impl<T> WriteTask<T>
where
    T: Listener,
{
    pub(crate) async fn task_future(self) {
        let WriteTask {
            client,
            mut items,
            mut sink,
        } = self;

        while let Some(item) = items.recv().await {
            match item {
                Outbound::Frame(frame) => {
                    if let Err(err) = sink.send_text(frame).await {
                        debug!(client = client.id(), %err, "failed to write frame");
                        client.emit(ClientEvent::Error {
                            message: err.to_string(),
                        });
                        break;
                    }
                }
                Outbound::Close => {
                    client.set_ready_state(ReadyState::Closing);
                    if let Err(err) = sink.close().await {
                        debug!(client = client.id(), %err, "failed to close transport");
                    }
                    break;
                }
            }
        }
    }
}
