use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, Stream, StreamExt,
};
use std::{
    future::Future,
    net::SocketAddr,
    pin::Pin,
    task::{ready, Context, Poll},
};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message, WebSocketStream};
use tracing::{debug, debug_span, Instrument};

/// Sending half of a [`WebSocketStream`].
pub(crate) type SendHalf = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Receiving half of a [`WebSocketStream`].
pub(crate) type RecvHalf = SplitStream<WebSocketStream<TcpStream>>;

/// Simple stream adapter extracting text payloads from a
/// [`WebSocketStream`]. Ping/pong and binary messages are skipped; close
/// frames and transport errors end the stream.
#[derive(Debug)]
pub struct WsTextStream {
    inner: RecvHalf,
    complete: bool,
}

impl From<RecvHalf> for WsTextStream {
    fn from(inner: RecvHalf) -> Self {
        Self {
            inner,
            complete: false,
        }
    }
}

impl WsTextStream {
    /// Handle an incoming [`Message`].
    fn handle(&self, message: Message) -> Result<Option<String>, &'static str> {
        match message {
            Message::Text(text) => Ok(Some(text.to_string())),
            Message::Close(Some(frame)) => {
                let s = "received close frame with data";
                debug!(reason = %frame, "{}", &s);
                Err(s)
            }
            Message::Close(None) => {
                let s = "ws client has gone away";
                debug!("{}", &s);
                Err(s)
            }
            _ => Ok(None),
        }
    }
}

impl Stream for WsTextStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.complete {
                return Poll::Ready(None);
            }

            let Some(Ok(msg)) = ready!(self.inner.poll_next_unpin(cx)) else {
                self.complete = true;
                return Poll::Ready(None);
            };

            match self.handle(msg) {
                Ok(Some(item)) => return Poll::Ready(Some(item)),
                Ok(None) => continue,
                Err(_) => self.complete = true,
            }
        }
    }
}

impl crate::pubsub::FrameSink for SendHalf {
    type Error = tokio_tungstenite::tungstenite::Error;

    async fn send_text(&mut self, frame: String) -> Result<(), Self::Error> {
        self.send(Message::text(frame)).await
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        SinkExt::close(self).await
    }
}

impl crate::pubsub::Listener for TcpListener {
    type FrameSink = SendHalf;

    type FrameStream = WsTextStream;

    type Error = tokio_tungstenite::tungstenite::Error;

    async fn accept(&self) -> Result<(Self::FrameSink, Self::FrameStream), Self::Error> {
        let (stream, socket_addr) = self.accept().await?;

        let span = debug_span!("ws connection", remote_addr = %socket_addr);

        let ws_stream = accept_async(stream).instrument(span).await?;

        let (send, recv) = ws_stream.split();

        Ok((send, recv.into()))
    }
}

impl crate::pubsub::Connect for SocketAddr {
    type Listener = TcpListener;
    type Error = std::io::Error;

    fn make_listener(self) -> impl Future<Output = Result<Self::Listener, Self::Error>> + Send {
        TcpListener::bind(self)
    }
}
