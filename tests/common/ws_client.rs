use futures_util::{SinkExt, StreamExt};
use pubwire::Frame;
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::{
    tungstenite::{client::IntoClientRequest, Message},
    MaybeTlsStream, WebSocketStream,
};

const RECV_DEADLINE: Duration = Duration::from_secs(2);

/// Create a raw-frame websocket client for driving the wire protocol
/// directly.
pub async fn connect(url: &str) -> WsClient {
    let request = url.into_client_request().unwrap();
    let (socket, _) = tokio_tungstenite::connect_async(request).await.unwrap();

    WsClient { socket }
}

pub struct WsClient {
    socket: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl WsClient {
    /// Send one already-encoded frame.
    pub async fn send_raw(&mut self, frame: &str) {
        self.socket
            .send(Message::text(frame.to_owned()))
            .await
            .unwrap();
    }

    /// Receive the next text message, panicking after two seconds.
    pub async fn recv_raw(&mut self) -> String {
        let message = timeout(RECV_DEADLINE, self.socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection ended while waiting for a frame")
            .unwrap();
        match message {
            Message::Text(text) => text.to_string(),
            other => panic!("unexpected message type: {other:?}"),
        }
    }

    /// Receive and decode the next frame.
    pub async fn recv_frame(&mut self) -> Frame {
        let raw = self.recv_raw().await;
        Frame::decode(&raw).unwrap_or_else(|err| panic!("bad frame {raw:?}: {err}"))
    }

    /// Assert the welcome handshake.
    pub async fn expect_welcome(&mut self) {
        assert_eq!(self.recv_raw().await, "0|3");
    }

    /// Assert that nothing arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Ok(Some(Ok(message))) = timeout(window, self.socket.next()).await {
            panic!("expected silence, got: {message:?}");
        }
    }

    /// Wait for the connection to be closed by the server.
    pub async fn expect_closed(&mut self) {
        let deadline = timeout(RECV_DEADLINE, async {
            loop {
                match self.socket.next().await {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    Some(Ok(other)) => panic!("expected close, got: {other:?}"),
                }
            }
        });
        deadline.await.expect("timed out waiting for close");
    }
}
