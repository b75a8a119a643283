mod common;
use common::{connect, test_server};

use pubwire::{pubsub::Connect, Client, ErrorBody, Frame, InitialData, Server, ServerEvent};
use serde_json::json;
use std::{net::SocketAddr, time::Duration};
use tokio::{sync::broadcast, time::timeout};

const SILENCE: Duration = Duration::from_millis(150);

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

fn url(port: u16) -> String {
    format!("ws://127.0.0.1:{port}")
}

/// Wait for the next `Connection` event, skipping unrelated signals.
async fn next_connection(events: &mut broadcast::Receiver<ServerEvent>) -> Client {
    timeout(Duration::from_secs(2), async {
        loop {
            if let ServerEvent::Connection(client) = events.recv().await.unwrap() {
                return client;
            }
        }
    })
    .await
    .expect("timed out waiting for a connection event")
}

fn error_body(frame: &Frame) -> ErrorBody {
    let Frame::Error { body: Some(body), .. } = frame else {
        panic!("expected an error frame with a body, got: {frame:?}");
    };
    serde_json::from_value(body.clone()).unwrap()
}

#[tokio::test]
async fn welcome_is_the_first_frame() {
    let _shutdown = addr(4301).serve(test_server()).await.unwrap();
    let mut client = connect(&url(4301)).await;

    assert_eq!(client.recv_raw().await, "0|3");
}

#[tokio::test]
async fn invoke_replies_with_a_result_on_the_same_id() {
    let _shutdown = addr(4302).serve(test_server()).await.unwrap();
    let mut client = connect(&url(4302)).await;
    client.expect_welcome().await;

    client.send_raw("1$27~/hello|\"hi\"").await;
    assert_eq!(client.recv_raw().await, "2$27|\"hi\"");
}

#[tokio::test]
async fn invoke_on_an_unregistered_path_is_a_404() {
    // a server with no routes at all
    let _shutdown = addr(4303).serve(Server::new()).await.unwrap();
    let mut client = connect(&url(4303)).await;
    client.expect_welcome().await;

    client.send_raw("1$27~/hello|\"hi\"").await;
    let frame = client.recv_frame().await;
    assert_eq!(frame.id(), Some("27"));
    assert_eq!(error_body(&frame), ErrorBody::not_found());
    client.expect_silence(SILENCE).await;
}

#[tokio::test]
async fn handler_invoke_errors_pass_through_verbatim() {
    let _shutdown = addr(4304).serve(test_server()).await.unwrap();
    let mut client = connect(&url(4304)).await;
    client.expect_welcome().await;

    client.send_raw("1$27~/fail/custom|").await;
    let body = error_body(&client.recv_frame().await);
    assert_eq!(body.status, 527);
    assert_eq!(body.message, "Custom Error");
}

#[tokio::test]
async fn generic_handler_failures_become_500s_and_signal_invoke_error() {
    let server = test_server();
    let mut events = server.events();
    let _shutdown = addr(4305).serve(server).await.unwrap();
    let mut client = connect(&url(4305)).await;
    client.expect_welcome().await;

    client.send_raw("1$9~/fail/generic|").await;
    let frame = client.recv_frame().await;
    assert_eq!(frame.id(), Some("9"));
    assert_eq!(error_body(&frame).status, 500);

    let signalled = timeout(Duration::from_secs(2), async {
        loop {
            if let ServerEvent::InvokeError { invoke, .. } = events.recv().await.unwrap() {
                return invoke;
            }
        }
    })
    .await
    .expect("timed out waiting for the invoke error signal");
    assert_eq!(signalled.path(), Some("/fail/generic"));
    assert_eq!(signalled.id(), Some("9"));
}

#[tokio::test]
async fn params_and_splats_reach_the_handler() {
    let _shutdown = addr(4306).serve(test_server()).await.unwrap();
    let mut client = connect(&url(4306)).await;
    client.expect_welcome().await;

    client.send_raw("1$1~/hello/me/whatever|").await;
    let frame = client.recv_frame().await;
    assert_eq!(
        frame.body(),
        Some(&json!({
            "pattern": "/hello/:who/*",
            "who": "me",
            "splats": ["whatever"],
        }))
    );
}

#[tokio::test]
async fn middleware_layers_run_in_order() {
    let _shutdown = addr(4307).serve(test_server()).await.unwrap();
    let mut client = connect(&url(4307)).await;
    client.expect_welcome().await;

    client.send_raw("1$1~/chain|\"payload\"").await;
    let frame = client.recv_frame().await;
    assert_eq!(
        frame.body(),
        Some(&json!({"stamped": true, "body": "payload"}))
    );
}

#[tokio::test]
async fn publish_fans_out_to_current_subscribers_only() {
    let server = test_server();
    let mut events = server.events();
    let _shutdown = addr(4308).serve(server.clone()).await.unwrap();

    let mut ws_a = connect(&url(4308)).await;
    ws_a.expect_welcome().await;
    let a = next_connection(&mut events).await;

    let mut ws_b = connect(&url(4308)).await;
    ws_b.expect_welcome().await;
    let b = next_connection(&mut events).await;

    server.subscribe(&a, "/hello", None);
    server.subscribe(&b, "/hello", Some(InitialData::Ready(json!("hi"))));

    // only the client subscribed with initial data hears it
    assert_eq!(ws_b.recv_raw().await, "4~/hello|\"hi\"");
    ws_a.expect_silence(SILENCE).await;

    server.publish("/hello", Some(json!("world")));
    assert_eq!(ws_a.recv_raw().await, "4~/hello|\"world\"");
    assert_eq!(ws_b.recv_raw().await, "4~/hello|\"world\"");

    assert!(server.unsubscribe(&a, "/hello"));
    assert!(!server.unsubscribe(&a, "/hello"));
    server.publish("/hello", Some(json!("again")));
    assert_eq!(ws_b.recv_raw().await, "4~/hello|\"again\"");
    ws_a.expect_silence(SILENCE).await;
}

#[tokio::test]
async fn duplicate_subscribe_skips_the_initial_data() {
    let server = test_server();
    let mut events = server.events();
    let _shutdown = addr(4309).serve(server.clone()).await.unwrap();

    let mut ws = connect(&url(4309)).await;
    ws.expect_welcome().await;
    let client = next_connection(&mut events).await;

    server.subscribe(&client, "/topic", None);
    server.subscribe(&client, "/topic", Some(InitialData::Ready(json!("late"))));
    ws.expect_silence(SILENCE).await;
}

#[tokio::test]
async fn deferred_initial_data_arrives_after_resolution() {
    let server = test_server();
    let mut events = server.events();
    let _shutdown = addr(4310).serve(server.clone()).await.unwrap();

    let mut ws = connect(&url(4310)).await;
    ws.expect_welcome().await;
    let client = next_connection(&mut events).await;

    server.subscribe(
        &client,
        "/slow",
        Some(InitialData::deferred(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Some(json!("eventually"))
        })),
    );
    assert_eq!(ws.recv_raw().await, "4~/slow|\"eventually\"");
}

#[tokio::test]
async fn deferred_initial_data_is_dropped_after_unsubscribe() {
    let server = test_server();
    let mut events = server.events();
    let _shutdown = addr(4311).serve(server.clone()).await.unwrap();

    let mut ws = connect(&url(4311)).await;
    ws.expect_welcome().await;
    let client = next_connection(&mut events).await;

    server.subscribe(
        &client,
        "/slow",
        Some(InitialData::deferred(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Some(json!("eventually"))
        })),
    );
    server.unsubscribe(&client, "/slow");
    ws.expect_silence(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn undecodable_frames_close_the_connection() {
    let server = test_server();
    let mut events = server.events();
    let _shutdown = addr(4312).serve(server).await.unwrap();

    let mut ws = connect(&url(4312)).await;
    ws.expect_welcome().await;
    let _client = next_connection(&mut events).await;

    ws.send_raw("zzz").await;

    let raw = timeout(Duration::from_secs(2), async {
        loop {
            if let ServerEvent::ParserError { raw, .. } = events.recv().await.unwrap() {
                return raw;
            }
        }
    })
    .await
    .expect("timed out waiting for the parser error signal");
    assert_eq!(raw, "zzz");
    ws.expect_closed().await;
}

#[tokio::test]
async fn disconnect_tears_down_subscriptions() {
    let server = test_server();
    let mut events = server.events();
    let _shutdown = addr(4313).serve(server.clone()).await.unwrap();

    let mut ws = connect(&url(4313)).await;
    ws.expect_welcome().await;
    let client = next_connection(&mut events).await;
    let mut client_events = client.events();

    server.subscribe(&client, "/hello", None);
    drop(ws);

    let closed = timeout(Duration::from_secs(2), client_events.recv())
        .await
        .expect("timed out waiting for the close signal")
        .unwrap();
    assert!(matches!(closed, pubwire::ClientEvent::Close { .. }));
    assert_eq!(server.client_count(), 0);
    assert_eq!(client.ready_state(), pubwire::ReadyState::Closed);

    // publishing to the departed client's path is a quiet no-op
    server.publish("/hello", Some(json!("anyone?")));
}

#[tokio::test]
async fn server_close_disconnects_every_client() {
    let server = test_server();
    let _shutdown = addr(4314).serve(server.clone()).await.unwrap();

    let mut ws = connect(&url(4314)).await;
    ws.expect_welcome().await;
    assert_eq!(server.client_count(), 1);

    server.close().await;
    assert_eq!(server.client_count(), 0);
    ws.expect_closed().await;
}
