//! # Streaming Transport Integration Tests
//!
//! Drives `ExpTechWsClient` against the local mock node: the `start`
//! handshake, subscription confirmation, data delivery, credential
//! rejection, in-place re-dial and the intentional close.

use lib_trem::core::{Dispatcher, HostEvent};
use lib_trem::ingestors::{ConnectionState, ExpTechWsClient, PushTransport};
use lib_trem::models::StreamPayload;
use lib_trem::retrieve::RouteRequest;
use lib_trem::{TremConfig, TremError};
use project_tests::{eventually, MockStream, StreamReply};
use serde_json::json;

async fn connected(stream: &MockStream, dispatcher: Dispatcher) -> ExpTechWsClient {
    let config = TremConfig { access_token: Some("token-123".into()), ..Default::default() };
    let mut client = ExpTechWsClient::new(&config, dispatcher).unwrap();
    client
        .initialize_route(&RouteRequest { node: None, url: Some(stream.url.clone()) }, &[])
        .unwrap();
    client.connect().await.unwrap();
    client
}

fn subscribed() -> StreamReply {
    StreamReply::Subscribe(vec!["websocket.eew".into(), "websocket.report".into()])
}

#[tokio::test]
async fn handshake_subscription_and_data() {
    let stream = MockStream::start(subscribed()).await;
    let mut client = connected(&stream, Dispatcher::default()).await;

    eventually("subscription", || !client.subscriptions().is_empty()).await;
    assert_eq!(client.state(), ConnectionState::Streaming);
    assert!(client.is_running());

    let handshake = &stream.handshakes()[0];
    assert_eq!(handshake["type"], "start");
    assert_eq!(handshake["key"], "token-123");
    assert!(handshake["service"].as_array().unwrap().contains(&json!("websocket.eew")));

    assert!(matches!(client.recv(), Err(TremError::NoMessage)));

    stream.push(json!({
        "type": "data",
        "time": 1_744_000_000_000_i64,
        "data": {"type": "eew", "author": "cwa", "id": "1140812", "serial": 3,
                 "eq": {"lat": 23.8, "lon": 121.6, "depth": 10, "mag": 5.6}}
    }));
    eventually("eew payload", || client.recv().is_ok()).await;
    match client.recv().unwrap() {
        StreamPayload::Eew(record) => assert_eq!(record.revision_key(), ("1140812", Some(3))),
        other => panic!("unexpected payload {:?}", other),
    }

    // Unknown and malformed frames leave the latest payload in place.
    stream.push(json!({"type": "data", "data": {"type": "rts"}}));
    stream.push(json!({"type": "data", "data": {"type": "eew", "serial": 1}}));
    stream.push(json!({"type": "ntp", "time": 1, "data": {}}));
    eventually("ntp payload", || matches!(client.recv(), Ok(StreamPayload::Ntp(_)))).await;

    client.disconnect().await;
}

#[tokio::test]
async fn rejected_token_revokes_auth() {
    let stream = MockStream::start(StreamReply::Reject).await;
    let mut client = connected(&stream, Dispatcher::default()).await;

    eventually("auth revoked", || client.auth_revoked()).await;
    assert_eq!(client.state(), ConnectionState::Degraded);
    assert!(client.subscriptions().is_empty());

    client.disconnect().await;
}

#[tokio::test]
async fn empty_subscription_list_revokes_auth() {
    let stream = MockStream::start(StreamReply::Subscribe(Vec::new())).await;
    let mut client = connected(&stream, Dispatcher::default()).await;

    eventually("auth revoked", || client.auth_revoked()).await;
    client.disconnect().await;
}

#[tokio::test]
async fn verify_frame_resends_the_handshake() {
    let stream = MockStream::start(subscribed()).await;
    let mut client = connected(&stream, Dispatcher::default()).await;
    eventually("first handshake", || stream.handshakes().len() == 1).await;

    stream.push(json!({"type": "verify"}));
    eventually("second handshake", || stream.handshakes().len() == 2).await;
    assert_eq!(stream.connections(), 1);

    client.disconnect().await;
}

#[tokio::test]
async fn remote_close_redials_in_place() {
    let stream = MockStream::start(subscribed()).await;
    let dispatcher = Dispatcher::default();
    let mut events = dispatcher.subscribe();
    let mut client = connected(&stream, dispatcher).await;
    eventually("subscription", || !client.subscriptions().is_empty()).await;

    stream.close_all(1011);
    eventually("second connection", || stream.connections() == 2).await;
    eventually("resubscription", || stream.handshakes().len() == 2 && !client.subscriptions().is_empty()).await;
    assert!(client.is_running());
    assert!(events.try_recv().is_err(), "a successful re-dial raises no event");

    client.disconnect().await;
}

#[tokio::test]
async fn disconnect_closes_with_code_999() {
    let stream = MockStream::start(subscribed()).await;
    let mut client = connected(&stream, Dispatcher::default()).await;
    eventually("subscription", || !client.subscriptions().is_empty()).await;

    client.disconnect().await;
    eventually("close frame", || stream.close_codes() == [999]).await;

    assert!(!client.is_running());
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(matches!(client.recv(), Err(TremError::NotConnected)));
    assert_eq!(stream.connections(), 1, "an intentional close is not re-dialled");
}

#[tokio::test]
async fn reconnect_replaces_the_connection() {
    let stream = MockStream::start(subscribed()).await;
    let mut client = connected(&stream, Dispatcher::default()).await;
    eventually("subscription", || !client.subscriptions().is_empty()).await;

    client.reconnect().await.unwrap();
    eventually("second connection", || stream.connections() == 2).await;
    eventually("resubscription", || !client.subscriptions().is_empty()).await;
    eventually("close of the first connection", || stream.close_codes() == [999]).await;

    client.disconnect().await;
}

#[tokio::test]
async fn unreachable_node_requests_reload() {
    let dispatcher = Dispatcher::default();
    let mut events = dispatcher.subscribe();
    let config = TremConfig { access_token: Some("token".into()), ..Default::default() };
    let mut client = ExpTechWsClient::new(&config, dispatcher).unwrap();
    client
        .initialize_route(&RouteRequest { node: None, url: Some("ws://127.0.0.1:9/websocket".into()) }, &[])
        .unwrap();

    assert!(matches!(client.connect().await, Err(TremError::Handshake { .. })));
    assert!(matches!(*events.recv().await.unwrap(), HostEvent::ReloadRequested { .. }));
}
