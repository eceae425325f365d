mod support;

use std::time::Duration;

use application::ConnectionId;
use futures_util::{SinkExt, StreamExt};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::{net::TcpStream, time::timeout};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
    MaybeTlsStream, WebSocketStream,
};

use support::TestServer;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn open(server: &TestServer, token: Option<&str>) -> (Socket, ConnectionId) {
    let (mut socket, _) = connect_async(server.ws_url(token))
        .await
        .expect("websocket handshake");
    let connected = next_event(&mut socket).await;
    assert_eq!(connected["event"], "connected");
    let connection_id: ConnectionId =
        serde_json::from_value(connected["data"]["connectionId"].clone()).expect("connection id");
    (socket, connection_id)
}

async fn next_event(socket: &mut Socket) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("frame within timeout")
            .expect("stream open")
            .expect("frame");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("json frame");
        }
    }
}

async fn emit(socket: &mut Socket, event: Value) {
    socket
        .send(Message::text(event.to_string()))
        .await
        .expect("send frame");
}

async fn join(socket: &mut Socket, group_id: i64) {
    emit(socket, json!({"event": "join-group", "data": group_id})).await;
    let ack = next_event(socket).await;
    assert_eq!(ack["event"], "joined-group");
    assert_eq!(ack["data"]["groupId"], group_id);
}

#[tokio::test]
async fn persisted_messages_reach_every_subscribed_socket() {
    let server = TestServer::spawn().await;
    let (alice, _) = server.register("alice").await;
    let (bob, _) = server.register("bob").await;
    let group_id = server.create_group(&alice, "general").await;
    assert_eq!(server.join_group(&bob, group_id).await.status(), StatusCode::OK);

    let (mut alice_socket, _) = open(&server, Some(&alice)).await;
    let (mut bob_socket, _) = open(&server, Some(&bob)).await;
    join(&mut alice_socket, group_id).await;
    join(&mut bob_socket, group_id).await;

    let response = server
        .send_message(&alice, json!({"group_id": group_id, "content": "hello"}))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("message json");

    for socket in [&mut alice_socket, &mut bob_socket] {
        let event = next_event(socket).await;
        assert_eq!(event["event"], "new-message");
        assert_eq!(event["data"]["groupId"], group_id);
        assert_eq!(event["data"]["message"]["id"], body["data"]["id"]);
        assert_eq!(event["data"]["message"]["username"], "alice");
        assert_eq!(event["data"]["message"]["content"], "hello");
    }
}

#[tokio::test]
async fn left_groups_stop_receiving() {
    let server = TestServer::spawn().await;
    let (alice, _) = server.register("alice").await;
    let group_id = server.create_group(&alice, "general").await;

    let (mut socket, connection_id) = open(&server, Some(&alice)).await;
    join(&mut socket, group_id).await;

    emit(&mut socket, json!({"event": "leave-group", "data": group_id})).await;
    let ack = next_event(&mut socket).await;
    assert_eq!(ack["event"], "left-group");

    server
        .send_message(&alice, json!({"group_id": group_id, "content": "quiet"}))
        .await;

    // 离开后的下一帧应当是 pong，而不是新消息
    emit(&mut socket, json!({"event": "ping"})).await;
    assert_eq!(next_event(&mut socket).await["event"], "pong");
    assert!(server
        .state
        .hub
        .subscriptions(connection_id)
        .is_empty());
}

#[tokio::test]
async fn relayed_messages_echo_to_the_sender() {
    let server = TestServer::spawn().await;
    let (mut first, _) = open(&server, None).await;
    let (mut second, _) = open(&server, None).await;
    join(&mut first, 42).await;
    join(&mut second, 42).await;

    emit(
        &mut first,
        json!({"event": "send-message", "data": {"groupId": 42, "message": {"content": "typing", "n": 1}}}),
    )
    .await;

    for socket in [&mut first, &mut second] {
        let event = next_event(socket).await;
        assert_eq!(event["event"], "new-message");
        assert_eq!(event["data"]["message"], json!({"content": "typing", "n": 1}));
    }
}

#[tokio::test]
async fn malformed_frames_get_an_error_event() {
    let server = TestServer::spawn().await;
    let (mut socket, _) = open(&server, None).await;

    emit(&mut socket, json!({"event": "dance", "data": 1})).await;
    let event = next_event(&mut socket).await;
    assert_eq!(event["event"], "error");
    assert!(event["data"]["message"].as_str().is_some());

    emit(&mut socket, json!({"event": "ping"})).await;
    assert_eq!(next_event(&mut socket).await["event"], "pong");
}

#[tokio::test]
async fn invalid_token_is_rejected_before_upgrade() {
    let server = TestServer::spawn().await;
    let err = connect_async(server.ws_url(Some("garbage")))
        .await
        .expect_err("handshake must fail");
    match err {
        tungstenite::Error::Http(response) => {
            assert_eq!(response.status().as_u16(), 401);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn closing_the_socket_removes_the_connection() {
    let server = TestServer::spawn().await;
    let (alice, _) = server.register("alice").await;
    let (mut socket, connection_id) = open(&server, Some(&alice)).await;
    join(&mut socket, 7).await;
    assert_eq!(server.state.hub.stats().connections, 1);

    socket.close(None).await.expect("close");
    drop(socket);

    let mut removed = false;
    for _ in 0..50 {
        if !server.state.hub.is_connected(connection_id) {
            removed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(removed);
    assert_eq!(server.state.hub.stats().groups, 0);
}
