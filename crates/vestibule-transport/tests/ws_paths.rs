//! End-to-end tests for the two transport paths.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;
use vestibule_matchmaker::{Matchmaker, RoomType};
use vestibule_presence::LocalPresence;
use vestibule_registry::MemoryDriver;
use vestibule_room::{ClientRef, RoomError, RoomLogic, RoomOptions};
use vestibule_protocol::SessionId;
use vestibule_transport::{TransportConfig, WsTransport};

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

// =========================================================================
// Mock room: greets joiners and echoes their messages back.
// =========================================================================

#[derive(Default)]
struct GreeterRoom {
    clients: Vec<ClientRef>,
}

impl RoomLogic for GreeterRoom {
    fn on_join(&mut self, client: &ClientRef, _options: &Value) -> Result<(), RoomError> {
        client.send(json!({"welcome": client.session_id()}));
        self.clients.push(client.clone());
        Ok(())
    }

    fn on_message(&mut self, session_id: &SessionId, message: Value) {
        for client in &self.clients {
            if client.session_id() == session_id {
                client.send(json!({"echo": message}));
            }
        }
    }

    fn on_leave(&mut self, session_id: &SessionId) {
        self.clients.retain(|client| client.session_id() != session_id);
    }
}

// =========================================================================
// Helpers
// =========================================================================

async fn start_server() -> String {
    let presence = Arc::new(LocalPresence::new());
    let driver = Arc::new(MemoryDriver::new());
    let matchmaker = Arc::new(Matchmaker::new(presence, driver));
    matchmaker
        .define(
            "chat",
            RoomType::new(GreeterRoom::default).with_options(RoomOptions {
                max_clients: 4,
                ..RoomOptions::default()
            }),
        )
        .await
        .expect("define should succeed");

    let transport = WsTransport::bind("127.0.0.1:0", TransportConfig::default(), matchmaker)
        .await
        .expect("transport should bind");
    let addr = transport.local_addr().expect("local addr").to_string();

    tokio::spawn(async move {
        let _ = transport.run().await;
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str, path: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{path}"))
        .await
        .expect("should connect");
    ws
}

async fn recv_json(ws: &mut ClientWs) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout")
            .expect("stream open")
            .expect("frame ok");
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).expect("json"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

/// Runs a matchmake exchange and returns the parsed response body.
async fn matchmake(addr: &str, method: &str, name: &str, body: Value) -> Value {
    let mut ws = connect(addr, &format!("/matchmake/{method}/{name}")).await;
    ws.send(Message::text(body.to_string())).await.expect("send");
    recv_json(&mut ws).await
}

// =========================================================================
// Matchmake path
// =========================================================================

#[tokio::test]
async fn test_matchmake_join_or_create_returns_seat() {
    let addr = start_server().await;

    let response = matchmake(&addr, "joinOrCreate", "chat", json!({})).await;

    let room_id = response["room"]["roomId"].as_str().expect("roomId");
    assert!(!room_id.is_empty());
    assert_eq!(response["room"]["name"], "chat");
    assert_eq!(response["room"]["maxClients"], 4);
    let session_id = response["sessionId"].as_str().expect("sessionId");
    assert_eq!(session_id.len(), 16);
}

#[tokio::test]
async fn test_matchmake_unknown_method_is_unhandled() {
    let addr = start_server().await;

    let response = matchmake(&addr, "fabricateRoom", "chat", json!({})).await;

    assert_eq!(response["code"], 4213);
    assert!(response["error"].as_str().unwrap().contains("fabricateRoom"));
}

#[tokio::test]
async fn test_matchmake_join_without_rooms_fails() {
    let addr = start_server().await;

    let response = matchmake(&addr, "join", "chat", json!({})).await;

    assert_eq!(response["code"], 4211);
}

#[tokio::test]
async fn test_matchmake_no_handler() {
    let addr = start_server().await;

    let response = matchmake(&addr, "joinOrCreate", "poker", json!({})).await;

    assert_eq!(response["code"], 4210);
}

#[tokio::test]
async fn test_matchmake_socket_closes_after_one_request() {
    let addr = start_server().await;

    let mut ws = connect(&addr, "/matchmake/joinOrCreate/chat").await;
    ws.send(Message::text("{}")).await.expect("send");
    let _ = recv_json(&mut ws).await;

    // The server hangs up after the single exchange.
    let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timeout");
    match next {
        Some(Ok(Message::Close(_))) | None => {}
        other => panic!("expected close, got {other:?}"),
    }
}

// =========================================================================
// Room-join path
// =========================================================================

#[tokio::test]
async fn test_room_join_claims_seat_and_receives_welcome() {
    let addr = start_server().await;
    let seat = matchmake(&addr, "joinOrCreate", "chat", json!({})).await;
    let room_id = seat["room"]["roomId"].as_str().unwrap();
    let session_id = seat["sessionId"].as_str().unwrap();

    let mut ws = connect(&addr, &format!("/chat/{room_id}?sessionId={session_id}")).await;

    let welcome = recv_json(&mut ws).await;
    assert_eq!(welcome["welcome"], session_id);
}

#[tokio::test]
async fn test_room_join_echoes_client_messages() {
    let addr = start_server().await;
    let seat = matchmake(&addr, "joinOrCreate", "chat", json!({})).await;
    let room_id = seat["room"]["roomId"].as_str().unwrap();
    let session_id = seat["sessionId"].as_str().unwrap();

    let mut ws = connect(&addr, &format!("/chat/{room_id}?sessionId={session_id}")).await;
    let _ = recv_json(&mut ws).await; // welcome

    ws.send(Message::text(json!({"say": "hello"}).to_string()))
        .await
        .expect("send");

    let echo = recv_json(&mut ws).await;
    assert_eq!(echo["echo"]["say"], "hello");
}

#[tokio::test]
async fn test_room_join_unknown_room_closes_with_error() {
    let addr = start_server().await;

    let mut ws = connect(&addr, "/chat/no-such-room?sessionId=s1").await;

    let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timeout");
    match next {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(u16::from(frame.code), 4002);
        }
        other => panic!("expected error close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_room_join_without_reservation_sends_join_error() {
    let addr = start_server().await;
    let seat = matchmake(&addr, "joinOrCreate", "chat", json!({})).await;
    let room_id = seat["room"]["roomId"].as_str().unwrap();

    // Real room, made-up session: the seat was never reserved.
    let mut ws = connect(&addr, &format!("/chat/{room_id}?sessionId=imposter")).await;

    let error = recv_json(&mut ws).await;
    assert_eq!(error[0], 11, "JOIN_ERROR frame");
    assert!(error[1].as_str().unwrap().contains("imposter"));

    let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timeout");
    match next {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(u16::from(frame.code), 4002);
        }
        other => panic!("expected error close, got {other:?}"),
    }
}

#[tokio::test]
async fn test_two_clients_share_a_room() {
    let addr = start_server().await;

    let a = matchmake(&addr, "joinOrCreate", "chat", json!({})).await;
    tokio::time::sleep(Duration::from_millis(25)).await;
    let b = matchmake(&addr, "joinOrCreate", "chat", json!({})).await;

    assert_eq!(a["room"]["roomId"], b["room"]["roomId"]);
    assert_ne!(a["sessionId"], b["sessionId"]);

    let room_id = a["room"]["roomId"].as_str().unwrap();
    let mut ws_a = connect(
        &addr,
        &format!("/chat/{room_id}?sessionId={}", a["sessionId"].as_str().unwrap()),
    )
    .await;
    let mut ws_b = connect(
        &addr,
        &format!("/chat/{room_id}?sessionId={}", b["sessionId"].as_str().unwrap()),
    )
    .await;

    assert!(recv_json(&mut ws_a).await.get("welcome").is_some());
    assert!(recv_json(&mut ws_b).await.get("welcome").is_some());
}
