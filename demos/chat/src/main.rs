//! Chat demo: a room type that relays messages between its clients.

use serde_json::{json, Value};
use vestibule::prelude::*;

// ---------------------------------------------------------------------------
// Room logic
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ChatRoom {
    clients: Vec<ClientRef>,
    message_count: u64,
}

impl ChatRoom {
    fn broadcast(&self, message: Value) {
        for client in &self.clients {
            client.send(message.clone());
        }
    }
}

impl RoomLogic for ChatRoom {
    fn on_join(&mut self, client: &ClientRef, options: &Value) -> Result<(), RoomError> {
        let nickname = options
            .get("nickname")
            .and_then(Value::as_str)
            .unwrap_or("anonymous")
            .to_string();
        self.broadcast(json!({"event": "joined", "who": nickname}));
        self.clients.push(client.clone());
        client.send(json!({"event": "welcome", "sessionId": client.session_id()}));
        Ok(())
    }

    fn on_message(&mut self, session_id: &SessionId, message: Value) {
        let Some(text) = message.get("say").and_then(Value::as_str) else {
            return;
        };
        self.message_count += 1;
        self.broadcast(json!({
            "event": "chat",
            "from": session_id,
            "text": text,
        }));
    }

    fn on_leave(&mut self, session_id: &SessionId) {
        self.clients.retain(|client| client.session_id() != session_id);
        self.broadcast(json!({"event": "left", "who": session_id}));
    }

    // `messageCount` is readable and `clear` callable from any process
    // through the remote room call.
    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "messageCount" => Some(json!(self.message_count)),
            _ => None,
        }
    }

    fn call(&mut self, method: &str, _args: &[Value]) -> Result<Value, RoomError> {
        match method {
            "clear" => {
                self.message_count = 0;
                Ok(json!(true))
            }
            other => Err(RoomError::UnknownMethod(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let server = VestibuleServerBuilder::new().bind("0.0.0.0:2567").build().await?;
    server
        .define(
            "chat",
            RoomType::new(ChatRoom::default).with_options(RoomOptions {
                max_clients: 16,
                ..RoomOptions::default()
            }),
        )
        .await?;

    tracing::info!("chat demo listening on 0.0.0.0:2567");
    server.run().await?;
    Ok(())
}
