//! WebSocket server: accept loop, per-connection handling, heartbeat.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use vestibule_matchmaker::Matchmaker;
use vestibule_presence::Presence;
use vestibule_protocol::{codes, ErrorResponse, RoomId, SessionId};
use vestibule_registry::Driver;
use vestibule_room::ClientRef;

use crate::{Route, TransportError};

type Ws = WebSocketStream<TcpStream>;
type WsSink = SplitSink<Ws, Message>;
type WsStream = SplitStream<Ws>;

/// How long the matchmake path waits for its single request frame.
const MATCHMAKE_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Liveness settings for room-join connections.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Interval between heartbeat pings.
    pub ping_interval: Duration,

    /// Consecutive unanswered pings tolerated before termination.
    pub ping_count_max: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_millis(1500),
            ping_count_max: 2,
        }
    }
}

/// The WebSocket transport of one server process.
pub struct WsTransport<P: Presence, D: Driver> {
    listener: TcpListener,
    config: TransportConfig,
    matchmaker: Arc<Matchmaker<P, D>>,
}

impl<P: Presence, D: Driver> WsTransport<P, D> {
    /// Binds the transport to the given address.
    pub async fn bind(
        addr: &str,
        config: TransportConfig,
        matchmaker: Arc<Matchmaker<P, D>>,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(TransportError::Bind)?;
        tracing::info!(addr, "transport listening");
        Ok(Self {
            listener,
            config,
            matchmaker,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), TransportError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let config = self.config.clone();
                    let matchmaker = Arc::clone(&self.matchmaker);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, config, matchmaker).await {
                            tracing::debug!(%addr, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Upgrades one connection, routes it by path, and serves it to the end.
async fn handle_connection<P: Presence, D: Driver>(
    stream: TcpStream,
    config: TransportConfig,
    matchmaker: Arc<Matchmaker<P, D>>,
) -> Result<(), TransportError> {
    let mut uri = None;
    let ws = tokio_tungstenite::accept_hdr_async(stream, |request: &Request, response| {
        uri = Some(request.uri().clone());
        Ok(response)
    })
    .await
    .map_err(|e| TransportError::Handshake(e.to_string()))?;

    let uri = uri.ok_or_else(|| TransportError::Handshake("missing request uri".into()))?;
    let (mut sink, mut source) = ws.split();

    let route = match Route::parse(uri.path(), uri.query()) {
        Ok(route) => route,
        Err(e) => {
            tracing::debug!(uri = %uri, error = %e, "rejecting unknown path");
            close_with_error(&mut sink, "invalid path").await;
            return Err(e);
        }
    };

    match route {
        Route::Matchmake { method, name } => {
            serve_matchmake(&mut sink, &mut source, &matchmaker, &method, &name).await
        }
        Route::RoomJoin {
            room_id,
            session_id,
            ..
        } => {
            serve_room_join(sink, source, &config, &matchmaker, room_id, session_id).await
        }
    }
}

type Request = tokio_tungstenite::tungstenite::handshake::server::Request;

/// Serves one matchmake exchange: read the body, invoke the matchmaker,
/// reply, close.
async fn serve_matchmake<P: Presence, D: Driver>(
    sink: &mut WsSink,
    source: &mut WsStream,
    matchmaker: &Matchmaker<P, D>,
    method: &str,
    name: &str,
) -> Result<(), TransportError> {
    let body = match read_request_body(source).await {
        Ok(body) => body,
        Err(e) => {
            send_json(
                sink,
                &ErrorResponse::new(codes::ERR_MATCHMAKE_UNHANDLED, "invalid request body"),
            )
            .await?;
            let _ = sink.close().await;
            return Err(e);
        }
    };

    match matchmaker.invoke(method, name, body).await {
        Ok(seat) => {
            tracing::debug!(method, name, session_id = %seat.session_id, "matchmake ok");
            send_json(sink, &seat).await?;
        }
        Err(e) => {
            tracing::debug!(method, name, error = %e, "matchmake failed");
            send_json(sink, &ErrorResponse::new(e.code(), e.to_string())).await?;
        }
    }
    let _ = sink.close().await;
    Ok(())
}

/// Reads the single JSON request frame of a matchmake exchange.
async fn read_request_body(source: &mut WsStream) -> Result<Value, TransportError> {
    let deadline = tokio::time::sleep(MATCHMAKE_REQUEST_TIMEOUT);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str())
                        .map_err(|e| TransportError::InvalidPath(format!("bad body: {e}")));
                }
                Some(Ok(Message::Binary(data))) => {
                    return serde_json::from_slice(&data)
                        .map_err(|e| TransportError::InvalidPath(format!("bad body: {e}")));
                }
                Some(Ok(Message::Close(_))) | None => return Err(TransportError::ClosedEarly),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(TransportError::Handshake(e.to_string())),
            },
            _ = &mut deadline => return Err(TransportError::ClosedEarly),
        }
    }
}

/// Serves a room-join connection for its whole lifetime.
async fn serve_room_join<P: Presence, D: Driver>(
    mut sink: WsSink,
    mut source: WsStream,
    config: &TransportConfig,
    matchmaker: &Matchmaker<P, D>,
    room_id: RoomId,
    session_id: SessionId,
) -> Result<(), TransportError> {
    let Some(handle) = matchmaker.local_room(&room_id).await else {
        tracing::debug!(%room_id, "join for unknown local room");
        close_with_error(&mut sink, "room not found").await;
        return Ok(());
    };

    let (client, mut outbound) = ClientRef::channel(session_id.clone());
    if let Err(e) = handle.client_join(client).await {
        tracing::debug!(%room_id, %session_id, error = %e, "join rejected");
        let frame = json!([codes::JOIN_ERROR, e.to_string()]);
        let _ = send_json(&mut sink, &frame).await;
        close_with_error(&mut sink, "join failed").await;
        return Ok(());
    }
    tracing::info!(%room_id, %session_id, "client connected");

    let mut ping = tokio::time::interval(config.ping_interval);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ping.tick().await; // first tick completes immediately
    let mut missed_pongs: u32 = 0;

    loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(message) => send_json(&mut sink, &message).await?,
                // The room is gone; hang up.
                None => break,
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(message) = serde_json::from_str::<Value>(text.as_str()) {
                        let _ = handle.client_message(&session_id, message).await;
                    } else {
                        tracing::debug!(%session_id, "ignoring non-JSON frame");
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    if let Ok(message) = serde_json::from_slice::<Value>(&data) {
                        let _ = handle.client_message(&session_id, message).await;
                    }
                }
                Some(Ok(Message::Pong(_))) => missed_pongs = 0,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(%session_id, error = %e, "recv error");
                    break;
                }
            },
            _ = ping.tick() => {
                if missed_pongs >= config.ping_count_max {
                    tracing::info!(%session_id, "heartbeat lost, terminating");
                    break;
                }
                missed_pongs += 1;
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = handle.client_leave(&session_id).await;
    let _ = sink.close().await;
    tracing::info!(%room_id, %session_id, "client disconnected");
    Ok(())
}

async fn send_json<T: serde::Serialize>(sink: &mut WsSink, value: &T) -> Result<(), TransportError> {
    let text = serde_json::to_string(value).map_err(|e| TransportError::Send(e.to_string()))?;
    sink.send(Message::text(text))
        .await
        .map_err(|e| TransportError::Send(e.to_string()))
}

/// Closes the socket with the protocol-level error close code.
async fn close_with_error(sink: &mut WsSink, reason: &str) {
    let frame = CloseFrame {
        code: CloseCode::from(codes::WS_CLOSE_WITH_ERROR),
        reason: reason.to_string().into(),
    };
    let _ = sink.send(Message::Close(Some(frame))).await;
    let _ = sink.close().await;
}
