//! WebSocket gateway endpoint.
//!
//! Protocol:
//! - Client connects to `GET /ws?token=<credential>` (or sends
//!   `Authorization: Bearer <credential>` with the upgrade request)
//! - Server authenticates, then sends `connection_success`
//! - Client sends `{"event": ..., "data": ...}` frames; each is handled in
//!   arrival order
//! - Server pushes events through the connection's outbound queue, drained by
//!   a dedicated writer task

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use parley_types::error::GatewayError;
use parley_types::event::ClientEvent;
use parley_types::ids::ConnectionId;

use crate::http::extractors::auth::bearer_token;
use crate::state::AppState;
use crate::transport::Outbound;

/// Interval between keep-alive pings.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// GET /ws - Upgrade to a gateway connection.
///
/// Credential problems are reported after the upgrade: the socket is
/// accepted, then closed by the gateway if authentication fails.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
) -> Response {
    let credential = params
        .token
        .or_else(|| bearer_token(&headers).ok().flatten());
    ws.on_upgrade(move |socket| handle_socket(socket, state, credential))
}

async fn handle_socket(socket: WebSocket, state: AppState, credential: Option<String>) {
    let connection_id = ConnectionId::new();
    let (sink, mut stream) = socket.split();

    let outbound = state.transport.register(connection_id);
    state.gateway.open(connection_id);
    let mut writer = tokio::spawn(write_loop(sink, outbound));

    let connected = {
        let connect = state.gateway.connect(connection_id, credential.as_deref());
        tokio::pin!(connect);
        loop {
            tokio::select! {
                result = &mut connect => break result,
                frame = stream.next() => match frame {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        // Peer left mid-handshake: tearing down first makes
                        // the pending connect register nothing.
                        state.gateway.disconnect(&connection_id);
                        break connect.await;
                    }
                    Some(Ok(Message::Text(_))) => state.gateway.report_error(
                        &connection_id,
                        &GatewayError::unauthorized("connection is not authenticated"),
                    ),
                    Some(Ok(_)) => {}
                },
            }
        }
    };

    let writer_done = match connected {
        Ok(session) => {
            tracing::debug!(%connection_id, user_id = %session.user_id, "gateway connection ready");
            read_loop(&state, connection_id, &mut stream, &mut writer).await
        }
        Err(e) => {
            tracing::debug!(%connection_id, error = %e, "gateway connection refused");
            false
        }
    };

    state.gateway.disconnect(&connection_id);
    if !writer_done && tokio::time::timeout(Duration::from_secs(5), &mut writer).await.is_err() {
        writer.abort();
    }
    tracing::debug!(%connection_id, "gateway connection closed");
}

/// Process inbound frames until the peer leaves or the writer stops.
/// Returns whether the writer task has already finished.
async fn read_loop(
    state: &AppState,
    connection_id: ConnectionId,
    stream: &mut SplitStream<WebSocket>,
    writer: &mut JoinHandle<()>,
) -> bool {
    loop {
        tokio::select! {
            // The writer stops when the gateway closes this connection,
            // e.g. when a newer session for the same user evicts it.
            _ = &mut *writer => return true,

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientEvent>(text.as_str()) {
                        Ok(event) => {
                            // Failures are already reported to the client.
                            let _ = state.gateway.handle(&connection_id, event).await;
                        }
                        Err(err) => {
                            tracing::warn!(%connection_id, error = %err, "ignoring malformed frame");
                            state.gateway.report_error(
                                &connection_id,
                                &GatewayError::validation(format!("invalid event: {err}")),
                            );
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => return false,
                Some(Err(err)) => {
                    tracing::debug!(%connection_id, "WebSocket receive error: {err}");
                    return false;
                }
                // Ignore binary, ping, pong protocol frames
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Drain the outbound queue into the socket, with periodic pings.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
) {
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            item = outbound.recv() => match item {
                Some(Outbound::Frame(text)) => {
                    if sink.send(Message::Text(text.to_string().into())).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = heartbeat.tick() => {
                if sink.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;

    use parley_infra::sqlite::pool::{DatabasePool, database_url};
    use parley_types::config::GatewayConfig;
    use parley_types::identity::UserRecord;
    use parley_types::message::{HistoryRequest, MessageKind};
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tokio::time::timeout;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    use crate::http::router::build_router;

    const TIMEOUT: Duration = Duration::from_secs(5);

    type WsStream = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    struct Server {
        state: AppState,
        addr: SocketAddr,
        _dir: TempDir,
    }

    async fn boot_server() -> Server {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::new(&database_url(dir.path())).await.unwrap();
        let config = GatewayConfig {
            jwt_secret: "ws-test-secret".into(),
            ..Default::default()
        };
        let state = AppState::with_pool(config, dir.path().to_path_buf(), pool);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Server {
            state,
            addr,
            _dir: dir,
        }
    }

    impl Server {
        async fn user(&self, name: &str) -> (UserRecord, String) {
            let user = self.state.users().create_user(name).await.unwrap();
            let token = self.state.identity.issue(&user).unwrap();
            (user, token)
        }

        async fn connect(&self, token: &str) -> WsStream {
            let url = format!("ws://{}/ws?token={token}", self.addr);
            let (ws, _) = connect_async(url).await.unwrap();
            ws
        }
    }

    /// Read frames until an event with `name` arrives.
    async fn next_event(ws: &mut WsStream, name: &str) -> Value {
        loop {
            let msg = timeout(TIMEOUT, ws.next())
                .await
                .expect("timeout waiting for event")
                .expect("stream closed")
                .expect("ws error");
            if let WsMessage::Text(text) = msg {
                let parsed: Value = serde_json::from_str(&text).unwrap();
                if parsed["event"] == name {
                    return parsed["data"].clone();
                }
            }
        }
    }

    async fn send(ws: &mut WsStream, frame: Value) {
        ws.send(WsMessage::text(frame.to_string())).await.unwrap();
    }

    #[tokio::test]
    async fn valid_token_gets_connection_success() {
        let server = boot_server().await;
        let (alice, token) = server.user("alice").await;

        let mut ws = server.connect(&token).await;
        let data = next_event(&mut ws, "connection_success").await;

        assert_eq!(data["userId"], alice.id.as_str());
        assert_eq!(data["username"], "alice");
        assert!(server.state.gateway.registry().lookup_connection(&alice.id).is_some());
    }

    #[tokio::test]
    async fn bad_token_is_closed_without_session() {
        let server = boot_server().await;
        let (alice, _) = server.user("alice").await;

        let mut ws = server.connect("not-a-token").await;
        let closed = loop {
            match timeout(TIMEOUT, ws.next()).await.expect("timeout") {
                Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => break true,
                Some(Ok(WsMessage::Text(text))) => {
                    assert!(!text.contains("connection_success"));
                }
                Some(Ok(_)) => {}
            }
        };

        assert!(closed);
        assert!(server.state.gateway.registry().lookup_connection(&alice.id).is_none());
        assert!(server.state.gateway.online_users().is_empty());
    }

    #[tokio::test]
    async fn private_message_round_trip() {
        let server = boot_server().await;
        let (alice, alice_token) = server.user("alice").await;
        let (bob, bob_token) = server.user("bob").await;

        let mut a = server.connect(&alice_token).await;
        next_event(&mut a, "connection_success").await;
        let mut b = server.connect(&bob_token).await;
        next_event(&mut b, "connection_success").await;

        send(
            &mut a,
            json!({"event": "send_message", "data": {"content": "hi bob", "receiverId": bob.id.as_str()}}),
        )
        .await;

        let received = next_event(&mut b, "receive_message").await;
        assert_eq!(received["content"], "hi bob");
        assert_eq!(received["sender"], alice.id.as_str());
        assert_eq!(received["senderName"], "alice");
        assert_eq!(received["isPrivate"], true);

        let ack = next_event(&mut a, "message_sent").await;
        assert_eq!(ack["receiverId"], bob.id.as_str());
        assert_eq!(ack["delivered"], true);
        assert_eq!(ack["id"], received["id"]);

        let history = server
            .state
            .history
            .history(
                &bob.id,
                HistoryRequest {
                    kind: MessageKind::Private,
                    target: Some(alice.id.to_string()),
                    limit: None,
                    skip: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "hi bob");
    }

    #[tokio::test]
    async fn malformed_frame_gets_error_event() {
        let server = boot_server().await;
        let (_, token) = server.user("alice").await;
        let mut ws = server.connect(&token).await;
        next_event(&mut ws, "connection_success").await;

        ws.send(WsMessage::text("{not json".to_string())).await.unwrap();
        let error = next_event(&mut ws, "error").await;
        assert!(error["message"].as_str().unwrap().starts_with("validation failed"));

        send(&mut ws, json!({"event": "get_online_users"})).await;
        let online = next_event(&mut ws, "online_users").await;
        assert_eq!(online["users"][0]["username"], "alice");
    }

    #[tokio::test]
    async fn peers_see_presence_changes() {
        let server = boot_server().await;
        let (_, alice_token) = server.user("alice").await;
        let (bob, bob_token) = server.user("bob").await;

        let mut a = server.connect(&alice_token).await;
        next_event(&mut a, "connection_success").await;

        let mut b = server.connect(&bob_token).await;
        next_event(&mut b, "connection_success").await;
        let online = next_event(&mut a, "user_status").await;
        // Alice may first see her own online status.
        let online = if online["userId"] == bob.id.as_str() {
            online
        } else {
            next_event(&mut a, "user_status").await
        };
        assert_eq!(online["status"], "online");

        b.close(None).await.unwrap();
        let offline = next_event(&mut a, "user_status").await;
        assert_eq!(offline["userId"], bob.id.as_str());
        assert_eq!(offline["status"], "offline");
        assert!(server.state.gateway.registry().lookup_connection(&bob.id).is_none());
    }

    #[tokio::test]
    async fn second_connection_evicts_first() {
        let server = boot_server().await;
        let (alice, token) = server.user("alice").await;

        let mut first = server.connect(&token).await;
        next_event(&mut first, "connection_success").await;
        let mut second = server.connect(&token).await;
        next_event(&mut second, "connection_success").await;

        let evicted = loop {
            match timeout(TIMEOUT, first.next()).await.expect("timeout") {
                Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => break true,
                Some(Ok(_)) => {}
            }
        };
        assert!(evicted);
        assert_eq!(server.state.gateway.online_users().len(), 1);
        assert!(server.state.gateway.registry().lookup_connection(&alice.id).is_some());
    }
}
