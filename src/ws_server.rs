// WebSocket server for operator consoles.
//
// Each connection gets its own ConnState (login + auction session view)
// and talks to the shared Gateway. One JSON request per text frame, one
// response frame back.

use std::sync::Arc;

use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{info, warn};

use crate::app::{ConnState, Gateway};
use crate::protocol::Response;

/// Serialize a response for the wire. Serialization of our own types
/// cannot realistically fail; if it somehow does, send a plain internal
/// error instead of dropping the frame.
fn encode_response(response: &Response) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        warn!("failed to serialize response: {e}");
        r#"{"type":"error","kind":"internal","message":"failed to serialize response"}"#.to_string()
    })
}

/// Run the WebSocket server on the given port.
///
/// Binds a TCP listener on `127.0.0.1:{port}` and serves each connection
/// in its own task so multiple operator consoles can be connected at
/// once. The server runs forever (until the task is cancelled or the
/// process exits).
pub async fn run(port: u16, gateway: Arc<Gateway>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    let local_addr = listener.local_addr()?;
    info!("WebSocket server listening on {local_addr}");

    loop {
        let (stream, addr) = listener.accept().await?;
        let addr_str = addr.to_string();
        info!("Accepted TCP connection from {addr_str}");

        let gateway = gateway.clone();
        tokio::spawn(async move {
            let ws_stream = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake failed for {addr_str}: {e}");
                    return;
                }
            };
            handle_connection(ws_stream, gateway, &addr_str).await;
            info!("Connection from {addr_str} closed");
        });
    }
}

/// Serve one established WebSocket connection to completion.
///
/// Generic over the underlying stream type so it can be exercised with
/// in-memory streams without opening TCP ports.
pub async fn handle_connection<S>(
    ws_stream: WebSocketStream<S>,
    gateway: Arc<Gateway>,
    addr: &str,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut write, read) = ws_stream.split();

    // Responses flow through a channel so the read loop never blocks on
    // a slow client.
    let (tx, mut rx) = mpsc::channel::<String>(64);
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if write.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut conn = ConnState::default();
    let _ = process_message_stream(read, &gateway, &mut conn, &tx, addr).await;

    drop(tx);
    let _ = writer.await;
}

/// Process raw WebSocket [`Message`] items from any [`Stream`], answering
/// each text frame through `out`. Returns `Err(())` if the outbound
/// channel is closed (receiver dropped), signalling the caller to stop.
///
/// This is a pure-logic function requiring no I/O and is the primary
/// unit-test target.
pub async fn process_message_stream<St>(
    mut stream: St,
    gateway: &Gateway,
    conn: &mut ConnState,
    out: &mpsc::Sender<String>,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let response = gateway.handle_request(conn, text.as_str());
                if out.send(encode_response(&response)).await.is_err() {
                    return Err(());
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            _ => {
                // Ignore Binary, Ping, Pong, Frame variants.
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::player::NewPlayer;
    use crate::config::{AuctionSettings, BootstrapAdmin, Config, DataPaths, TeamSeed};
    use crate::db::Database;
    use futures_util::stream;
    use tokio_tungstenite::tungstenite::Error as WsError;

    fn test_gateway() -> Arc<Gateway> {
        let config = Config {
            auction: AuctionSettings {
                name: "WS Test League".into(),
                auction_date: None,
                initial_purse: 10000,
                slot_cap: 15,
            },
            teams: vec![TeamSeed {
                name: "Thunder Strikers".into(),
                captain: "Gurunathan S".into(),
            }],
            ws_port: 0,
            db_path: ":memory:".into(),
            data: DataPaths {
                players: "data/players.csv".into(),
            },
            bootstrap: BootstrapAdmin::default(),
        };
        let db = Arc::new(Database::open(":memory:").unwrap());
        let gateway = Gateway::new(config, db);
        gateway.bootstrap().unwrap();
        Arc::new(gateway)
    }

    /// Helper: create a stream of Message results from a vec.
    fn mock_stream(
        messages: Vec<Result<Message, WsError>>,
    ) -> impl Stream<Item = Result<Message, WsError>> + Unpin {
        stream::iter(messages)
    }

    async fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Response> {
        let mut responses = Vec::new();
        while let Ok(text) = rx.try_recv() {
            responses.push(serde_json::from_str(&text).unwrap());
        }
        responses
    }

    #[tokio::test]
    async fn text_frame_gets_a_response() {
        let gateway = test_gateway();
        let (tx, mut rx) = mpsc::channel(64);
        let mut conn = ConnState::default();
        let messages = vec![Ok(Message::Text(r#"{"type":"overview"}"#.into()))];

        process_message_stream(mock_stream(messages), &gateway, &mut conn, &tx, "test")
            .await
            .unwrap();

        let responses = drain(&mut rx).await;
        assert_eq!(responses.len(), 1);
        match &responses[0] {
            Response::Overview { league, team_count, .. } => {
                assert_eq!(league, "WS Test League");
                assert_eq!(*team_count, 1);
            }
            other => panic!("expected overview, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn responses_come_back_in_request_order() {
        let gateway = test_gateway();
        let (tx, mut rx) = mpsc::channel(64);
        let mut conn = ConnState::default();
        let messages = vec![
            Ok(Message::Text(r#"{"type":"overview"}"#.into())),
            Ok(Message::Text(r#"{"type":"state"}"#.into())),
            Ok(Message::Text("garbage".into())),
        ];

        process_message_stream(mock_stream(messages), &gateway, &mut conn, &tx, "test")
            .await
            .unwrap();

        let responses = drain(&mut rx).await;
        assert_eq!(responses.len(), 3);
        assert!(matches!(responses[0], Response::Overview { .. }));
        assert!(matches!(responses[1], Response::State { .. }));
        match &responses[2] {
            Response::Error { kind, .. } => assert_eq!(kind, "validation"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_state_carries_across_frames() {
        let gateway = test_gateway();
        gateway
            .db
            .insert_player(&NewPlayer::pool_entrant("Solo", "Batsman"))
            .unwrap();

        let (tx, mut rx) = mpsc::channel(64);
        let mut conn = ConnState::default();
        let messages = vec![
            Ok(Message::Text(
                r#"{"type":"login","username":"superadmin","password":"admin123"}"#.into(),
            )),
            Ok(Message::Text(r#"{"type":"next_player"}"#.into())),
        ];
        process_message_stream(mock_stream(messages), &gateway, &mut conn, &tx, "test")
            .await
            .unwrap();

        let responses = drain(&mut rx).await;
        assert!(matches!(responses[0], Response::LoggedIn { .. }));
        match &responses[1] {
            Response::State { snapshot, .. } => {
                let player = snapshot.current_player.as_ref().unwrap();
                assert_eq!(player.name, "Solo");
            }
            other => panic!("expected state, got {other:?}"),
        }
        assert!(conn.actor.is_some());
        assert!(conn.session.started);
    }

    #[tokio::test]
    async fn close_frame_stops_processing() {
        let gateway = test_gateway();
        let (tx, mut rx) = mpsc::channel(64);
        let mut conn = ConnState::default();
        let messages = vec![
            Ok(Message::Text(r#"{"type":"overview"}"#.into())),
            Ok(Message::Close(None)),
            Ok(Message::Text(r#"{"type":"overview"}"#.into())),
        ];

        process_message_stream(mock_stream(messages), &gateway, &mut conn, &tx, "test")
            .await
            .unwrap();

        let responses = drain(&mut rx).await;
        assert_eq!(responses.len(), 1);
    }

    #[tokio::test]
    async fn error_stops_processing() {
        let gateway = test_gateway();
        let (tx, mut rx) = mpsc::channel(64);
        let mut conn = ConnState::default();
        let messages = vec![
            Ok(Message::Text(r#"{"type":"overview"}"#.into())),
            Err(WsError::ConnectionClosed),
            Ok(Message::Text(r#"{"type":"overview"}"#.into())),
        ];

        process_message_stream(mock_stream(messages), &gateway, &mut conn, &tx, "test")
            .await
            .unwrap();

        let responses = drain(&mut rx).await;
        assert_eq!(responses.len(), 1);
    }

    #[tokio::test]
    async fn binary_and_ping_messages_are_ignored() {
        let gateway = test_gateway();
        let (tx, mut rx) = mpsc::channel(64);
        let mut conn = ConnState::default();
        let messages = vec![
            Ok(Message::Binary(vec![1, 2, 3].into())),
            Ok(Message::Ping(vec![].into())),
            Ok(Message::Pong(vec![].into())),
            Ok(Message::Text(r#"{"type":"overview"}"#.into())),
        ];

        process_message_stream(mock_stream(messages), &gateway, &mut conn, &tx, "test")
            .await
            .unwrap();

        let responses = drain(&mut rx).await;
        assert_eq!(responses.len(), 1);
    }

    #[tokio::test]
    async fn returns_err_when_channel_closed() {
        let gateway = test_gateway();
        let (tx, rx) = mpsc::channel(64);
        drop(rx); // Close the receiver.
        let mut conn = ConnState::default();
        let messages = vec![Ok(Message::Text(r#"{"type":"overview"}"#.into()))];

        let result =
            process_message_stream(mock_stream(messages), &gateway, &mut conn, &tx, "test").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_stream_completes_normally() {
        let gateway = test_gateway();
        let (tx, mut rx) = mpsc::channel(64);
        let mut conn = ConnState::default();
        let messages: Vec<Result<Message, WsError>> = vec![];

        process_message_stream(mock_stream(messages), &gateway, &mut conn, &tx, "test")
            .await
            .unwrap();

        assert!(rx.try_recv().is_err());
    }
}
