//! Integration tests for the connection handler and HTTP routes

use axum::body::Body;
use axum::extract::ws::Message;
use axum::http::{Request, StatusCode};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use noughts::config::Config;
use noughts::game::{Board, Score, Symbol};
use noughts::protocol::{deserialize, GameEvent, ServerMessage};
use noughts::server::{handle_connection, GameServer, SessionRegistry};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tower::ServiceExt;

/// In-memory stand-in for one WebSocket client
struct TestClient {
    inbound: Option<UnboundedSender<Result<Message, axum::Error>>>,
    outbound: UnboundedReceiver<Message>,
    handle: JoinHandle<()>,
}

impl TestClient {
    fn connect(registry: &Arc<SessionRegistry>, game_id: &str) -> Self {
        Self::connect_with_timeout(registry, game_id, None)
    }

    fn connect_with_timeout(
        registry: &Arc<SessionRegistry>,
        game_id: &str,
        idle_timeout: Option<Duration>,
    ) -> Self {
        let (in_tx, in_rx) = unbounded();
        let (out_tx, out_rx) = unbounded::<Message>();
        let handle = tokio::spawn(handle_connection(
            out_tx,
            in_rx,
            game_id.to_string(),
            Arc::clone(registry),
            idle_timeout,
        ));
        Self {
            inbound: Some(in_tx),
            outbound: out_rx,
            handle,
        }
    }

    fn send(&self, value: serde_json::Value) {
        self.send_text(&value.to_string());
    }

    fn send_text(&self, text: &str) {
        self.inbound
            .as_ref()
            .expect("client already disconnected")
            .unbounded_send(Ok(Message::Text(text.to_string())))
            .unwrap();
    }

    async fn recv(&mut self) -> ServerMessage {
        let msg = timeout(Duration::from_secs(2), self.outbound.next())
            .await
            .expect("Should receive message")
            .expect("Connection should still be open");
        match msg {
            Message::Text(text) => deserialize(&text).expect("Should deserialize"),
            other => panic!("Expected text frame, got {:?}", other),
        }
    }

    async fn recv_event(&mut self) -> GameEvent {
        match self.recv().await {
            ServerMessage::Event(event) => event,
            other => panic!("Expected event, got {:?}", other),
        }
    }

    async fn assert_silent(&mut self) {
        let next = timeout(Duration::from_millis(100), self.outbound.next()).await;
        assert!(next.is_err(), "Expected no message, got {:?}", next);
    }

    async fn assert_closed(&mut self) {
        let next = timeout(Duration::from_secs(2), self.outbound.next())
            .await
            .expect("Connection should close");
        assert!(next.is_none(), "Expected close, got {:?}", next);
    }

    async fn disconnect(mut self) {
        self.inbound.take();
        timeout(Duration::from_secs(2), self.handle)
            .await
            .expect("Handler should finish")
            .unwrap();
    }
}

/// Two clients in `game_id`, past assignment and start_game
async fn start_game(registry: &Arc<SessionRegistry>, game_id: &str) -> (TestClient, TestClient) {
    let mut a = TestClient::connect(registry, game_id);
    a.recv().await;
    let mut b = TestClient::connect(registry, game_id);
    b.recv().await;
    a.recv().await;
    b.recv().await;
    (a, b)
}

fn make_move(row: i64, col: i64) -> serde_json::Value {
    json!({"event": "make_move", "row": row, "col": col})
}

#[tokio::test]
async fn test_two_clients_start_and_move() {
    let registry = Arc::new(SessionRegistry::new());

    let mut a = TestClient::connect(&registry, "abc");
    assert_eq!(
        a.recv_event().await,
        GameEvent::PlayerAssignment { player: Symbol::X }
    );

    let mut b = TestClient::connect(&registry, "abc");
    assert_eq!(
        b.recv_event().await,
        GameEvent::PlayerAssignment { player: Symbol::O }
    );

    let start = GameEvent::StartGame {
        current_player: Symbol::X,
        score: Score::default(),
    };
    assert_eq!(a.recv_event().await, start);
    assert_eq!(b.recv_event().await, start);

    a.send(make_move(1, 1));
    let expected: Board =
        serde_json::from_value(json!([["", "", ""], ["", "X", ""], ["", "", ""]])).unwrap();
    for client in [&mut a, &mut b] {
        assert_eq!(
            client.recv_event().await,
            GameEvent::Move {
                board: expected,
                current_player: Symbol::O,
            }
        );
    }

    a.disconnect().await;
    b.disconnect().await;
}

#[tokio::test]
async fn test_third_client_is_rejected() {
    let registry = Arc::new(SessionRegistry::new());
    let (a, b) = start_game(&registry, "abc").await;

    let mut c = TestClient::connect(&registry, "abc");
    match c.recv().await {
        ServerMessage::Error { error } => assert_eq!(error, "Game is full"),
        other => panic!("Expected error, got {:?}", other),
    }
    c.assert_closed().await;

    let session = registry.get_or_create("abc").await;
    assert_eq!(session.lock().await.player_count(), 2);

    a.disconnect().await;
    b.disconnect().await;
}

#[tokio::test]
async fn test_invalid_input_is_ignored() {
    let registry = Arc::new(SessionRegistry::new());
    let (mut a, mut b) = start_game(&registry, "quiet").await;

    a.send_text("not json");
    a.send(json!({"event": "dance"}));
    b.send(make_move(0, 0));
    a.send(make_move(3, 3));
    a.assert_silent().await;
    b.assert_silent().await;

    // Still connected and still X's turn
    a.send(make_move(0, 0));
    assert!(matches!(a.recv_event().await, GameEvent::Move { .. }));
    assert!(matches!(b.recv_event().await, GameEvent::Move { .. }));

    a.disconnect().await;
    b.disconnect().await;
}

#[tokio::test]
async fn test_win_then_rematch() {
    let registry = Arc::new(SessionRegistry::new());
    let (mut a, mut b) = start_game(&registry, "round").await;

    for (x_move, o_move) in [((0, 0), (1, 0)), ((0, 1), (1, 1))] {
        a.send(make_move(x_move.0, x_move.1));
        a.recv().await;
        b.recv().await;
        b.send(make_move(o_move.0, o_move.1));
        a.recv().await;
        b.recv().await;
    }
    a.send(make_move(0, 2));

    for client in [&mut a, &mut b] {
        match client.recv_event().await {
            GameEvent::Win { player, score, .. } => {
                assert_eq!(player, Symbol::X);
                assert_eq!(score, Score { x: 1, o: 0 });
            }
            other => panic!("Expected win, got {:?}", other),
        }
    }

    a.send(json!({"event": "rematch_request"}));
    a.send(json!({"event": "rematch_request"}));
    a.assert_silent().await;

    b.send(json!({"event": "rematch_request"}));
    let new_game = GameEvent::NewGame {
        board: Board::new(),
        current_player: Symbol::O,
        score: Score { x: 1, o: 0 },
    };
    assert_eq!(a.recv_event().await, new_game);
    assert_eq!(b.recv_event().await, new_game);

    a.disconnect().await;
    b.disconnect().await;
}

#[tokio::test]
async fn test_departures_notify_and_reap_session() {
    let registry = Arc::new(SessionRegistry::new());
    let (a, mut b) = start_game(&registry, "abc").await;

    a.disconnect().await;
    assert_eq!(b.recv_event().await, GameEvent::OpponentLeft);
    assert!(registry.contains("abc").await);

    b.disconnect().await;
    assert!(!registry.contains("abc").await);

    let mut fresh = TestClient::connect(&registry, "abc");
    assert_eq!(
        fresh.recv_event().await,
        GameEvent::PlayerAssignment { player: Symbol::X }
    );
    let info = registry.get_or_create("abc").await.info().await;
    assert_eq!(info.board, Board::new());
    assert_eq!(info.score, Score::default());

    fresh.disconnect().await;
}

#[tokio::test]
async fn test_replacement_player_restarts_game() {
    let registry = Arc::new(SessionRegistry::new());
    let (a, mut b) = start_game(&registry, "swap").await;

    a.disconnect().await;
    b.recv().await;

    let mut c = TestClient::connect(&registry, "swap");
    assert_eq!(
        c.recv_event().await,
        GameEvent::PlayerAssignment { player: Symbol::X }
    );
    assert!(matches!(b.recv_event().await, GameEvent::StartGame { .. }));
    assert!(matches!(c.recv_event().await, GameEvent::StartGame { .. }));

    b.disconnect().await;
    c.disconnect().await;
}

#[tokio::test]
async fn test_idle_connection_is_dropped() {
    let registry = Arc::new(SessionRegistry::new());
    let mut a = TestClient::connect_with_timeout(&registry, "idle", Some(Duration::from_millis(50)));
    a.recv().await;

    a.assert_closed().await;
    timeout(Duration::from_secs(2), &mut a.handle)
        .await
        .expect("Handler should finish")
        .unwrap();
    assert!(!registry.contains("idle").await);
}

#[tokio::test]
async fn test_keep_alive_route() {
    let server = GameServer::new(Config::default());

    let response = server
        .router()
        .oneshot(
            Request::builder()
                .uri("/keep_job_alive")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value, json!({"status": "Job is alive"}));
}

#[tokio::test]
async fn test_index_and_static_routes() {
    let dir = tempdir().unwrap();
    let templates = dir.path().join("templates");
    let assets = dir.path().join("static");
    std::fs::create_dir_all(&templates).unwrap();
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(templates.join("index.html"), "<h1>noughts</h1>").unwrap();
    std::fs::write(assets.join("app.js"), "console.log('hi');").unwrap();

    let mut config = Config::default();
    config.server.templates_dir = templates;
    config.server.static_dir = assets;
    let router = GameServer::new(config).router();

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"<h1>noughts</h1>");

    let response = router
        .oneshot(
            Request::builder()
                .uri("/static/app.js")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_template_is_server_error() {
    let dir = tempdir().unwrap();
    let mut config = Config::default();
    config.server.templates_dir = dir.path().to_path_buf();

    let response = GameServer::new(config)
        .router()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_server_serves_and_shuts_down() {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;

    let server = GameServer::new(config);
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    let server_handle = tokio::spawn(async move { server.serve(listener, shutdown_rx).await });

    let mut stream = timeout(Duration::from_secs(2), TcpStream::connect(addr))
        .await
        .expect("Should connect to server")
        .unwrap();
    stream
        .write_all(b"GET /keep_job_alive HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    timeout(Duration::from_secs(2), stream.read_to_string(&mut response))
        .await
        .expect("Should receive response")
        .unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("Job is alive"));

    shutdown_tx.send(()).await.unwrap();
    let result = timeout(Duration::from_secs(2), server_handle)
        .await
        .expect("Server should stop")
        .unwrap();
    assert!(result.is_ok());
}
