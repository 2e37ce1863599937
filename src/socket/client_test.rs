use super::*;
use axum::Router;
use axum::extract::ws::{CloseFrame as AxCloseFrame, Message as AxMessage, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;

// =============================================================================
// TEST SERVER
// =============================================================================

/// Greets with "ping", echoes data messages, and closes with 4001 on "close-me".
async fn upgrade(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(run_echo)
}

async fn run_echo(mut socket: WebSocket) {
    if socket.send(AxMessage::Text("ping".into())).await.is_err() {
        return;
    }
    // Keep reading after a close so the handshake reply gets flushed.
    while let Some(Ok(msg)) = socket.recv().await {
        let reply = match msg {
            AxMessage::Text(text) if text.as_str() == "close-me" => {
                AxMessage::Close(Some(AxCloseFrame { code: 4001, reason: "asked".into() }))
            }
            AxMessage::Text(text) => AxMessage::Text(text),
            AxMessage::Binary(bytes) => AxMessage::Binary(bytes),
            _ => continue,
        };
        if socket.send(reply).await.is_err() {
            break;
        }
    }
}

async fn spawn_server() -> String {
    let app = Router::new().route("/ws", get(upgrade));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("ws://{addr}/ws")
}

async fn unused_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("ws://{addr}/ws")
}

/// Accepts TCP connections and never answers the upgrade request.
async fn spawn_stalled_listener() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("ws://{addr}/ws")
}

/// Completes the upgrade, then never reads another frame.
async fn spawn_unresponsive_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            if let Ok(ws) = tokio_tungstenite::accept_async(socket).await {
                held.push(ws);
            }
        }
    });
    format!("ws://{addr}/ws")
}

fn client_for(url: &str) -> WebSocketClient {
    let config = ClientConfig::new(url).expect("config").with_connect_timeout(Duration::from_secs(2));
    WebSocketClient::new(config)
}

/// Route every inbound payload into a channel.
fn capture_messages(client: &WebSocketClient) -> mpsc::UnboundedReceiver<Payload> {
    let (tx, rx) = mpsc::unbounded_channel();
    client.on_message(move |payload| {
        tx.send(payload.clone()).expect("test receiver alive");
    });
    rx
}

async fn next_payload(rx: &mut mpsc::UnboundedReceiver<Payload>) -> Payload {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("message timed out")
        .expect("message channel closed")
}

async fn wait_closed(client: &WebSocketClient) -> ConnectionState {
    timeout(Duration::from_secs(2), client.closed()).await.expect("close timed out")
}

// =============================================================================
// MESSAGES
// =============================================================================

#[tokio::test]
async fn message_handler_gets_raw_payload_exactly_once() {
    let url = spawn_server().await;
    let client = client_for(&url);
    let mut rx = capture_messages(&client);

    client.connect().await.expect("connect");

    assert_eq!(next_payload(&mut rx).await, Payload::Text("ping".into()));
    assert!(
        timeout(Duration::from_millis(100), rx.recv()).await.is_err(),
        "handler should run once per message"
    );
}

#[tokio::test]
async fn send_round_trips_text_and_binary() {
    let url = spawn_server().await;
    let client = client_for(&url);
    let mut rx = capture_messages(&client);

    client.connect().await.expect("connect");
    assert_eq!(next_payload(&mut rx).await.as_text(), Some("ping"));

    client.send("hello").expect("send text");
    client.send(vec![1_u8, 2, 3]).expect("send binary");

    assert_eq!(next_payload(&mut rx).await, Payload::Text("hello".into()));
    assert_eq!(next_payload(&mut rx).await, Payload::Binary(vec![1, 2, 3]));
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[tokio::test]
async fn open_fires_after_connected() {
    let url = spawn_server().await;
    let client = client_for(&url);
    let opens = Arc::new(AtomicUsize::new(0));

    let handle = client.clone();
    let seen = Arc::clone(&opens);
    client.on_open(move || {
        assert_eq!(handle.state(), ConnectionState::Connected);
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let mut states = client.watch_state();
    client.connect().await.expect("connect");

    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(*states.borrow_and_update(), ConnectionState::Connected);
}

#[tokio::test]
async fn local_close_reports_normal_code_once() {
    let url = spawn_server().await;
    let client = client_for(&url);
    let (tx, mut closes) = mpsc::unbounded_channel();
    client.on_close(move |info| {
        tx.send(info.clone()).expect("test receiver alive");
    });

    client.connect().await.expect("connect");
    client.close().expect("close");

    assert_eq!(wait_closed(&client).await, ConnectionState::Closed);
    let info = closes.recv().await.expect("close info");
    assert_eq!(info.code, Some(1000));
    assert!(closes.try_recv().is_err());

    client.close().expect("closing twice is a no-op");
}

#[tokio::test]
async fn peer_close_carries_code_and_reason() {
    let url = spawn_server().await;
    let client = client_for(&url);
    let (tx, mut closes) = mpsc::unbounded_channel();
    client.on_close(move |info| {
        tx.send(info.clone()).expect("test receiver alive");
    });

    client.connect().await.expect("connect");
    client.send("close-me").expect("send");

    assert_eq!(wait_closed(&client).await, ConnectionState::Closed);
    let info = closes.recv().await.expect("close info");
    assert_eq!(info, CloseInfo { code: Some(4001), reason: "asked".into() });
}

#[tokio::test]
async fn reconnect_after_close() {
    let url = spawn_server().await;
    let client = client_for(&url);
    let mut rx = capture_messages(&client);

    client.connect().await.expect("first connect");
    assert_eq!(next_payload(&mut rx).await.as_text(), Some("ping"));
    client.close().expect("close");
    wait_closed(&client).await;

    client.connect().await.expect("second connect");
    assert_eq!(next_payload(&mut rx).await.as_text(), Some("ping"));
}

#[tokio::test]
async fn close_gives_up_when_peer_never_answers() {
    let url = spawn_unresponsive_server().await;
    let config = ClientConfig::new(url.as_str()).expect("config").with_close_timeout(Duration::from_millis(300));
    let client = WebSocketClient::new(config);
    let (tx, mut closes) = mpsc::unbounded_channel();
    client.on_close(move |info| {
        tx.send(info.clone()).expect("test receiver alive");
    });

    client.connect().await.expect("connect");
    client.close().expect("close");

    let err = client.send("late").unwrap_err();
    assert!(matches!(err, SocketError::Closing));
    assert_eq!(err.error_code(), "E_WS_CLOSING");
    client.close().expect("close while pending is a no-op");

    assert_eq!(wait_closed(&client).await, ConnectionState::Closed);
    let info = closes.recv().await.expect("close info");
    assert_eq!(info, CloseInfo { code: None, reason: String::new() });
    assert!(closes.try_recv().is_err());

    let err = client.send("after").unwrap_err();
    assert!(matches!(err, SocketError::NotConnected(ConnectionState::Closed)));
}

#[tokio::test]
async fn dropped_connect_returns_to_disconnected() {
    let url = spawn_stalled_listener().await;
    let config = ClientConfig::new(url.as_str()).expect("config").with_connect_timeout(Duration::from_millis(300));
    let client = WebSocketClient::new(config);

    assert!(timeout(Duration::from_millis(100), client.connect()).await.is_err());
    assert_eq!(client.state(), ConnectionState::Disconnected);

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, SocketError::ConnectTimeout(_)));
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.close().expect("close after cancelled dial");
    assert_eq!(client.state(), ConnectionState::Closed);
}

// =============================================================================
// ERRORS
// =============================================================================

#[tokio::test]
async fn connect_failure_is_surfaced() {
    let url = unused_url().await;
    let client = client_for(&url);
    let errors = Arc::new(AtomicUsize::new(0));

    let seen = Arc::clone(&errors);
    client.on_error(move |err| {
        assert_eq!(err.error_code(), "E_WS_CONNECT");
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, SocketError::Connect(_)));
    assert!(err.retryable());
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn send_requires_connection() {
    let client = client_for("ws://127.0.0.1:1/ws");
    let err = client.send("early").unwrap_err();
    assert!(matches!(err, SocketError::NotConnected(ConnectionState::Disconnected)));
    assert!(!err.retryable());
}

#[tokio::test]
async fn close_before_connect_skips_handlers() {
    let client = client_for("ws://127.0.0.1:1/ws");
    let closes = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&closes);
    client.on_close(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    client.close().expect("close");
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn double_connect_is_rejected() {
    let url = spawn_server().await;
    let client = client_for(&url);

    client.connect().await.expect("connect");
    let err = client.connect().await.unwrap_err();
    assert!(matches!(
        err,
        SocketError::InvalidTransition { from: ConnectionState::Connected, transition: Transition::Connect }
    ));
    assert_eq!(client.state(), ConnectionState::Connected);
}
