//! End-to-end sync tests against an in-process WebSocket server.
//!
//! The server side uses `tokio-tungstenite`, so these tests also check that
//! the hand-written client codec interoperates with an independent
//! implementation.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing_subscriber::EnvFilter;

use token_beam::{HostState, PairingState, RelayEvent, SyncClient, srgb_to_linear};

// ============================================================================
// Harness
// ============================================================================

type Socket = WebSocketStream<TcpStream>;

const DEADLINE: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Binds a server that runs `script` for every accepted connection.
async fn serve<F, Fut>(script: F) -> Result<(String, JoinHandle<()>)>
where
    F: Fn(Socket) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("ws://{}", listener.local_addr()?);

    let server = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let Ok(socket) = tokio_tungstenite::accept_async(stream).await else {
                continue;
            };
            let session = script(socket);
            tokio::spawn(async move {
                if let Err(e) = session.await {
                    tracing::error!(error = %e, "server script failed");
                }
            });
        }
    });

    Ok((url, server))
}

/// Reads the next text message as JSON, skipping control frames.
async fn next_json(socket: &mut Socket) -> Result<Value> {
    loop {
        let message = socket
            .next()
            .await
            .context("client went away")?
            .context("read failed")?;
        match message {
            Message::Text(text) => return Ok(serde_json::from_str(text.as_str())?),
            Message::Close(_) => bail!("client closed"),
            _ => continue,
        }
    }
}

async fn send_json(socket: &mut Socket, value: Value) -> Result<()> {
    socket.send(Message::Text(value.to_string().into())).await?;
    Ok(())
}

/// Answers the client's pair request with `origin`.
async fn accept_pair(socket: &mut Socket, origin: &str) -> Result<Value> {
    let request = next_json(socket).await?;
    if request["type"] != "pair" {
        bail!("expected pair request, got {request}");
    }
    send_json(socket, json!({"type": "pair", "origin": origin})).await?;
    Ok(request)
}

/// Keeps the connection open until the client leaves.
async fn hold_open(socket: &mut Socket) {
    while let Some(Ok(message)) = socket.next().await {
        if message.is_close() {
            break;
        }
    }
}

fn client_for(url: &str) -> Result<SyncClient> {
    Ok(SyncClient::builder()
        .server_url(url)
        .client_type("blender")
        .handshake_timeout(Duration::from_secs(2))
        .build()?)
}

/// Polls until an event matches `done`, returning everything seen.
async fn events_until(
    client: &SyncClient,
    done: impl Fn(&RelayEvent) -> bool,
) -> Result<Vec<RelayEvent>> {
    let mut seen = Vec::new();
    let started = tokio::time::Instant::now();

    loop {
        let batch = client.poll();
        let finished = batch.iter().any(&done);
        seen.extend(batch);
        if finished {
            return Ok(seen);
        }
        if started.elapsed() > DEADLINE {
            bail!("timed out waiting for event; saw {seen:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn status(text: &str) -> RelayEvent {
    RelayEvent::Status(text.to_string())
}

fn is_status(event: &RelayEvent, text: &str) -> bool {
    matches!(event, RelayEvent::Status(s) if s == text)
}

// ============================================================================
// Pairing
// ============================================================================

#[tokio::test]
async fn test_pair_reaches_paired_with_origin() -> Result<()> {
    init_tracing();

    let (url, _server) = serve(|mut socket| async move {
        let request = accept_pair(&mut socket, "figma").await?;
        assert_eq!(
            request,
            json!({"type": "pair", "clientType": "blender", "sessionToken": "beam://ABC123"})
        );
        hold_open(&mut socket).await;
        Ok(())
    })
    .await?;

    let client = client_for(&url)?;
    client.connect("abc123")?;

    let events = events_until(&client, |e| matches!(e, RelayEvent::Connected(true))).await?;
    let events = [events, client.poll()].concat();

    assert_eq!(events.first(), Some(&status("Connecting...")));
    assert!(events.contains(&status("Connected - pairing...")));
    assert!(events.contains(&status("Paired with figma - waiting for data...")));
    assert_eq!(client.state(), PairingState::Paired);

    client.disconnect();
    Ok(())
}

// ============================================================================
// Sync
// ============================================================================

#[tokio::test]
async fn test_sync_delivers_then_replaces_colors() -> Result<()> {
    init_tracing();

    let (url, _server) = serve(|mut socket| async move {
        accept_pair(&mut socket, "figma").await?;
        send_json(
            &mut socket,
            json!({"type": "sync", "payload": {"collections": [{"name": "Brand", "modes": [
                {"name": "Value", "tokens": [{"type": "color", "name": "primary", "value": "#3366FFFF"}]}
            ]}]}}),
        )
        .await?;
        send_json(
            &mut socket,
            json!({"type": "sync", "payload": {"collections": [{"name": "Brand", "modes": [
                {"name": "Value", "tokens": []}
            ]}]}}),
        )
        .await?;
        hold_open(&mut socket).await;
        Ok(())
    })
    .await?;

    let client = client_for(&url)?;
    client.connect("abc123")?;

    let events = events_until(&client, |e| is_status(e, "No colors found in payload")).await?;

    let color_lists: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            RelayEvent::Colors(colors) => Some(colors.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(color_lists.len(), 2);

    let [primary] = color_lists[0].as_slice() else {
        bail!("expected exactly one color, got {:?}", color_lists[0]);
    };
    assert_eq!(primary.name, "primary");
    assert_eq!(primary.collection, "Brand");
    assert_eq!(primary.mode, "Value");
    assert!((primary.rgba.r - srgb_to_linear(f64::from(0x33u8) / 255.0)).abs() < 1e-12);
    assert!((primary.rgba.g - srgb_to_linear(f64::from(0x66u8) / 255.0)).abs() < 1e-12);
    assert!((primary.rgba.b - 1.0).abs() < 1e-9);
    assert!((primary.rgba.a - 1.0).abs() < 1e-12);
    assert_eq!(primary.to_hex(), "#3366FFFF");
    assert!(events.contains(&status("1 colors synced")));

    assert!(color_lists[1].is_empty());

    // Folding the same events leaves the host with the latest list only
    let mut host = HostState::default();
    host.apply_all(events);
    assert!(host.colors.is_empty());
    assert_eq!(host.status, "No colors found in payload");

    client.disconnect();
    Ok(())
}

// ============================================================================
// Server Errors
// ============================================================================

#[tokio::test]
async fn test_warning_keeps_session_paired() -> Result<()> {
    init_tracing();

    let (url, _server) = serve(|mut socket| async move {
        accept_pair(&mut socket, "figma").await?;
        send_json(&mut socket, json!({"type": "error", "error": "[warn] rate limited"})).await?;
        hold_open(&mut socket).await;
        Ok(())
    })
    .await?;

    let client = client_for(&url)?;
    client.connect("abc123")?;

    let mut host = HostState::default();
    host.apply_all(events_until(&client, |e| is_status(e, "rate limited")).await?);

    assert_eq!(host.status, "rate limited");
    assert!(host.connected);
    assert_eq!(client.state(), PairingState::Paired);

    client.disconnect();
    Ok(())
}

#[tokio::test]
async fn test_invalid_session_disconnects() -> Result<()> {
    init_tracing();

    let (closed_tx, closed_rx) = tokio::sync::oneshot::channel::<bool>();
    let closed_tx = std::sync::Mutex::new(Some(closed_tx));
    let closed_tx = std::sync::Arc::new(closed_tx);

    let (url, _server) = serve(move |mut socket| {
        let closed_tx = std::sync::Arc::clone(&closed_tx);
        async move {
            accept_pair(&mut socket, "figma").await?;
            send_json(&mut socket, json!({"type": "error", "error": "Invalid session token"}))
                .await?;

            let saw_close = matches!(socket.next().await, Some(Ok(Message::Close(_))));
            if let Some(tx) = closed_tx.lock().ok().and_then(|mut slot| slot.take()) {
                let _ = tx.send(saw_close);
            }
            Ok(())
        }
    })
    .await?;

    let client = client_for(&url)?;
    client.connect("abc123")?;

    let events = events_until(&client, |e| is_status(e, "Session not found")).await?;
    assert!(events.contains(&RelayEvent::Connected(false)));
    assert_eq!(client.state(), PairingState::Disconnected);
    assert!(client.session_token().is_none());

    let saw_close = tokio::time::timeout(DEADLINE, closed_rx).await??;
    assert!(saw_close, "client should send a close frame");

    // The transport's own close belongs to the superseded generation
    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut host = HostState::default();
    host.apply_all(events);
    host.apply_all(client.poll());
    assert_eq!(host.status, "Session not found");
    assert!(!host.connected);

    Ok(())
}

// ============================================================================
// Generations
// ============================================================================

#[tokio::test]
async fn test_superseded_connection_events_are_discarded() -> Result<()> {
    init_tracing();

    // Echo the token back as the origin so each connection is identifiable
    let (url, _server) = serve(|mut socket| async move {
        let request = next_json(&mut socket).await?;
        let token = request["sessionToken"].as_str().unwrap_or_default().to_string();
        send_json(&mut socket, json!({"type": "pair", "origin": token})).await?;
        hold_open(&mut socket).await;
        Ok(())
    })
    .await?;

    let client = client_for(&url)?;
    client.connect("aaa")?;
    client.disconnect();
    client.connect("bbb")?;
    let second = client.generation();

    let events = events_until(&client, |e| matches!(e, RelayEvent::Connected(true))).await?;

    assert!(
        events
            .iter()
            .all(|e| !matches!(e, RelayEvent::Status(s) if s.contains("AAA"))),
        "stale events leaked: {events:?}"
    );
    let events = [events, client.poll()].concat();
    assert!(events.contains(&status("Paired with beam://BBB - waiting for data...")));
    assert_eq!(client.generation(), second);
    assert_eq!(client.state(), PairingState::Paired);

    client.disconnect();
    Ok(())
}

// ============================================================================
// Keep-alive
// ============================================================================

#[tokio::test]
async fn test_server_ping_is_answered() -> Result<()> {
    init_tracing();

    let (pong_tx, pong_rx) = tokio::sync::mpsc::unbounded_channel::<Value>();

    let (url, _server) = serve(move |mut socket| {
        let pong_tx = pong_tx.clone();
        async move {
            accept_pair(&mut socket, "figma").await?;
            send_json(&mut socket, json!({"type": "ping"})).await?;
            let reply = next_json(&mut socket).await?;
            let _ = pong_tx.send(reply);
            hold_open(&mut socket).await;
            Ok(())
        }
    })
    .await?;

    let client = client_for(&url)?;
    client.connect("abc123")?;

    let mut pong_rx = pong_rx;
    let reply = tokio::time::timeout(DEADLINE, pong_rx.recv())
        .await?
        .context("server dropped")?;
    assert_eq!(reply, json!({"type": "pong"}));

    client.disconnect();
    Ok(())
}

#[tokio::test]
async fn test_unanswered_keepalive_times_out() -> Result<()> {
    init_tracing();

    // Pairs, then ignores everything
    let (url, _server) = serve(|mut socket| async move {
        accept_pair(&mut socket, "figma").await?;
        hold_open(&mut socket).await;
        Ok(())
    })
    .await?;

    let client = SyncClient::builder()
        .server_url(url.as_str())
        .keepalive_interval(Duration::from_millis(100))
        .build()?;
    client.connect("abc123")?;

    let events = events_until(&client, |e| is_status(e, "Disconnected")).await?;
    assert!(events.contains(&status("Connection timed out")));
    assert_eq!(client.state(), PairingState::Disconnected);

    Ok(())
}

#[tokio::test]
async fn test_keepalive_survives_ping_echoing_server() -> Result<()> {
    init_tracing();

    let (other_tx, mut other_rx) = tokio::sync::mpsc::unbounded_channel::<Value>();

    // Answers `ping` with `ping` and rejects any other message type
    let (url, _server) = serve(move |mut socket| {
        let other_tx = other_tx.clone();
        async move {
            accept_pair(&mut socket, "figma").await?;
            while let Ok(message) = next_json(&mut socket).await {
                if message["type"] == "ping" {
                    send_json(&mut socket, json!({"type": "ping"})).await?;
                } else {
                    let _ = other_tx.send(message);
                    send_json(
                        &mut socket,
                        json!({"type": "error", "error": "Unknown message type"}),
                    )
                    .await?;
                }
            }
            Ok(())
        }
    })
    .await?;

    let client = SyncClient::builder()
        .server_url(url.as_str())
        .keepalive_interval(Duration::from_millis(50))
        .build()?;
    client.connect("abc123")?;

    let mut events = events_until(&client, |e| *e == RelayEvent::Connected(true)).await?;
    tokio::time::sleep(Duration::from_millis(400)).await;
    events.extend(client.poll());

    assert_eq!(client.state(), PairingState::Paired);
    assert!(!events.contains(&status("Connection timed out")));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, RelayEvent::Status(s) if s.starts_with("Error: ")))
    );
    assert!(other_rx.try_recv().is_err());

    client.disconnect();
    Ok(())
}

#[tokio::test]
async fn test_registered_client_id_reaches_host() -> Result<()> {
    init_tracing();

    let (url, _server) = serve(|mut socket| async move {
        accept_pair(&mut socket, "figma").await?;
        send_json(&mut socket, json!({"type": "registered", "clientId": "client-9"})).await?;
        hold_open(&mut socket).await;
        Ok(())
    })
    .await?;

    let client = client_for(&url)?;
    client.connect("abc123")?;

    let mut host = HostState::default();
    host.apply_all(events_until(&client, |e| matches!(e, RelayEvent::ClientId(_))).await?);

    assert_eq!(host.client_id.as_ref().map(|id| id.as_str()), Some("client-9"));
    assert_eq!(client.client_id().map(|id| id.to_string()).as_deref(), Some("client-9"));

    client.disconnect();
    let mut later = host.clone();
    later.apply_all(events_until(&client, |e| is_status(e, "Disconnected")).await?);
    assert!(later.client_id.is_none());

    Ok(())
}

// ============================================================================
// Handshake
// ============================================================================

/// Answers the upgrade with a `101` carrying a bogus accept digest.
async fn bogus_accept_server() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("ws://{}", listener.local_addr()?);

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 2048];
                let _ = stream.read(&mut buf).await;
                let _ = stream
                    .write_all(
                        b"HTTP/1.1 101 Switching Protocols\r\n\
                          Upgrade: websocket\r\n\
                          Connection: Upgrade\r\n\
                          Sec-WebSocket-Accept: bm90IHRoZSByaWdodCBrZXk=\r\n\r\n",
                    )
                    .await;
                // Keep the socket open until the client hangs up
                while matches!(stream.read(&mut buf).await, Ok(n) if n > 0) {}
            });
        }
    });

    Ok(url)
}

#[tokio::test]
async fn test_wrong_accept_digest_fails_handshake() -> Result<()> {
    init_tracing();

    let url = bogus_accept_server().await?;
    let client = client_for(&url)?;
    client.connect("abc123")?;

    let events = events_until(&client, |e| is_status(e, "Disconnected")).await?;
    assert!(events.iter().any(|e| matches!(
        e,
        RelayEvent::Status(s) if s.starts_with("Connection error: WebSocket handshake failed")
    )));
    assert!(!events.contains(&status("Connected - pairing...")));

    Ok(())
}

#[tokio::test]
async fn test_unverified_accept_digest_connects() -> Result<()> {
    init_tracing();

    let url = bogus_accept_server().await?;
    let client = SyncClient::builder()
        .server_url(url.as_str())
        .verify_accept(false)
        .build()?;
    client.connect("abc123")?;

    events_until(&client, |e| is_status(e, "Connected - pairing...")).await?;
    assert_eq!(client.state(), PairingState::AwaitingPair);

    client.disconnect();
    Ok(())
}

#[tokio::test]
async fn test_rejected_upgrade_reports_error() -> Result<()> {
    init_tracing();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("ws://{}", listener.local_addr()?);
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = [0u8; 2048];
            let _ = stream.read(&mut buf).await;
            let _ = stream
                .write_all(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n")
                .await;
        }
    });

    let client = client_for(&url)?;
    client.connect("abc123")?;

    let events = events_until(&client, |e| is_status(e, "Disconnected")).await?;
    assert!(events.iter().any(|e| matches!(
        e,
        RelayEvent::Status(s) if s.starts_with("Connection error:") && s.contains("403")
    )));
    assert_eq!(client.state(), PairingState::Disconnected);

    Ok(())
}
