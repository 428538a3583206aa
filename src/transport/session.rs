//! Transport session and read loop.
//!
//! [`TransportSession::open`] spawns one task per connection attempt on the
//! given runtime. The task owns the socket and is its only reader and writer:
//!
//! 1. Parse the URL, connect (plain or TLS) and negotiate the upgrade,
//!    bounded by the handshake deadline
//! 2. Report [`TransportEvent::Connected`]
//! 3. Loop over socket reads, [`TransportHandle`] commands and keep-alive ticks
//! 4. Report [`TransportEvent::Closed`] exactly once, after an
//!    [`TransportEvent::Error`] if the session failed
//!
//! Every event goes through the session's [`EventHandler`]. The replies it
//! returns are written back on the socket before the next read.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, timeout};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};

use super::endpoint::Endpoint;
use super::frame::{DEFAULT_MAX_FRAME_LEN, Frame, FrameDecoder, Opcode, encode_client_frame};
use super::handshake::{HandshakeRequest, negotiate};
use super::stream::{self, MaybeTlsStream};

// ============================================================================
// Constants
// ============================================================================

/// Default bound on connect plus upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Socket read chunk size.
const READ_CHUNK_LEN: usize = 8192;

// ============================================================================
// Types
// ============================================================================

/// Something that happened on a transport session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Upgrade completed; sending is now possible.
    Connected,
    /// A complete UTF-8 text message.
    Message(String),
    /// The keep-alive interval elapsed.
    KeepaliveDue,
    /// Connect, negotiation, read or write failure.
    Error(String),
    /// The session ended. Always the last event.
    Closed,
}

/// What the handler wants written back after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Send a text frame.
    Text(String),
    /// Send a close frame and end the session.
    Close,
}

/// Event handler callback type.
///
/// Called on the session task for each event. Returned replies are written
/// in order; replies to [`TransportEvent::Closed`] and
/// [`TransportEvent::Error`] are ignored.
pub type EventHandler = Box<dyn Fn(TransportEvent) -> Vec<Reply> + Send + Sync>;

/// Whether the read loop keeps going after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

// ============================================================================
// SessionConfig
// ============================================================================

/// Tunables for one transport session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Deadline for connect, TLS and upgrade together.
    pub handshake_timeout: Option<Duration>,
    /// Period of [`TransportEvent::KeepaliveDue`] ticks.
    pub keepalive_interval: Option<Duration>,
    /// Check `Sec-WebSocket-Accept` against the request key.
    pub verify_accept: bool,
    /// Bound on a single inbound frame payload.
    pub max_frame_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
            keepalive_interval: None,
            verify_accept: true,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

// ============================================================================
// SessionCommand
// ============================================================================

/// Internal commands for the session task.
enum SessionCommand {
    /// Send a text frame.
    Send(String),
    /// Close the session.
    Close,
}

// ============================================================================
// TransportHandle
// ============================================================================

/// Host-side handle to a running session.
///
/// Cheap to clone. Dropping every handle closes the session.
#[derive(Clone)]
pub struct TransportHandle {
    /// Channel to the session task.
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    /// Set between handshake completion and teardown.
    open: Arc<AtomicBool>,
}

impl fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportHandle")
            .field("open", &self.is_open())
            .finish()
    }
}

impl TransportHandle {
    /// Queues a text message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] before the handshake completes or after
    /// the session ended.
    pub fn send(&self, text: impl Into<String>) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotConnected);
        }

        self.command_tx
            .send(SessionCommand::Send(text.into()))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Requests a close. Later calls are no-ops.
    pub fn close(&self) {
        let _ = self.command_tx.send(SessionCommand::Close);
    }

    /// Returns `true` while the session is upgraded and running.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

// ============================================================================
// TransportSession
// ============================================================================

/// One connection attempt's socket state, owned by its task.
pub struct TransportSession {
    /// Target URL as given.
    url: String,
    /// Session tunables.
    config: SessionConfig,
    /// Event sink.
    handler: EventHandler,
    /// Commands from [`TransportHandle`].
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    /// Shared with [`TransportHandle::is_open`].
    open: Arc<AtomicBool>,
}

impl TransportSession {
    /// Spawns a session for `url` on `runtime`.
    ///
    /// A malformed URL is reported as an error event followed by the closed
    /// event, without any connection attempt.
    pub fn open(
        runtime: &Handle,
        url: impl Into<String>,
        config: SessionConfig,
        handler: EventHandler,
    ) -> TransportHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));

        let session = Self {
            url: url.into(),
            config,
            handler,
            command_rx,
            open: Arc::clone(&open),
        };

        runtime.spawn(session.run());

        TransportHandle { command_tx, open }
    }

    /// Task body: drive the session, then report the outcome.
    async fn run(mut self) {
        let outcome = self.drive().await;
        self.open.store(false, Ordering::Release);

        if let Err(e) = outcome {
            warn!(url = %self.url, error = %e, "Transport session failed");
            (self.handler)(TransportEvent::Error(e.to_string()));
        }

        debug!(url = %self.url, "Transport session closed");
        (self.handler)(TransportEvent::Closed);
    }

    /// Connects, negotiates and runs the read loop until the session ends.
    async fn drive(&mut self) -> Result<()> {
        let endpoint = Endpoint::parse(&self.url)?;

        let establish = Self::establish(&endpoint, &self.config);
        let (mut stream, remainder) = tokio::select! {
            result = establish => result?,
            _ = Self::wait_for_close(&mut self.command_rx) => {
                debug!("Close requested before handshake completed");
                return Ok(());
            }
        };

        self.open.store(true, Ordering::Release);
        info!(endpoint = %endpoint, tls = stream.is_tls(), "WebSocket connection established");

        let replies = (self.handler)(TransportEvent::Connected);
        if Self::write_replies(&mut stream, replies).await? == Flow::Stop {
            return Ok(());
        }

        let mut decoder = FrameDecoder::with_remainder(remainder, self.config.max_frame_len);
        if self.process_frames(&mut stream, &mut decoder).await? == Flow::Stop {
            return Ok(());
        }

        let mut keepalive = self.config.keepalive_interval.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        let mut chunk = vec![0u8; READ_CHUNK_LEN];

        loop {
            tokio::select! {
                // Incoming bytes from the server
                read = stream.read(&mut chunk) => {
                    let read = read?;
                    if read == 0 {
                        debug!("Stream ended by remote");
                        return Ok(());
                    }

                    decoder.extend(&chunk[..read]);
                    if self.process_frames(&mut stream, &mut decoder).await? == Flow::Stop {
                        return Ok(());
                    }
                }

                // Commands from the handle
                command = self.command_rx.recv() => {
                    match command {
                        Some(SessionCommand::Send(text)) => {
                            Self::write_frame(&mut stream, Opcode::Text, text.as_bytes()).await?;
                        }

                        Some(SessionCommand::Close) | None => {
                            debug!("Close requested");
                            Self::close_stream(&mut stream).await;
                            return Ok(());
                        }
                    }
                }

                // Keep-alive interval
                () = Self::next_tick(&mut keepalive) => {
                    let replies = (self.handler)(TransportEvent::KeepaliveDue);
                    if Self::write_replies(&mut stream, replies).await? == Flow::Stop {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Connects and negotiates, bounded by the handshake deadline.
    async fn establish(
        endpoint: &Endpoint,
        config: &SessionConfig,
    ) -> Result<(MaybeTlsStream, Vec<u8>)> {
        let attempt = async {
            let mut stream = stream::connect(endpoint).await?;
            let request = HandshakeRequest::new(endpoint);
            let remainder = negotiate(&mut stream, &request, config.verify_accept).await?;
            Ok((stream, remainder))
        };

        match config.handshake_timeout {
            Some(deadline) => timeout(deadline, attempt)
                .await
                .map_err(|_| Error::connection_timeout(deadline.as_millis() as u64))?,
            None => attempt.await,
        }
    }

    /// Handles every complete frame in the decoder.
    async fn process_frames(
        &self,
        stream: &mut MaybeTlsStream,
        decoder: &mut FrameDecoder,
    ) -> Result<Flow> {
        while let Some(frame) = decoder.next_frame()? {
            if self.handle_frame(stream, frame).await? == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    /// Handles one inbound frame.
    async fn handle_frame(&self, stream: &mut MaybeTlsStream, frame: Frame) -> Result<Flow> {
        match frame.opcode {
            Opcode::Text => {
                let Some(text) = frame.text() else {
                    debug!(len = frame.payload.len(), "Dropping text frame with invalid UTF-8");
                    return Ok(Flow::Continue);
                };
                trace!(len = text.len(), "Text message received");

                let replies = (self.handler)(TransportEvent::Message(text.to_string()));
                Self::write_replies(stream, replies).await
            }

            Opcode::Close => {
                debug!("Close frame received");
                Self::close_stream(stream).await;
                Ok(Flow::Stop)
            }

            Opcode::Ping => {
                trace!(len = frame.payload.len(), "Ping received");
                Self::write_frame(stream, Opcode::Pong, &frame.payload).await?;
                Ok(Flow::Continue)
            }

            // Pong, binary, continuation and reserved frames carry nothing for us
            other => {
                trace!(opcode = ?other, "Ignoring frame");
                Ok(Flow::Continue)
            }
        }
    }

    /// Writes handler replies in order.
    async fn write_replies(stream: &mut MaybeTlsStream, replies: Vec<Reply>) -> Result<Flow> {
        for reply in replies {
            match reply {
                Reply::Text(text) => {
                    Self::write_frame(stream, Opcode::Text, text.as_bytes()).await?;
                }
                Reply::Close => {
                    debug!("Handler requested close");
                    Self::close_stream(stream).await;
                    return Ok(Flow::Stop);
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// Writes one masked frame.
    async fn write_frame(stream: &mut MaybeTlsStream, opcode: Opcode, payload: &[u8]) -> Result<()> {
        stream.write_all(&encode_client_frame(opcode, payload)).await?;
        stream.flush().await?;
        trace!(?opcode, len = payload.len(), "Frame sent");
        Ok(())
    }

    /// Sends a close frame and shuts the stream down, ignoring failures.
    async fn close_stream(stream: &mut MaybeTlsStream) {
        if let Err(e) = Self::write_frame(stream, Opcode::Close, &[]).await {
            debug!(error = %e, "Failed to send close frame");
        }
        let _ = stream.shutdown().await;
    }

    /// Resolves when a close is requested or every handle is gone.
    async fn wait_for_close(command_rx: &mut mpsc::UnboundedReceiver<SessionCommand>) {
        while let Some(command) = command_rx.recv().await {
            if matches!(command, SessionCommand::Close) {
                return;
            }
        }
    }

    /// Resolves on the next keep-alive tick, never when disabled.
    async fn next_tick(keepalive: &mut Option<Interval>) {
        match keepalive {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    /// Handler that forwards every event to a channel.
    fn recording_handler(
        replies: fn(&TransportEvent) -> Vec<Reply>,
    ) -> (EventHandler, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: EventHandler = Box::new(move |event| {
            let out = replies(&event);
            let _ = tx.send(event);
            out
        });
        (handler, rx)
    }

    fn no_replies(_: &TransportEvent) -> Vec<Reply> {
        Vec::new()
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event within deadline")
            .expect("channel open")
    }

    async fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        (listener, format!("ws://127.0.0.1:{port}/"))
    }

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.handshake_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.keepalive_interval, None);
        assert!(config.verify_accept);
        assert_eq!(config.max_frame_len, DEFAULT_MAX_FRAME_LEN);
    }

    #[tokio::test]
    async fn test_malformed_url_reports_error_then_closed() {
        let (handler, mut rx) = recording_handler(no_replies);
        let handle = TransportSession::open(
            &Handle::current(),
            "http://nope",
            SessionConfig::default(),
            handler,
        );

        assert!(matches!(next_event(&mut rx).await, TransportEvent::Error(_)));
        assert_eq!(next_event(&mut rx).await, TransportEvent::Closed);
        assert!(!handle.is_open());
        assert!(matches!(handle.send("x"), Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_connect_send_receive_and_close() {
        let (listener, url) = bind().await;

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(socket).await.expect("upgrade");

            ws.send(Message::Text("hello".into())).await.expect("send");

            let echoed = ws.next().await.expect("message").expect("ok");
            assert_eq!(echoed, Message::Text("from client".into()));

            let closing = ws.next().await.expect("message").expect("ok");
            assert!(matches!(closing, Message::Close(_)));
        });

        let (handler, mut rx) = recording_handler(no_replies);
        let handle =
            TransportSession::open(&Handle::current(), url, SessionConfig::default(), handler);

        assert_eq!(next_event(&mut rx).await, TransportEvent::Connected);
        assert!(handle.is_open());
        assert_eq!(
            next_event(&mut rx).await,
            TransportEvent::Message("hello".to_string())
        );

        handle.send("from client").expect("send");
        handle.close();

        assert_eq!(next_event(&mut rx).await, TransportEvent::Closed);
        assert!(rx.try_recv().is_err());
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_replies_are_written_back() {
        let (listener, url) = bind().await;

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(socket).await.expect("upgrade");
            let greeting = ws.next().await.expect("message").expect("ok");
            assert_eq!(greeting, Message::Text("greeting".into()));
        });

        fn greet(event: &TransportEvent) -> Vec<Reply> {
            match event {
                TransportEvent::Connected => vec![Reply::Text("greeting".into())],
                _ => Vec::new(),
            }
        }

        let (handler, mut rx) = recording_handler(greet);
        let _handle =
            TransportSession::open(&Handle::current(), url, SessionConfig::default(), handler);

        assert_eq!(next_event(&mut rx).await, TransportEvent::Connected);
        server.await.expect("server task");
        assert_eq!(next_event(&mut rx).await, TransportEvent::Closed);
    }

    #[tokio::test]
    async fn test_server_ping_is_answered_with_pong() {
        let (listener, url) = bind().await;

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(socket).await.expect("upgrade");
            ws.send(Message::Ping(b"beat".to_vec().into())).await.expect("send");

            let pong = ws.next().await.expect("message").expect("ok");
            assert_eq!(pong, Message::Pong(b"beat".to_vec().into()));
        });

        let (handler, mut rx) = recording_handler(no_replies);
        let _handle =
            TransportSession::open(&Handle::current(), url, SessionConfig::default(), handler);

        assert_eq!(next_event(&mut rx).await, TransportEvent::Connected);
        server.await.expect("server task");

        // Ping is never surfaced as a message
        assert_eq!(next_event(&mut rx).await, TransportEvent::Closed);
    }

    #[tokio::test]
    async fn test_server_close_ends_session() {
        let (listener, url) = bind().await;

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(socket).await.expect("upgrade");
            let _ = ws.close(None).await;
            while ws.next().await.is_some() {}
        });

        let (handler, mut rx) = recording_handler(no_replies);
        let handle =
            TransportSession::open(&Handle::current(), url, SessionConfig::default(), handler);

        assert_eq!(next_event(&mut rx).await, TransportEvent::Connected);
        assert_eq!(next_event(&mut rx).await, TransportEvent::Closed);
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn test_rejected_upgrade_reports_error_then_closed() {
        let (listener, url) = bind().await;

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")
                .await;
        });

        let (handler, mut rx) = recording_handler(no_replies);
        let _handle =
            TransportSession::open(&Handle::current(), url, SessionConfig::default(), handler);

        match next_event(&mut rx).await {
            TransportEvent::Error(message) => assert!(message.contains("handshake")),
            other => panic!("expected error, got {other:?}"),
        }
        assert_eq!(next_event(&mut rx).await, TransportEvent::Closed);
    }

    #[tokio::test]
    async fn test_handshake_deadline() {
        let (listener, url) = bind().await;

        // Accepts but never answers the upgrade
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let config = SessionConfig {
            handshake_timeout: Some(Duration::from_millis(100)),
            ..SessionConfig::default()
        };
        let (handler, mut rx) = recording_handler(no_replies);
        let _handle = TransportSession::open(&Handle::current(), url, config, handler);

        match next_event(&mut rx).await {
            TransportEvent::Error(message) => assert!(message.contains("timeout")),
            other => panic!("expected error, got {other:?}"),
        }
        assert_eq!(next_event(&mut rx).await, TransportEvent::Closed);
        server.abort();
    }

    #[tokio::test]
    async fn test_keepalive_ticks_reach_handler() {
        let (listener, url) = bind().await;

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(socket).await.expect("upgrade");
            let ping = ws.next().await.expect("message").expect("ok");
            assert_eq!(ping, Message::Text(r#"{"type":"ping"}"#.into()));
        });

        fn ping_on_tick(event: &TransportEvent) -> Vec<Reply> {
            match event {
                TransportEvent::KeepaliveDue => vec![Reply::Text(r#"{"type":"ping"}"#.into())],
                _ => Vec::new(),
            }
        }

        let config = SessionConfig {
            keepalive_interval: Some(Duration::from_millis(50)),
            ..SessionConfig::default()
        };
        let (handler, mut rx) = recording_handler(ping_on_tick);
        let handle = TransportSession::open(&Handle::current(), url, config, handler);

        assert_eq!(next_event(&mut rx).await, TransportEvent::Connected);
        assert_eq!(next_event(&mut rx).await, TransportEvent::KeepaliveDue);
        server.await.expect("server task");
        handle.close();
    }
}
