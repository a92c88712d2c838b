//! Per-connection session loop.
//!
//! One task per accepted TCP connection. It performs the WebSocket upgrade,
//! checks the extension's adapter version, registers the player and then
//! runs a single `select!` loop that owns both socket halves:
//!
//! - inbound frames are decoded and folded into the player state in order
//! - outbound command frames from the dispatcher are written one at a time
//! - a close request (shutdown, liveness sweep) ends the loop
//!
//! # Lifecycle
//!
//! ```text
//! Connecting ──upgrade──► Handshaking ──ADAPTER_VERSION ok──► Active
//!      │                       │                                │
//!      └──────── error ────────┴──── mismatch / timeout ────────┤
//!                                                               ▼
//!                                               Closing ──► Closed
//! ```
//!
//! A session is registered only once it reaches `Active` and unregisters
//! itself on the way to `Closed`.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, timeout, timeout_at};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info, trace, warn};

use crate::dispatch::EventResults;
use crate::error::{Error, Result};
use crate::identifiers::PlayerId;
use crate::player::{Applied, CoverStore, unix_millis};
use crate::protocol::{
    AdapterVersion, FieldUpdate, ParsedMessage, decode_frames, encode_greeting,
};
use crate::registry::{CloseReason, Outbound, Registry, SessionHandle};

// ============================================================================
// Constants
// ============================================================================

/// Longest close reason a control frame can carry.
const MAX_CLOSE_REASON: usize = 123;

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<TcpStream>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// Everything a session needs from the server, shared by all sessions.
#[derive(Debug)]
pub(crate) struct SessionContext {
    /// Player registry.
    pub registry: Arc<Registry>,
    /// Command acknowledgements.
    pub results: Arc<EventResults>,
    /// Cover artwork storage.
    pub covers: CoverStore,
    /// Version announced and required in the handshake.
    pub version: AdapterVersion,
    /// Deadline for upgrade plus `ADAPTER_VERSION`.
    pub handshake_timeout: Duration,
    /// Malformed frames tolerated before the session is closed.
    pub max_decode_errors: u32,
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// TCP accepted, WebSocket upgrade in progress.
    Connecting,
    /// Upgraded, waiting for `ADAPTER_VERSION`.
    Handshaking,
    /// Registered and exchanging frames.
    Active,
    /// Leaving the registry and closing the socket.
    Closing,
    /// Finished. Never reused.
    Closed,
}

/// Result of the handshake phase.
enum Handshake {
    /// Version accepted.
    Accepted {
        /// Frames that followed `ADAPTER_VERSION` in the same message.
        backlog: Vec<Result<ParsedMessage>>,
        /// Last binary cover received before the version.
        early_cover: Option<Vec<u8>>,
    },
    /// The server stopped first.
    Shutdown,
}

// ============================================================================
// Session
// ============================================================================

/// One connection to a browser extension.
pub(crate) struct Session {
    id: PlayerId,
    addr: SocketAddr,
    phase: SessionPhase,
    ctx: Arc<SessionContext>,
}

impl Session {
    /// Creates a session for an accepted connection.
    pub(crate) fn new(id: PlayerId, addr: SocketAddr, ctx: Arc<SessionContext>) -> Self {
        Self {
            id,
            addr,
            phase: SessionPhase::Connecting,
            ctx,
        }
    }

    /// Runs the session to completion.
    pub(crate) async fn run(mut self, stream: TcpStream, mut shutdown: watch::Receiver<bool>) {
        match self.serve(stream, &mut shutdown).await {
            Ok(()) => debug!(player_id = %self.id, addr = %self.addr, "Session ended"),
            Err(e) => warn!(player_id = %self.id, addr = %self.addr, error = %e, "Session failed"),
        }
        self.transition(SessionPhase::Closed);
    }

    fn transition(&mut self, next: SessionPhase) {
        trace!(player_id = %self.id, from = ?self.phase, to = ?next, "Session transition");
        self.phase = next;
    }

    async fn serve(
        &mut self,
        stream: TcpStream,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let handshake_ms = self.ctx.handshake_timeout.as_millis() as u64;

        let ws_stream = timeout(
            self.ctx.handshake_timeout,
            tokio_tungstenite::accept_async(stream),
        )
        .await
        .map_err(|_| Error::handshake_timeout(handshake_ms))?
        .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

        self.transition(SessionPhase::Handshaking);
        let (mut ws_write, mut ws_read) = ws_stream.split();

        let greeting = encode_greeting(&self.ctx.version.to_string());
        ws_write.send(Message::Text(greeting.into())).await?;

        let (backlog, early_cover) = match self.handshake(&mut ws_read, shutdown).await {
            Ok(Handshake::Accepted {
                backlog,
                early_cover,
            }) => (backlog, early_cover),
            Ok(Handshake::Shutdown) => {
                self.transition(SessionPhase::Closing);
                send_close(&mut ws_write, CloseCode::Away, CloseReason::Shutdown.as_str()).await;
                return Ok(());
            }
            Err(e) => {
                self.transition(SessionPhase::Closing);
                warn!(player_id = %self.id, addr = %self.addr, error = %e, "Handshake rejected");
                send_close(&mut ws_write, CloseCode::Policy, &e.to_string()).await;
                return Err(e);
            }
        };

        let (handle, outbound_rx) = SessionHandle::new(self.id, unix_millis());
        self.ctx.registry.register(Arc::clone(&handle));
        self.transition(SessionPhase::Active);
        info!(player_id = %self.id, addr = %self.addr, "Session active");

        if let Some(bytes) = early_cover {
            self.apply_cover_bytes(&handle, bytes).await;
        }

        let mut result = Ok(());
        for frame in backlog {
            if !self.handle_frame(&handle, frame).await {
                send_close(&mut ws_write, CloseCode::Policy, "too many malformed frames").await;
                result = Err(Error::decode("too many malformed frames"));
                break;
            }
        }
        if result.is_ok() {
            result = self
                .active_loop(&handle, outbound_rx, &mut ws_write, &mut ws_read, shutdown)
                .await;
        }

        self.transition(SessionPhase::Closing);
        self.ctx.registry.unregister(self.id);
        self.ctx.covers.remove(self.id);
        info!(player_id = %self.id, "Session closed");

        result
    }
}

// ============================================================================
// Session - Handshake
// ============================================================================

impl Session {
    /// Waits for `ADAPTER_VERSION` and checks it.
    async fn handshake(
        &self,
        ws_read: &mut WsRead,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Handshake> {
        if *shutdown.borrow() {
            return Ok(Handshake::Shutdown);
        }

        let deadline = Instant::now() + self.ctx.handshake_timeout;
        let timeout_ms = self.ctx.handshake_timeout.as_millis() as u64;
        let mut early_cover = None;

        loop {
            let message = tokio::select! {
                _ = shutdown.changed() => return Ok(Handshake::Shutdown),
                message = timeout_at(deadline, ws_read.next()) => message,
            };

            let text = match message {
                Err(_) => return Err(Error::handshake_timeout(timeout_ms)),
                Ok(None) | Ok(Some(Ok(Message::Close(_)))) => return Err(Error::ConnectionClosed),
                Ok(Some(Err(e))) => return Err(e.into()),
                Ok(Some(Ok(Message::Text(text)))) => text,
                Ok(Some(Ok(Message::Binary(bytes)))) => {
                    // kept until the player exists, newest wins
                    debug!(player_id = %self.id, len = bytes.len(), "Cover buffered before handshake");
                    early_cover = Some(bytes.to_vec());
                    continue;
                }
                // control frames do not count
                Ok(Some(Ok(_))) => continue,
            };

            let mut frames = decode_frames(&text);
            match frames.next() {
                None => continue,
                Some(Ok(ParsedMessage::Hello { adapter_version })) => {
                    self.ctx.version.check(&adapter_version)?;
                    debug!(player_id = %self.id, %adapter_version, "Handshake accepted");
                    return Ok(Handshake::Accepted {
                        backlog: frames.collect(),
                        early_cover,
                    });
                }
                Some(Ok(_)) => {
                    return Err(Error::protocol_version(
                        self.ctx.version.to_string(),
                        "none",
                    ));
                }
                Some(Err(e)) => return Err(e),
            }
        }
    }
}

// ============================================================================
// Session - Event Loop
// ============================================================================

impl Session {
    /// Main loop while registered.
    async fn active_loop(
        &self,
        handle: &Arc<SessionHandle>,
        mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
        ws_write: &mut WsWrite,
        ws_read: &mut WsRead,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        if *shutdown.borrow() {
            send_close(ws_write, CloseCode::Away, CloseReason::Shutdown.as_str()).await;
            return Ok(());
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!(player_id = %self.id, "Shutdown signal received");
                    send_close(ws_write, CloseCode::Away, CloseReason::Shutdown.as_str()).await;
                    return Ok(());
                }

                // Incoming messages from extension
                message = ws_read.next() => {
                    let message = match message {
                        Some(Ok(message)) => message,
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            debug!(player_id = %self.id, "WebSocket stream ended");
                            return Ok(());
                        }
                    };
                    handle.touch(Instant::now());

                    match message {
                        Message::Text(text) => {
                            for frame in decode_frames(&text) {
                                if !self.handle_frame(handle, frame).await {
                                    send_close(ws_write, CloseCode::Policy, "too many malformed frames").await;
                                    return Err(Error::decode("too many malformed frames"));
                                }
                            }
                        }

                        Message::Binary(bytes) => {
                            self.apply_cover_bytes(handle, bytes.to_vec()).await;
                        }

                        Message::Close(_) => {
                            debug!(player_id = %self.id, "WebSocket closed by remote");
                            return Ok(());
                        }

                        // Ping, Pong, raw frames
                        _ => {}
                    }
                }

                // Commands from the dispatcher
                outbound = outbound_rx.recv() => {
                    match outbound {
                        Some(Outbound::Frame(frame)) => {
                            ws_write.send(Message::Text(frame.clone().into())).await?;
                            trace!(player_id = %self.id, %frame, "Frame written");
                        }

                        Some(Outbound::Close(reason)) => {
                            debug!(player_id = %self.id, ?reason, "Close requested");
                            let code = match reason {
                                CloseReason::Shutdown => CloseCode::Away,
                                CloseReason::Stale => CloseCode::Normal,
                            };
                            send_close(ws_write, code, reason.as_str()).await;
                            return Ok(());
                        }

                        None => return Ok(()),
                    }
                }
            }
        }
    }

    /// Handles one decoded frame. Returns `false` once the session should
    /// close.
    async fn handle_frame(&self, handle: &Arc<SessionHandle>, frame: Result<ParsedMessage>) -> bool {
        let message = match frame {
            Ok(message) => message,
            Err(e) => {
                let count = handle.record_decode_error();
                warn!(player_id = %self.id, error = %e, count, "Malformed frame dropped");
                return count <= self.ctx.max_decode_errors;
            }
        };

        match message {
            ParsedMessage::Field(FieldUpdate::Cover(value)) if value.starts_with("data:") => {
                let covers = self.ctx.covers.clone();
                let id = self.id;
                let stored =
                    tokio::task::spawn_blocking(move || covers.store_data_url(id, &value)).await;
                match flatten(stored) {
                    Ok(Some(url)) => self.apply_field(handle, &FieldUpdate::Cover(url)),
                    Ok(None) => debug!(player_id = %self.id, "Unsupported inline cover ignored"),
                    Err(e) => warn!(player_id = %self.id, error = %e, "Inline cover dropped"),
                }
            }

            ParsedMessage::Field(update) => self.apply_field(handle, &update),

            ParsedMessage::EventResult { event_id, result } => {
                self.ctx.results.settle(event_id, result);
            }

            ParsedMessage::Ping => trace!(player_id = %self.id, "Ping"),

            ParsedMessage::Hello { adapter_version } => {
                debug!(player_id = %self.id, %adapter_version, "Repeated handshake ignored");
            }

            ParsedMessage::Unknown { tag } => {
                debug!(player_id = %self.id, %tag, "Unknown tag ignored");
            }
        }

        true
    }

    fn apply_field(&self, handle: &SessionHandle, update: &FieldUpdate) {
        if handle.apply_field(update, unix_millis()) == Applied::Changed {
            self.ctx.registry.notify_updated(handle);
        }
    }

    /// Stores binary cover artwork and points `cover` at it.
    async fn apply_cover_bytes(&self, handle: &SessionHandle, bytes: Vec<u8>) {
        let covers = self.ctx.covers.clone();
        let id = self.id;
        let stored = tokio::task::spawn_blocking(move || covers.store_bytes(id, &bytes)).await;

        match flatten(stored) {
            Ok(url) => self.apply_field(handle, &FieldUpdate::Cover(url)),
            Err(e) => warn!(player_id = %self.id, error = %e, "Binary cover dropped"),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn flatten<T>(joined: std::result::Result<Result<T>, tokio::task::JoinError>) -> Result<T> {
    joined.map_err(|e| Error::Io(IoError::other(e)))?
}

/// Sends a close frame. Failures are ignored; the socket is going away.
async fn send_close(ws_write: &mut WsWrite, code: CloseCode, reason: &str) {
    let mut end = reason.len().min(MAX_CLOSE_REASON);
    while !reason.is_char_boundary(end) {
        end -= 1;
    }

    let frame = CloseFrame {
        code,
        reason: reason[..end].to_string().into(),
    };
    if let Err(e) = ws_write.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "Failed to send close frame");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_reason_strings() {
        assert_eq!(CloseReason::Shutdown.as_str(), "server shutting down");
        assert_eq!(CloseReason::Stale.as_str(), "liveness timeout");
    }

    #[test]
    fn test_flatten_join_error_paths() {
        let ok: std::result::Result<Result<u8>, tokio::task::JoinError> = Ok(Ok(3));
        assert_eq!(flatten(ok).expect("ok"), 3);

        let inner: std::result::Result<Result<u8>, tokio::task::JoinError> =
            Ok(Err(Error::ConnectionClosed));
        assert!(matches!(flatten(inner), Err(Error::ConnectionClosed)));
    }
}
