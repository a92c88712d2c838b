//! Shared handle to one registered session.
//!
//! The session task owns the socket. Everything else (registry queries, the
//! dispatcher, the liveness sweep) reaches the session through this handle:
//! state reads go through its lock, writes go through its outbound channel
//! and are performed by the session loop one at a time.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::identifiers::PlayerId;
use crate::player::{Applied, PlayerSnapshot, PlayerState};
use crate::protocol::{FieldUpdate, ParsedMessage};

use super::active::Candidate;

// ============================================================================
// Types
// ============================================================================

/// Why the server is closing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The server is stopping.
    Shutdown,
    /// Nothing was received within the liveness timeout.
    Stale,
}

impl CloseReason {
    /// Human readable reason sent in the close frame.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shutdown => "server shutting down",
            Self::Stale => "liveness timeout",
        }
    }
}

/// Work for the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Write one encoded frame.
    Frame(String),
    /// Close the socket and end the session.
    Close(CloseReason),
}

// ============================================================================
// SessionHandle
// ============================================================================

/// Registry-side view of a live session.
#[derive(Debug)]
pub struct SessionHandle {
    id: PlayerId,
    state: Mutex<PlayerState>,
    outbound: mpsc::UnboundedSender<Outbound>,
    last_seen: Mutex<Instant>,
    decode_errors: AtomicU32,
}

impl SessionHandle {
    /// Creates a handle and the receiver the session loop drains.
    #[must_use]
    pub fn new(id: PlayerId, now_ms: u64) -> (Arc<Self>, mpsc::UnboundedReceiver<Outbound>) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let handle = Arc::new(Self {
            id,
            state: Mutex::new(PlayerState::new(id, now_ms)),
            outbound,
            last_seen: Mutex::new(Instant::now()),
            decode_errors: AtomicU32::new(0),
        });
        (handle, outbound_rx)
    }

    /// Returns the player id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Returns a copy of the player's state.
    #[must_use]
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.state.lock().snapshot()
    }

    /// Returns the fields active selection needs.
    #[must_use]
    pub fn candidate(&self) -> Candidate {
        let state = self.state.lock();
        let current = state.current();
        Candidate {
            id: self.id,
            active_at: current.active_at,
            state: current.state,
            stopped_since: state.stopped_since(),
        }
    }

    /// Folds a decoded message into the player state.
    pub fn apply(&self, message: &ParsedMessage, now_ms: u64) -> Applied {
        self.state.lock().apply(message, now_ms)
    }

    /// Folds one field update into the player state.
    pub fn apply_field(&self, update: &FieldUpdate, now_ms: u64) -> Applied {
        self.state.lock().apply_field(update, now_ms)
    }

    /// Queues an encoded frame for the session loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the session loop has ended.
    pub fn send_frame(&self, frame: String) -> Result<()> {
        self.outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Asks the session loop to close the socket.
    pub fn close(&self, reason: CloseReason) {
        let _ = self.outbound.send(Outbound::Close(reason));
    }

    /// Returns `true` once the session loop has dropped its receiver.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// Records that a frame arrived.
    pub fn touch(&self, now: Instant) {
        *self.last_seen.lock() = now;
    }

    /// Returns when the last frame arrived.
    #[must_use]
    pub fn last_seen(&self) -> Instant {
        *self.last_seen.lock()
    }

    /// Counts one malformed frame and returns the running total.
    pub fn record_decode_error(&self) -> u32 {
        self.decode_errors.fetch_add(1, Ordering::Relaxed) + 1
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::player::PlaybackState;

    #[test]
    fn test_frames_reach_receiver_in_order() {
        let (handle, mut rx) = SessionHandle::new(PlayerId::next(), 0);
        handle.send_frame("SKIP_NEXT 1".into()).expect("send");
        handle.close(CloseReason::Stale);

        assert_eq!(rx.try_recv().ok(), Some(Outbound::Frame("SKIP_NEXT 1".into())));
        assert_eq!(rx.try_recv().ok(), Some(Outbound::Close(CloseReason::Stale)));
    }

    #[test]
    fn test_send_after_loop_ended() {
        let (handle, rx) = SessionHandle::new(PlayerId::next(), 0);
        drop(rx);
        assert!(handle.is_closed());
        assert!(matches!(
            handle.send_frame("SKIP_NEXT 1".into()),
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_candidate_reflects_state() {
        let (handle, _rx) = SessionHandle::new(PlayerId::next(), 100);
        handle.apply_field(&FieldUpdate::State(PlaybackState::Playing), 200);

        let candidate = handle.candidate();
        assert_eq!(candidate.state, PlaybackState::Playing);
        assert_eq!(candidate.active_at, 200);
        assert_eq!(candidate.stopped_since, None);
    }

    #[test]
    fn test_decode_error_counter() {
        let (handle, _rx) = SessionHandle::new(PlayerId::next(), 0);
        assert_eq!(handle.record_decode_error(), 1);
        assert_eq!(handle.record_decode_error(), 2);
    }
}
