//! Error types for WebNowPlaying.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use webnowplaying::{Result, Server};
//!
//! fn pause(server: &Server) -> Result<()> {
//!     let player = server.active_player(false)?;
//!     server.try_set_state(player.id, PlaybackState::Paused)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Startup | [`Error::AlreadyStarted`], [`Error::PortInUse`] |
//! | Protocol | [`Error::Decode`], [`Error::ProtocolVersion`], [`Error::HandshakeTimeout`] |
//! | Dispatch | [`Error::NoSuchPlayer`], [`Error::Unsupported`], [`Error::InvalidValue`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`] |
//! | External | [`Error::Io`], [`Error::WebSocket`], [`Error::Image`], [`Error::Base64`], [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::{Error as IoError, ErrorKind};
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::PlayerId;
use crate::protocol::CommandTag;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when server configuration or start arguments are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Startup Errors
    // ========================================================================
    /// The server is already running.
    ///
    /// Returned by `start` without an intervening `stop`.
    #[error("Server already started")]
    AlreadyStarted,

    /// The listening port is taken by another process or server.
    #[error("Port {port} is already in use")]
    PortInUse {
        /// The port that could not be bound.
        port: u16,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed frame from the extension.
    ///
    /// The frame is dropped; the session survives unless the per-session
    /// threshold is exceeded.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of what failed to decode.
        message: String,
    },

    /// Handshake carried an incompatible adapter version.
    #[error("Protocol version mismatch: expected {expected}, received {received}")]
    ProtocolVersion {
        /// Version configured on the server.
        expected: String,
        /// Version declared by the extension.
        received: String,
    },

    /// Extension did not identify itself in time.
    #[error("Handshake timeout after {timeout_ms}ms")]
    HandshakeTimeout {
        /// Milliseconds waited before giving up.
        timeout_ms: u64,
    },

    // ========================================================================
    // Dispatch Errors
    // ========================================================================
    /// No active player with this id.
    #[error("No such player: {player_id}")]
    NoSuchPlayer {
        /// The missing player id.
        player_id: PlayerId,
    },

    /// The player does not advertise the capability gating this command.
    #[error("Player {player_id} does not support {command}")]
    Unsupported {
        /// Target player.
        player_id: PlayerId,
        /// The rejected command.
        command: CommandTag,
    },

    /// Command payload outside its allowed range.
    #[error("Invalid value for {command}: {message}")]
    InvalidValue {
        /// The rejected command.
        command: CommandTag,
        /// Description of the constraint violated.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// WebSocket connection closed.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Cover image error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Base64 cover payload error.
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a port in use error.
    #[inline]
    pub fn port_in_use(port: u16) -> Self {
        Self::PortInUse { port }
    }

    /// Creates a bind error, mapping `AddrInUse` to [`Error::PortInUse`].
    #[inline]
    pub fn bind(port: u16, err: IoError) -> Self {
        if err.kind() == ErrorKind::AddrInUse {
            Self::port_in_use(port)
        } else {
            Self::Io(err)
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a protocol version mismatch error.
    #[inline]
    pub fn protocol_version(expected: impl Into<String>, received: impl Into<String>) -> Self {
        Self::ProtocolVersion {
            expected: expected.into(),
            received: received.into(),
        }
    }

    /// Creates a handshake timeout error.
    #[inline]
    pub fn handshake_timeout(timeout_ms: u64) -> Self {
        Self::HandshakeTimeout { timeout_ms }
    }

    /// Creates a no such player error.
    #[inline]
    pub fn no_such_player(player_id: PlayerId) -> Self {
        Self::NoSuchPlayer { player_id }
    }

    /// Creates an unsupported command error.
    #[inline]
    pub fn unsupported(player_id: PlayerId, command: CommandTag) -> Self {
        Self::Unsupported { player_id, command }
    }

    /// Creates an invalid value error.
    #[inline]
    pub fn invalid_value(command: CommandTag, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            command,
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a dispatch rejection.
    ///
    /// Rejections never put a frame on the wire.
    #[inline]
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NoSuchPlayer { .. } | Self::Unsupported { .. } | Self::InvalidValue { .. }
        )
    }

    /// Returns `true` if this error came out of `start`.
    #[inline]
    #[must_use]
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyStarted | Self::PortInUse { .. } | Self::Config { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::HandshakeTimeout { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error should close the session that raised it.
    #[inline]
    #[must_use]
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(
            self,
            Self::ProtocolVersion { .. } | Self::HandshakeTimeout { .. }
        ) || self.is_connection_error()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::connection("upgrade failed");
        assert_eq!(err.to_string(), "Connection failed: upgrade failed");
    }

    #[test]
    fn test_protocol_version_display() {
        let err = Error::protocol_version("1.0.0", "2.0.0");
        assert_eq!(
            err.to_string(),
            "Protocol version mismatch: expected 1.0.0, received 2.0.0"
        );
    }

    #[test]
    fn test_is_rejection() {
        let id = PlayerId::new(3).unwrap();
        assert!(Error::no_such_player(id).is_rejection());
        assert!(Error::unsupported(id, CommandTag::SkipNext).is_rejection());
        assert!(Error::invalid_value(CommandTag::SetVolume, "150 > 100").is_rejection());
        assert!(!Error::AlreadyStarted.is_rejection());
    }

    #[test]
    fn test_is_startup_error() {
        assert!(Error::AlreadyStarted.is_startup_error());
        assert!(Error::port_in_use(8974).is_startup_error());
        assert!(!Error::ConnectionClosed.is_startup_error());
    }

    #[test]
    fn test_bind_maps_addr_in_use() {
        let err = Error::bind(8974, IoError::new(ErrorKind::AddrInUse, "taken"));
        assert!(matches!(err, Error::PortInUse { port: 8974 }));

        let err = Error::bind(8974, IoError::new(ErrorKind::PermissionDenied, "nope"));
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_fatal_for_session() {
        assert!(Error::protocol_version("1.0.0", "0.1.0").is_fatal_for_session());
        assert!(Error::ConnectionClosed.is_fatal_for_session());
        assert!(!Error::decode("bad").is_fatal_for_session());
    }
}
