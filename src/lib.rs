//! WebNowPlaying - local media-control server for browser players.
//!
//! Browser extensions (YouTube, Spotify Web, SoundCloud, ...) connect to a
//! local WebSocket server and stream their player state as line-oriented
//! frames. Native applications query that state and send control commands
//! back through this crate.
//!
//! # Architecture
//!
//! The server follows a hub model:
//!
//! - **Extension (remote)**: one WebSocket per player, pushes field updates
//! - **Server (local)**: keeps one live state per player, routes commands
//!
//! Key design principles:
//!
//! - Each session task owns its socket; writes are serialized by its loop
//! - Callers only ever see [`PlayerSnapshot`] copies, never live state
//! - Commands are validated before they touch the wire and are
//!   fire-and-forget; the extension echoes the resulting state
//! - One owned [`Server`] per listener, no process-wide global
//!
//! # Quick Start
//!
//! ```no_run
//! use webnowplaying::{Result, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = Server::builder()
//!         .on_event(|event| println!("{event:?}"))
//!         .build()?;
//!
//!     server.start(8974, "1.0.0").await?;
//!
//!     if let Ok(player) = server.active_player(false) {
//!         println!("{} - {}", player.artist, player.title);
//!         server.try_play_pause(player.id)?;
//!     }
//!
//!     server.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dispatch`] | Command validation and routing |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`player`] | Player state model and snapshots |
//! | [`protocol`] | Wire codec and message types |
//! | [`registry`] | Connected players and active selection |
//! | [`server`] | [`Server`] lifecycle and native-facing API |
//! | [`transport`] | WebSocket listener and sessions (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Command validation and routing.
///
/// Capability and range checks happen here, before anything is written.
pub mod dispatch;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for players and command events.
pub mod identifiers;

/// Player state model.
///
/// - [`PlayerSnapshot`] - Immutable copy handed to callers
/// - [`PlayerState`] - Live state and merge rule
pub mod player;

/// Media-control wire protocol.
pub mod protocol;

/// Registry of connected players.
pub mod registry;

/// Server lifecycle and native-facing API.
///
/// Use [`Server::builder()`] to create a configured server instance.
pub mod server;

/// WebSocket transport layer.
///
/// Internal module handling the listener and per-connection sessions.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Server types
pub use server::{Server, ServerBuilder, ServerConfig};

// Player types
pub use player::{
    Capabilities, Capability, PlaybackState, PlayerSnapshot, PlayerState, RatingSystem, Repeat,
    RepeatSet, format_seconds,
};

// Protocol types
pub use protocol::{Command, CommandTag, EventResult};

// Registry types
pub use registry::{ActivePolicy, EventHandler, PlayerEvent};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{EventId, PlayerId};
