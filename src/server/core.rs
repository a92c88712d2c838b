//! The server instance native callers hold.
//!
//! A [`Server`] owns the registry, the dispatcher and, while started, the
//! listener. There is no process-wide global: construct one, pass it by
//! reference (or clone it; clones share state).
//!
//! # Example
//!
//! ```no_run
//! use webnowplaying::{PlaybackState, Server};
//!
//! # async fn example() -> webnowplaying::Result<()> {
//! let server = Server::builder().build()?;
//! server.start(8974, "1.0.0").await?;
//!
//! let player = server.active_player(false)?;
//! server.try_set_state(player.id, PlaybackState::Paused)?;
//!
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

use crate::dispatch::{DEFAULT_RESULT_TIMEOUT, Dispatcher, EventResults};
use crate::error::{Error, Result};
use crate::identifiers::{EventId, PlayerId};
use crate::player::{CoverStore, PlaybackState, PlayerSnapshot, Repeat};
use crate::protocol::{AdapterVersion, Command, EventResult};
use crate::registry::{ActivePolicy, PlayerEvent, Registry};
use crate::transport::{Listener, SessionContext, SweepSettings};

use super::builder::ServerBuilder;
use super::config::ServerConfig;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the server.
pub(crate) struct ServerInner {
    /// Configuration fixed at build time.
    pub config: ServerConfig,

    /// Registered players.
    pub registry: Arc<Registry>,

    /// Command validation and routing.
    pub dispatcher: Dispatcher,

    /// Listener while started. Also serializes `start` and `stop`.
    pub listener: AsyncMutex<Option<Listener>>,

    /// Mirrors `listener.is_some()` for synchronous readers.
    pub started: AtomicBool,

    /// Bound port while started.
    pub port: Mutex<Option<u16>>,
}

// ============================================================================
// Server
// ============================================================================

/// Local media-control server.
#[derive(Clone)]
pub struct Server {
    /// Shared inner state.
    pub(crate) inner: Arc<ServerInner>,
}

// ============================================================================
// Server - Display
// ============================================================================

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("started", &self.is_started())
            .field("port", &self.port())
            .field("players", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Server - Lifecycle
// ============================================================================

impl Server {
    /// Creates a configuration builder for the server.
    #[inline]
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Creates a stopped server from a validated configuration.
    pub(crate) fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(Registry::new(ActivePolicy::new(config.stopped_grace)));
        if let Some(handler) = config.event_handler.clone() {
            registry.set_event_handler(handler);
        }
        let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::new(EventResults::new()));

        Self {
            inner: Arc::new(ServerInner {
                config,
                registry,
                dispatcher,
                listener: AsyncMutex::new(None),
                started: AtomicBool::new(false),
                port: Mutex::new(None),
            }),
        }
    }

    /// Binds `port` and starts accepting extensions.
    ///
    /// `adapter_version` is announced to every extension and checked against
    /// the version each one declares. Port `0` picks a free port. Returns the
    /// bound port.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] if the server is running
    /// - [`Error::Config`] if `adapter_version` is not a semantic version
    /// - [`Error::PortInUse`] if the port is taken
    pub async fn start(&self, port: u16, adapter_version: &str) -> Result<u16> {
        let mut listener = self.inner.listener.lock().await;
        if listener.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let version = AdapterVersion::parse(adapter_version)?;
        let config = &self.inner.config;

        let ctx = Arc::new(SessionContext {
            registry: Arc::clone(&self.inner.registry),
            results: Arc::clone(self.inner.dispatcher.results()),
            covers: CoverStore::new(config.cover_dir.clone()),
            version,
            handshake_timeout: config.handshake_timeout,
            max_decode_errors: config.max_decode_errors,
        });
        let sweep = SweepSettings {
            interval: config.sweep_interval,
            liveness_timeout: config.liveness_timeout,
        };

        let bound = Listener::bind(config.bind_ip, port, ctx, sweep).await?;
        let actual_port = bound.port();

        *listener = Some(bound);
        *self.inner.port.lock() = Some(actual_port);
        self.inner.started.store(true, Ordering::SeqCst);

        info!(port = actual_port, %adapter_version, "Server started");
        Ok(actual_port)
    }

    /// Closes every session and releases the port.
    ///
    /// Returns once all session tasks have finished. Does nothing if the
    /// server is not running.
    pub async fn stop(&self) {
        let mut listener = self.inner.listener.lock().await;
        let Some(bound) = listener.take() else {
            return;
        };

        self.inner.started.store(false, Ordering::SeqCst);
        bound.shutdown().await;
        *self.inner.port.lock() = None;

        info!("Server stopped");
    }

    /// Returns `true` while the server is running.
    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Returns the bound port while running.
    #[inline]
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        *self.inner.port.lock()
    }

    /// Returns the WebSocket URL extensions connect to while running.
    #[must_use]
    pub fn ws_url(&self) -> Option<String> {
        let ip = self.inner.config.bind_ip;
        self.port().map(|port| format!("ws://{ip}:{port}"))
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }
}

// ============================================================================
// Server - Queries
// ============================================================================

impl Server {
    /// Returns a snapshot of player `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPlayer`] unless `always_return_player` is set,
    /// in which case a placeholder is returned instead.
    pub fn player(&self, id: PlayerId, always_return_player: bool) -> Result<PlayerSnapshot> {
        self.inner.registry.get_by_id(id, always_return_player)
    }

    /// Returns a snapshot of the active player.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSuchPlayer`] unless `always_return_player` is set,
    /// in which case a placeholder is returned instead.
    pub fn active_player(&self, always_return_player: bool) -> Result<PlayerSnapshot> {
        self.inner.registry.get_active(always_return_player)
    }

    /// Returns snapshots of every player, ascending by id.
    #[must_use]
    pub fn all_players(&self) -> Vec<PlayerSnapshot> {
        self.inner.registry.get_all()
    }

    /// Returns the number of registered players.
    #[inline]
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.inner.registry.len()
    }
}

// ============================================================================
// Server - Commands
// ============================================================================

impl Server {
    /// Sends `command` to player `id`.
    ///
    /// # Errors
    ///
    /// - [`Error::NoSuchPlayer`] if `id` is not registered
    /// - [`Error::Unsupported`] if the player lacks the capability
    /// - [`Error::InvalidValue`] if the value is out of range
    pub fn dispatch(&self, id: PlayerId, command: Command) -> Result<EventId> {
        self.inner.dispatcher.dispatch(id, command)
    }

    /// Sets the playback state.
    ///
    /// # Errors
    ///
    /// See [`Server::dispatch`].
    pub fn try_set_state(&self, id: PlayerId, state: PlaybackState) -> Result<EventId> {
        self.dispatch(id, Command::SetState(state))
    }

    /// Skips to the previous track.
    ///
    /// # Errors
    ///
    /// See [`Server::dispatch`].
    pub fn try_skip_previous(&self, id: PlayerId) -> Result<EventId> {
        self.dispatch(id, Command::SkipPrevious)
    }

    /// Skips to the next track.
    ///
    /// # Errors
    ///
    /// See [`Server::dispatch`].
    pub fn try_skip_next(&self, id: PlayerId) -> Result<EventId> {
        self.dispatch(id, Command::SkipNext)
    }

    /// Seeks to `seconds`.
    ///
    /// # Errors
    ///
    /// See [`Server::dispatch`].
    pub fn try_set_position(&self, id: PlayerId, seconds: f64) -> Result<EventId> {
        self.dispatch(id, Command::SetPosition(seconds))
    }

    /// Sets the volume, 0 to 100.
    ///
    /// # Errors
    ///
    /// See [`Server::dispatch`].
    pub fn try_set_volume(&self, id: PlayerId, volume: f64) -> Result<EventId> {
        self.dispatch(id, Command::SetVolume(volume))
    }

    /// Sets the rating, 0 to 5.
    ///
    /// # Errors
    ///
    /// See [`Server::dispatch`].
    pub fn try_set_rating(&self, id: PlayerId, rating: f64) -> Result<EventId> {
        self.dispatch(id, Command::SetRating(rating))
    }

    /// Sets a specific repeat mode.
    ///
    /// # Errors
    ///
    /// See [`Server::dispatch`].
    pub fn try_set_repeat(&self, id: PlayerId, repeat: Repeat) -> Result<EventId> {
        self.dispatch(id, Command::SetRepeat(repeat))
    }

    /// Moves to the next repeat mode the player supports.
    ///
    /// # Errors
    ///
    /// See [`Server::dispatch`].
    pub fn try_toggle_repeat(&self, id: PlayerId) -> Result<EventId> {
        self.dispatch(id, Command::ToggleRepeat)
    }

    /// Enables or disables shuffle.
    ///
    /// # Errors
    ///
    /// See [`Server::dispatch`].
    pub fn try_set_shuffle(&self, id: PlayerId, shuffle: bool) -> Result<EventId> {
        self.dispatch(id, Command::SetShuffle(shuffle))
    }

    /// Plays when paused or stopped, pauses when playing.
    ///
    /// # Errors
    ///
    /// See [`Server::dispatch`].
    pub fn try_play_pause(&self, id: PlayerId) -> Result<EventId> {
        self.inner.dispatcher.play_pause(id)
    }

    /// Seeks backwards by `seconds`.
    ///
    /// # Errors
    ///
    /// See [`Server::dispatch`].
    pub fn try_revert(&self, id: PlayerId, seconds: f64) -> Result<EventId> {
        self.inner.dispatcher.revert(id, seconds)
    }

    /// Seeks forwards by `seconds`.
    ///
    /// # Errors
    ///
    /// See [`Server::dispatch`].
    pub fn try_forward(&self, id: PlayerId, seconds: f64) -> Result<EventId> {
        self.inner.dispatcher.forward(id, seconds)
    }

    /// Seeks to `percent` of the track.
    ///
    /// # Errors
    ///
    /// See [`Server::dispatch`].
    pub fn try_set_position_percent(&self, id: PlayerId, percent: f64) -> Result<EventId> {
        self.inner.dispatcher.set_position_percent(id, percent)
    }

    /// Seeks backwards by `percent` of the track.
    ///
    /// # Errors
    ///
    /// See [`Server::dispatch`].
    pub fn try_revert_percent(&self, id: PlayerId, percent: f64) -> Result<EventId> {
        self.inner.dispatcher.revert_percent(id, percent)
    }

    /// Seeks forwards by `percent` of the track.
    ///
    /// # Errors
    ///
    /// See [`Server::dispatch`].
    pub fn try_forward_percent(&self, id: PlayerId, percent: f64) -> Result<EventId> {
        self.inner.dispatcher.forward_percent(id, percent)
    }
}

// ============================================================================
// Server - Event Results
// ============================================================================

impl Server {
    /// Returns what the extension reported for a command.
    ///
    /// `None` once the id has aged out of the table or was never issued.
    #[must_use]
    pub fn event_result(&self, id: EventId) -> Option<EventResult> {
        self.inner.dispatcher.results().get(id)
    }

    /// Waits up to one second for the extension to acknowledge a command.
    ///
    /// Returns [`EventResult::Failed`] if nothing arrives in time.
    pub async fn wait_for_event_result(&self, id: EventId) -> EventResult {
        self.inner
            .dispatcher
            .results()
            .wait(id, DEFAULT_RESULT_TIMEOUT)
            .await
    }
}

// ============================================================================
// Server - Event Handlers
// ============================================================================

impl Server {
    /// Sets the player notification callback, replacing any previous one.
    pub fn set_event_handler(&self, handler: impl Fn(PlayerEvent) + Send + Sync + 'static) {
        self.inner.registry.set_event_handler(Arc::new(handler));
    }

    /// Clears the player notification callback.
    pub fn clear_event_handler(&self) {
        self.inner.registry.clear_event_handler();
    }
}

// ============================================================================
// Tests
// ============================================================================
