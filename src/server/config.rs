//! Server configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use webnowplaying::ServerConfig;
//!
//! let config = ServerConfig::new()
//!     .with_liveness_timeout(Duration::from_secs(60))
//!     .with_stopped_grace(Duration::from_secs(10));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::registry::{DEFAULT_STOPPED_GRACE, EventHandler};

// ============================================================================
// Constants
// ============================================================================

/// Default bind address (localhost only).
pub const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Default silence after which a session is evicted.
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(30);

/// Default liveness sweep period.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Default deadline for upgrade plus `ADAPTER_VERSION`.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of malformed frames tolerated per session.
pub const DEFAULT_MAX_DECODE_ERRORS: u32 = 16;

// ============================================================================
// ServerConfig
// ============================================================================

/// Tunables for a [`crate::Server`].
#[derive(Clone)]
pub struct ServerConfig {
    /// Address the listener binds.
    pub bind_ip: IpAddr,

    /// Silence after which a session is evicted.
    pub liveness_timeout: Duration,

    /// How often the liveness sweep runs.
    pub sweep_interval: Duration,

    /// Deadline for upgrade plus `ADAPTER_VERSION`.
    pub handshake_timeout: Duration,

    /// How long a stopped player stays eligible as active player.
    pub stopped_grace: Duration,

    /// Malformed frames tolerated before a session is closed.
    pub max_decode_errors: u32,

    /// Directory cover files are written to.
    pub cover_dir: PathBuf,

    /// Player notification callback.
    pub event_handler: Option<EventHandler>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_ip", &self.bind_ip)
            .field("liveness_timeout", &self.liveness_timeout)
            .field("sweep_interval", &self.sweep_interval)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("stopped_grace", &self.stopped_grace)
            .field("max_decode_errors", &self.max_decode_errors)
            .field("cover_dir", &self.cover_dir)
            .field("event_handler", &self.event_handler.is_some())
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_ip: DEFAULT_BIND_IP,
            liveness_timeout: DEFAULT_LIVENESS_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            stopped_grace: DEFAULT_STOPPED_GRACE,
            max_decode_errors: DEFAULT_MAX_DECODE_ERRORS,
            cover_dir: std::env::temp_dir(),
            event_handler: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ServerConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bind address.
    #[inline]
    #[must_use]
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Sets the liveness timeout.
    #[inline]
    #[must_use]
    pub fn with_liveness_timeout(mut self, timeout: Duration) -> Self {
        self.liveness_timeout = timeout;
        self
    }

    /// Sets the liveness sweep period.
    #[inline]
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the handshake deadline.
    #[inline]
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the stopped-player grace window.
    #[inline]
    #[must_use]
    pub fn with_stopped_grace(mut self, grace: Duration) -> Self {
        self.stopped_grace = grace;
        self
    }

    /// Sets the malformed frame threshold.
    #[inline]
    #[must_use]
    pub fn with_max_decode_errors(mut self, max: u32) -> Self {
        self.max_decode_errors = max;
        self
    }

    /// Sets the cover directory.
    #[inline]
    #[must_use]
    pub fn with_cover_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cover_dir = dir.into();
        self
    }

    /// Sets the player notification callback.
    #[inline]
    #[must_use]
    pub fn with_event_handler(mut self, handler: EventHandler) -> Self {
        self.event_handler = Some(handler);
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ServerConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        if self.liveness_timeout.is_zero() {
            return Err("liveness timeout must be greater than zero".to_string());
        }
        if self.sweep_interval.is_zero() {
            return Err("sweep interval must be greater than zero".to_string());
        }
        if self.handshake_timeout.is_zero() {
            return Err("handshake timeout must be greater than zero".to_string());
        }
        if self.sweep_interval > self.liveness_timeout {
            return Err(format!(
                "sweep interval ({:?}) must not exceed liveness timeout ({:?})",
                self.sweep_interval, self.liveness_timeout
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
