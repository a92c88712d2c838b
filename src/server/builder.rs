//! Builder pattern for server configuration.
//!
//! Provides a fluent API for configuring and creating [`Server`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use webnowplaying::Server;
//!
//! # fn example() -> webnowplaying::Result<()> {
//! let server = Server::builder()
//!     .liveness_timeout(Duration::from_secs(60))
//!     .on_event(|event| println!("{event:?}"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::registry::PlayerEvent;

use super::config::ServerConfig;
use super::core::Server;

// ============================================================================
// ServerBuilder
// ============================================================================

/// Builder for configuring a [`Server`] instance.
///
/// Use [`Server::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct ServerBuilder {
    config: ServerConfig,
}

// ============================================================================
// ServerBuilder Implementation
// ============================================================================

impl ServerBuilder {
    /// Creates a builder with default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the bind address (default `127.0.0.1`).
    #[inline]
    #[must_use]
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.config.bind_ip = ip;
        self
    }

    /// Sets the silence after which a session is evicted.
    #[inline]
    #[must_use]
    pub fn liveness_timeout(mut self, timeout: Duration) -> Self {
        self.config.liveness_timeout = timeout;
        self
    }

    /// Sets how often the liveness sweep runs.
    #[inline]
    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Sets the handshake deadline.
    #[inline]
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Sets how long a stopped player stays eligible as active player.
    #[inline]
    #[must_use]
    pub fn stopped_grace(mut self, grace: Duration) -> Self {
        self.config.stopped_grace = grace;
        self
    }

    /// Sets the malformed frame threshold.
    #[inline]
    #[must_use]
    pub fn max_decode_errors(mut self, max: u32) -> Self {
        self.config.max_decode_errors = max;
        self
    }

    /// Sets the cover directory.
    #[inline]
    #[must_use]
    pub fn cover_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cover_dir = dir.into();
        self
    }

    /// Sets the player notification callback.
    #[inline]
    #[must_use]
    pub fn on_event(mut self, handler: impl Fn(PlayerEvent) + Send + Sync + 'static) -> Self {
        self.config.event_handler = Some(Arc::new(handler));
        self
    }

    /// Builds the server with validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a setting is invalid.
    pub fn build(self) -> Result<Server> {
        self.config.validate().map_err(Error::config)?;
        Ok(Server::new(self.config))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_builder_builds() {
        let server = ServerBuilder::new().build().expect("build");
        assert!(!server.is_started());
    }

    #[test]
    fn test_setters_reach_config() {
        let builder = ServerBuilder::new()
            .liveness_timeout(Duration::from_secs(45))
            .handshake_timeout(Duration::from_secs(2))
            .max_decode_errors(4);

        assert_eq!(builder.config.liveness_timeout, Duration::from_secs(45));
        assert_eq!(builder.config.handshake_timeout, Duration::from_secs(2));
        assert_eq!(builder.config.max_decode_errors, 4);
    }

    #[test]
    fn test_on_event_sets_handler() {
        let builder = ServerBuilder::new().on_event(|_| {});
        assert!(builder.config.event_handler.is_some());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = ServerBuilder::new()
            .sweep_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
