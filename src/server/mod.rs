//! Server lifecycle and the native-facing API.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent [`ServerBuilder`] |
//! | `config` | [`ServerConfig`] and defaults |
//! | `core` | [`Server`] instance |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent server builder.
pub mod builder;

/// Server configuration.
pub mod config;

/// Server instance.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ServerBuilder;
pub use config::{
    DEFAULT_BIND_IP, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_LIVENESS_TIMEOUT,
    DEFAULT_MAX_DECODE_ERRORS, DEFAULT_SWEEP_INTERVAL, ServerConfig,
};
pub use self::core::Server;
