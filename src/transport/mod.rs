//! WebSocket transport layer.
//!
//! Browser extensions connect to a local WebSocket server. Each connection
//! becomes a session task; the listener owns the socket and the task set.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Extension      │         WebSocket            │  Listener       │
//! │  (tab, app)     │◄────────────────────────────►│  → Session      │
//! │                 │      localhost:PORT          │  → Registry     │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Listener::bind` - Bind the configured port, spawn accept and sweep tasks
//! 2. Extension connects, the accept loop spawns a `Session`
//! 3. Server greets with `ADAPTER_VERSION` and `PROTOCOL_REVISION`
//! 4. Extension answers `ADAPTER_VERSION`, the session registers its player
//! 5. Field frames flow in, command frames flow out
//! 6. `Listener::shutdown` - Close every session, release the port
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `listener` | Bind, accept loop, liveness sweep |
//! | `session` | Per-connection state machine and I/O loop |

// ============================================================================
// Submodules
// ============================================================================

/// Bind, accept loop and liveness sweep.
pub(crate) mod listener;

/// Per-connection state machine and I/O loop.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub(crate) use listener::{Listener, SweepSettings};
pub use session::SessionPhase;
pub(crate) use session::SessionContext;
