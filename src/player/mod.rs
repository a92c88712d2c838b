//! Player state model.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `model` | Playback enums, repeat sets, capability flags |
//! | `state` | Live state and the frame merge rule |
//! | `snapshot` | Immutable copies handed to callers |
//! | `cover` | Cover artwork files |

// ============================================================================
// Submodules
// ============================================================================

/// Cover artwork storage.
pub mod cover;

/// Playback enums and capability flags.
pub mod model;

/// Immutable snapshots and time helpers.
pub mod snapshot;

/// Live player state.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use cover::CoverStore;
pub use model::{
    Capabilities, Capability, PlaybackState, RatingSystem, Repeat, RepeatSet,
};
pub use snapshot::{PlayerSnapshot, format_seconds, unix_millis};
pub use state::{Applied, MAX_RATING, MAX_VOLUME, PlayerState};
