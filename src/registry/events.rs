//! Player lifecycle notifications.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::player::PlayerSnapshot;

// ============================================================================
// Types
// ============================================================================

/// Notification callback.
///
/// Called on the session task that caused the change, after every registry
/// lock has been released. Keep it short; it blocks that session's loop.
pub type EventHandler = Arc<dyn Fn(PlayerEvent) + Send + Sync>;

// ============================================================================
// PlayerEvent
// ============================================================================

/// Change in the set of players or in one player's state.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// A session completed its handshake and was registered.
    Added(PlayerSnapshot),
    /// A registered player's state changed.
    Updated(PlayerSnapshot),
    /// A session was removed. Carries its final state.
    Removed(PlayerSnapshot),
    /// The active player changed. `None` when no player qualifies.
    ActivePlayerChanged(Option<PlayerSnapshot>),
}

impl PlayerEvent {
    /// Returns the snapshot carried by this event, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<&PlayerSnapshot> {
        match self {
            Self::Added(snapshot) | Self::Updated(snapshot) | Self::Removed(snapshot) => {
                Some(snapshot)
            }
            Self::ActivePlayerChanged(snapshot) => snapshot.as_ref(),
        }
    }
}
