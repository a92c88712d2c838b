//! Active-player selection.
//!
//! Among registered players the one with the most recent `active_at` wins;
//! equal timestamps go to the higher id, i.e. the most recent connection.
//! A player that has sat in `Stopped` for longer than the grace window is
//! not a candidate at all.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::identifiers::PlayerId;
use crate::player::PlaybackState;

// ============================================================================
// Constants
// ============================================================================

/// Default time a stopped player stays eligible.
pub const DEFAULT_STOPPED_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// Candidate
// ============================================================================

/// The fields of a player that active selection looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Player id.
    pub id: PlayerId,
    /// Last playback activity, ms since the unix epoch.
    pub active_at: u64,
    /// Current playback state.
    pub state: PlaybackState,
    /// When the player entered `Stopped`, if it is stopped.
    pub stopped_since: Option<u64>,
}

// ============================================================================
// ActivePolicy
// ============================================================================

/// Configurable active-player policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePolicy {
    /// How long a stopped player remains eligible.
    pub stopped_grace: Duration,
}

impl Default for ActivePolicy {
    fn default() -> Self {
        Self {
            stopped_grace: DEFAULT_STOPPED_GRACE,
        }
    }
}

impl ActivePolicy {
    /// Creates a policy with the given grace window.
    #[inline]
    #[must_use]
    pub const fn new(stopped_grace: Duration) -> Self {
        Self { stopped_grace }
    }

    /// Returns `true` if the candidate may be selected at `now_ms`.
    #[must_use]
    pub fn is_eligible(&self, candidate: &Candidate, now_ms: u64) -> bool {
        if candidate.state != PlaybackState::Stopped {
            return true;
        }
        let grace_ms = u64::try_from(self.stopped_grace.as_millis()).unwrap_or(u64::MAX);
        match candidate.stopped_since {
            Some(since) => now_ms.saturating_sub(since) <= grace_ms,
            None => true,
        }
    }

    /// Picks the active player.
    #[must_use]
    pub fn select(
        &self,
        candidates: impl IntoIterator<Item = Candidate>,
        now_ms: u64,
    ) -> Option<PlayerId> {
        candidates
            .into_iter()
            .filter(|candidate| self.is_eligible(candidate, now_ms))
            .max_by_key(|candidate| (candidate.active_at, candidate.id))
            .map(|candidate| candidate.id)
    }
}

// ============================================================================
// Tests
// ============================================================================
