//! Type-safe identifiers for players and command events.
//!
//! Newtype wrappers prevent mixing a player id with an event id at compile
//! time. Both are allocated from process-wide counters, so an id is never
//! reused while the process runs, even across server restarts.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// Counters
// ============================================================================

static NEXT_PLAYER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// PlayerId
// ============================================================================

/// Identifier of one connected player session.
///
/// Assigned at accept time, monotonically increasing. `0` is reserved for
/// [`PlayerId::PLACEHOLDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(u64);

impl PlayerId {
    /// Id carried by the placeholder snapshot returned under
    /// `always_return_player`.
    pub const PLACEHOLDER: Self = Self(0);

    /// Allocates the next player id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_PLAYER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a raw id, returning `None` for the reserved `0`.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Option<Self> {
        if id == 0 { None } else { Some(Self(id)) }
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` for the placeholder id.
    #[inline]
    #[must_use]
    pub const fn is_placeholder(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// EventId
// ============================================================================

/// Correlation id attached to every command frame sent to an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(u64);

impl EventId {
    /// Allocates the next event id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wraps a raw id received on the wire.
    #[inline]
    #[must_use]
    pub const fn from_u64(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
