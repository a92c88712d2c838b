//! Immutable player snapshots handed to callers.
//!
//! A [`PlayerSnapshot`] is a copy taken under the session's lock. Mutating a
//! snapshot never touches live state.

// ============================================================================
// Imports
// ============================================================================

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identifiers::PlayerId;

use super::model::{Capabilities, PlaybackState, RatingSystem, Repeat, RepeatSet};

// ============================================================================
// PlayerSnapshot
// ============================================================================

/// Copy of one player's metadata and playback state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Session id. [`PlayerId::PLACEHOLDER`] for the placeholder.
    pub id: PlayerId,
    /// Player name, e.g. `YouTube`.
    pub name: String,
    /// Track title.
    pub title: String,
    /// Track artist.
    pub artist: String,
    /// Track album.
    pub album: String,
    /// Cover location, usually a `file://` URL of a stored PNG.
    pub cover: String,
    /// Where the cover came from (`https://`, `file://`, `data:image/...`).
    pub cover_src: String,
    /// Playback state.
    pub state: PlaybackState,
    /// Position in seconds.
    pub position: f64,
    /// Duration in seconds, 0 when unknown.
    pub duration: f64,
    /// Volume, 0 to 100.
    pub volume: f64,
    /// Rating, interpreted through `rating_system`.
    pub rating: f64,
    /// Rating interpretation.
    pub rating_system: RatingSystem,
    /// Repeat mode.
    pub repeat: Repeat,
    /// Shuffle enabled.
    pub shuffle: bool,
    /// Repeat modes the player supports.
    pub available_repeat: RepeatSet,
    /// Advertised controls.
    #[serde(flatten)]
    pub capabilities: Capabilities,
    /// Registration time, ms since the unix epoch.
    pub created_at: u64,
    /// Last accepted state change, ms since the unix epoch.
    pub updated_at: u64,
    /// Last playback activity, ms since the unix epoch.
    pub active_at: u64,
    /// Session is sourced from a native desktop player.
    pub is_desktop_player: bool,
}

impl PlayerSnapshot {
    /// Snapshot of a freshly connected player before any field arrives.
    #[must_use]
    pub fn new(id: PlayerId, now_ms: u64) -> Self {
        Self {
            id,
            name: String::new(),
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            cover: String::new(),
            cover_src: String::new(),
            state: PlaybackState::Stopped,
            position: 0.0,
            duration: 0.0,
            volume: 100.0,
            rating: 0.0,
            rating_system: RatingSystem::None,
            repeat: Repeat::None,
            shuffle: false,
            available_repeat: RepeatSet::EMPTY,
            capabilities: Capabilities::NONE,
            created_at: now_ms,
            updated_at: now_ms,
            active_at: 0,
            is_desktop_player: false,
        }
    }

    /// Placeholder returned instead of "not found" under
    /// `always_return_player`.
    ///
    /// All capability flags are false, so any command against it is refused.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            name: "default".to_string(),
            available_repeat: RepeatSet::EMPTY.with(Repeat::None),
            created_at: 0,
            updated_at: 0,
            ..Self::new(PlayerId::PLACEHOLDER, 0)
        }
    }

    /// Returns `true` for the placeholder.
    #[inline]
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.id.is_placeholder()
    }

    /// Position as a percentage of duration, 100 when duration is unknown.
    #[must_use]
    pub fn position_percent(&self) -> f64 {
        if self.duration <= 0.0 {
            return 100.0;
        }
        self.position / self.duration * 100.0
    }

    /// Seconds left in the current track.
    #[must_use]
    pub fn remaining_seconds(&self) -> f64 {
        (self.duration - self.position).max(0.0)
    }

    /// Serializes the snapshot to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Time Helpers
// ============================================================================

/// Current time in milliseconds since the unix epoch.
#[must_use]
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Formats seconds as `m:ss` or `h:mm:ss`.
///
/// With `pad_with_zeroes` the leading unit gets two digits too.
///
/// ```
/// use webnowplaying::player::format_seconds;
///
/// assert_eq!(format_seconds(69, false), "1:09");
/// assert_eq!(format_seconds(69, true), "01:09");
/// assert_eq!(format_seconds(6969, false), "1:56:09");
/// ```
#[must_use]
pub fn format_seconds(seconds: u64, pad_with_zeroes: bool) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    match (hours >= 1, pad_with_zeroes) {
        (true, true) => format!("{hours:02}:{minutes:02}:{secs:02}"),
        (true, false) => format!("{hours}:{minutes:02}:{secs:02}"),
        (false, true) => format!("{minutes:02}:{secs:02}"),
        (false, false) => format!("{minutes}:{secs:02}"),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_has_no_capabilities() {
        let placeholder = PlayerSnapshot::placeholder();
        assert!(placeholder.is_placeholder());
        assert!(placeholder.capabilities.is_empty());
        assert_eq!(placeholder.name, "default");
        assert_eq!(placeholder.state, PlaybackState::Stopped);
        assert_eq!(placeholder.volume, 100.0);
    }

    #[test]
    fn test_position_helpers() {
        let mut snapshot = PlayerSnapshot::new(PlayerId::next(), 0);
        assert_eq!(snapshot.position_percent(), 100.0);

        snapshot.duration = 100.0;
        snapshot.position = 10.0;
        assert_eq!(snapshot.position_percent(), 10.0);
        assert_eq!(snapshot.remaining_seconds(), 90.0);
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(500, false), "8:20");
        assert_eq!(format_seconds(500, true), "08:20");
        assert_eq!(format_seconds(10, false), "0:10");
        assert_eq!(format_seconds(10, true), "00:10");
        assert_eq!(format_seconds(30000, false), "8:20:00");
        assert_eq!(format_seconds(30000, true), "08:20:00");
    }

    #[test]
    fn test_json_flattens_capabilities() {
        let mut snapshot = PlayerSnapshot::new(PlayerId::next(), 5);
        snapshot.capabilities.can_skip_next = true;
        snapshot.state = PlaybackState::Playing;

        let json: serde_json::Value =
            serde_json::from_str(&snapshot.to_json().expect("serialize")).expect("parse");
        assert_eq!(json["can_skip_next"], true);
        assert_eq!(json["state"], "playing");
        assert_eq!(json["created_at"], 5);
    }
}
