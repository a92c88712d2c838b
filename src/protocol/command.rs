//! Control commands sent from the server to an extension.
//!
//! # Commands
//!
//! | Tag | Payload | Gated by |
//! |-----|---------|----------|
//! | `SET_STATE` | state | `can_set_state` |
//! | `SKIP_PREVIOUS` | - | `can_skip_previous` |
//! | `SKIP_NEXT` | - | `can_skip_next` |
//! | `SET_POSITION` | seconds | `can_set_position` |
//! | `SET_VOLUME` | 0 to 100 | `can_set_volume` |
//! | `SET_RATING` | 0 to 5 | `can_set_rating` |
//! | `SET_REPEAT` | repeat mode | `can_set_repeat` |
//! | `TOGGLE_REPEAT` | next repeat mode | `can_set_repeat` |
//! | `SET_SHUFFLE` | bool | `can_set_shuffle` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::identifiers::EventId;
use crate::player::{Capability, PlaybackState, Repeat};

// ============================================================================
// CommandTag
// ============================================================================

/// Wire tag of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandTag {
    /// `SET_STATE`
    SetState,
    /// `SKIP_PREVIOUS`
    SkipPrevious,
    /// `SKIP_NEXT`
    SkipNext,
    /// `SET_POSITION`
    SetPosition,
    /// `SET_VOLUME`
    SetVolume,
    /// `SET_RATING`
    SetRating,
    /// `SET_REPEAT`
    SetRepeat,
    /// `TOGGLE_REPEAT`
    ToggleRepeat,
    /// `SET_SHUFFLE`
    SetShuffle,
}

impl CommandTag {
    /// Returns the wire spelling.
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::SetState => "SET_STATE",
            Self::SkipPrevious => "SKIP_PREVIOUS",
            Self::SkipNext => "SKIP_NEXT",
            Self::SetPosition => "SET_POSITION",
            Self::SetVolume => "SET_VOLUME",
            Self::SetRating => "SET_RATING",
            Self::SetRepeat => "SET_REPEAT",
            Self::ToggleRepeat => "TOGGLE_REPEAT",
            Self::SetShuffle => "SET_SHUFFLE",
        }
    }

    /// Returns the capability flag that must be set for this command.
    #[must_use]
    pub const fn capability(self) -> Capability {
        match self {
            Self::SetState => Capability::SetState,
            Self::SkipPrevious => Capability::SkipPrevious,
            Self::SkipNext => Capability::SkipNext,
            Self::SetPosition => Capability::SetPosition,
            Self::SetVolume => Capability::SetVolume,
            Self::SetRating => Capability::SetRating,
            Self::SetRepeat | Self::ToggleRepeat => Capability::SetRepeat,
            Self::SetShuffle => Capability::SetShuffle,
        }
    }
}

impl fmt::Display for CommandTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

// ============================================================================
// Command
// ============================================================================

/// A control request from a native caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Set the playback state.
    SetState(PlaybackState),
    /// Go to the previous track.
    SkipPrevious,
    /// Go to the next track.
    SkipNext,
    /// Seek to an absolute position in seconds.
    SetPosition(f64),
    /// Set the volume, 0 to 100.
    SetVolume(f64),
    /// Set the rating, 0 to 5.
    SetRating(f64),
    /// Set a specific repeat mode.
    SetRepeat(Repeat),
    /// Advance to the next supported repeat mode.
    ToggleRepeat,
    /// Enable or disable shuffle.
    SetShuffle(bool),
}

impl Command {
    /// Returns the wire tag of this command.
    #[must_use]
    pub const fn tag(&self) -> CommandTag {
        match self {
            Self::SetState(_) => CommandTag::SetState,
            Self::SkipPrevious => CommandTag::SkipPrevious,
            Self::SkipNext => CommandTag::SkipNext,
            Self::SetPosition(_) => CommandTag::SetPosition,
            Self::SetVolume(_) => CommandTag::SetVolume,
            Self::SetRating(_) => CommandTag::SetRating,
            Self::SetRepeat(_) => CommandTag::SetRepeat,
            Self::ToggleRepeat => CommandTag::ToggleRepeat,
            Self::SetShuffle(_) => CommandTag::SetShuffle,
        }
    }
}

// ============================================================================
// CommandFrame
// ============================================================================

/// Value carried by an outbound command frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    /// No value.
    Empty,
    /// A playback state.
    State(PlaybackState),
    /// A number (seconds, volume, rating).
    Number(f64),
    /// A repeat mode.
    Repeat(Repeat),
    /// A flag.
    Bool(bool),
}

/// A validated command ready for the wire.
///
/// Only the dispatcher builds these, after capability and range checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandFrame {
    /// Correlation id for `EVENT_RESULT`.
    pub event_id: EventId,
    /// Command tag.
    pub tag: CommandTag,
    /// Command value.
    pub payload: Payload,
}

impl CommandFrame {
    /// Creates a command frame.
    #[inline]
    #[must_use]
    pub const fn new(event_id: EventId, tag: CommandTag, payload: Payload) -> Self {
        Self {
            event_id,
            tag,
            payload,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
