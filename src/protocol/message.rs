//! Decoded inbound frames.
//!
//! A [`ParsedMessage`] is what the codec hands to a session for every line
//! the extension sends. Field updates are folded into the player state;
//! everything else drives the session state machine.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::EventId;
use crate::player::{Capability, PlaybackState, RatingSystem, Repeat, RepeatSet};

// ============================================================================
// ParsedMessage
// ============================================================================

/// One decoded frame from the extension.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedMessage {
    /// Identifying frame carrying the extension's adapter version.
    Hello {
        /// Declared version, unparsed.
        adapter_version: String,
    },

    /// A single player field.
    Field(FieldUpdate),

    /// Acknowledgement of a previously dispatched command.
    EventResult {
        /// The command's correlation id.
        event_id: EventId,
        /// Outcome reported by the extension.
        result: EventResult,
    },

    /// Keep-alive with no payload.
    Ping,

    /// Tag this server does not know. Ignored.
    Unknown {
        /// The unrecognized tag.
        tag: String,
    },
}

// ============================================================================
// FieldUpdate
// ============================================================================

/// New value for one player field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// `NAME`
    Name(String),
    /// `TITLE`
    Title(String),
    /// `ARTIST`
    Artist(String),
    /// `ALBUM`
    Album(String),
    /// `COVER`
    Cover(String),
    /// `COVER_SRC`
    CoverSrc(String),
    /// `STATE`
    State(PlaybackState),
    /// `POSITION`, seconds.
    Position(f64),
    /// `DURATION`, seconds.
    Duration(f64),
    /// `VOLUME`, 0 to 100.
    Volume(f64),
    /// `RATING`
    Rating(f64),
    /// `RATING_SYSTEM`
    RatingSystem(RatingSystem),
    /// `REPEAT`
    Repeat(Repeat),
    /// `SHUFFLE`
    Shuffle(bool),
    /// `AVAILABLE_REPEAT`
    AvailableRepeat(RepeatSet),
    /// One of the `CAN_*` flags.
    Capability(Capability, bool),
    /// `ACTIVE_AT`, milliseconds since the unix epoch.
    ActiveAt(u64),
    /// `IS_DESKTOP_PLAYER`
    IsDesktopPlayer(bool),
}

impl FieldUpdate {
    /// Returns the wire tag for this field.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Name(_) => "NAME",
            Self::Title(_) => "TITLE",
            Self::Artist(_) => "ARTIST",
            Self::Album(_) => "ALBUM",
            Self::Cover(_) => "COVER",
            Self::CoverSrc(_) => "COVER_SRC",
            Self::State(_) => "STATE",
            Self::Position(_) => "POSITION",
            Self::Duration(_) => "DURATION",
            Self::Volume(_) => "VOLUME",
            Self::Rating(_) => "RATING",
            Self::RatingSystem(_) => "RATING_SYSTEM",
            Self::Repeat(_) => "REPEAT",
            Self::Shuffle(_) => "SHUFFLE",
            Self::AvailableRepeat(_) => "AVAILABLE_REPEAT",
            Self::Capability(capability, _) => capability_tag(*capability),
            Self::ActiveAt(_) => "ACTIVE_AT",
            Self::IsDesktopPlayer(_) => "IS_DESKTOP_PLAYER",
        }
    }
}

/// Wire tag of a capability flag.
pub(crate) const fn capability_tag(capability: Capability) -> &'static str {
    match capability {
        Capability::SetState => "CAN_SET_STATE",
        Capability::SkipPrevious => "CAN_SKIP_PREVIOUS",
        Capability::SkipNext => "CAN_SKIP_NEXT",
        Capability::SetPosition => "CAN_SET_POSITION",
        Capability::SetVolume => "CAN_SET_VOLUME",
        Capability::SetRating => "CAN_SET_RATING",
        Capability::SetRepeat => "CAN_SET_REPEAT",
        Capability::SetShuffle => "CAN_SET_SHUFFLE",
    }
}

// ============================================================================
// EventResult
// ============================================================================

/// Outcome of a dispatched command as reported by the extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventResult {
    /// No acknowledgement yet.
    #[default]
    Pending,
    /// The extension applied the command.
    Succeeded,
    /// The extension could not apply the command, or nobody answered.
    Failed,
}

impl EventResult {
    /// Parses a wire value.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" | "0" => Some(Self::Pending),
            "SUCCEEDED" | "1" => Some(Self::Succeeded),
            "FAILED" | "2" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns `true` once the result is final.
    #[inline]
    #[must_use]
    pub const fn is_settled(self) -> bool {
        !matches!(self, Self::Pending)
    }
}
