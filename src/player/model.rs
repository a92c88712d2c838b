//! Discrete value types of the player model.
//!
//! Each enum knows its wire spelling, so the codec and the command encoder
//! share one table.
//!
//! | Type | Wire values |
//! |------|-------------|
//! | [`PlaybackState`] | `PLAYING`, `PAUSED`, `STOPPED` or `0`, `1`, `2` |
//! | [`Repeat`] | `NONE`, `ALL`, `ONE` (`TRACK`) or bits `1`, `2`, `4` |
//! | [`RatingSystem`] | `NONE`, `LIKE`, `LIKE_DISLIKE`, `SCALE` or `0..=3` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// PlaybackState
// ============================================================================

/// Playback state of a player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Media is playing.
    Playing,
    /// Media is paused.
    Paused,
    /// Nothing is loaded or playback ended.
    #[default]
    Stopped,
}

impl PlaybackState {
    /// Parses a wire value.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "PLAYING" | "0" => Some(Self::Playing),
            "PAUSED" | "1" => Some(Self::Paused),
            "STOPPED" | "2" => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Returns the wire spelling.
    #[inline]
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Playing => "PLAYING",
            Self::Paused => "PAUSED",
            Self::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

// ============================================================================
// Repeat
// ============================================================================

/// Repeat mode of a player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    /// No repeat.
    #[default]
    None,
    /// Repeat the whole queue.
    All,
    /// Repeat the current track.
    One,
}

impl Repeat {
    /// All modes in toggle order.
    pub const ALL_MODES: [Self; 3] = [Self::None, Self::All, Self::One];

    /// Parses a wire value.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "NONE" | "1" => Some(Self::None),
            "ALL" | "2" => Some(Self::All),
            "ONE" | "TRACK" | "4" => Some(Self::One),
            _ => None,
        }
    }

    /// Returns the wire spelling.
    #[inline]
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::All => "ALL",
            Self::One => "ONE",
        }
    }

    /// Returns the bit used in [`RepeatSet`].
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::None => 1 << 0,
            Self::All => 1 << 1,
            Self::One => 1 << 2,
        }
    }
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

// ============================================================================
// RepeatSet
// ============================================================================

/// Set of repeat modes a player supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepeatSet(u8);

impl RepeatSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Builds a set from the wire bitmask, ignoring unknown bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b111)
    }

    /// Returns the bitmask.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if `mode` is in the set.
    #[inline]
    #[must_use]
    pub const fn contains(self, mode: Repeat) -> bool {
        self.0 & mode.bit() != 0
    }

    /// Returns the set with `mode` added.
    #[inline]
    #[must_use]
    pub const fn with(self, mode: Repeat) -> Self {
        Self(self.0 | mode.bit())
    }

    /// Iterates the modes in toggle order.
    pub fn iter(self) -> impl Iterator<Item = Repeat> {
        Repeat::ALL_MODES
            .into_iter()
            .filter(move |mode| self.contains(*mode))
    }

    /// Returns the mode a repeat toggle moves to from `current`.
    ///
    /// Cycles NONE → ALL → ONE → NONE, skipping unsupported modes. `None` when
    /// no other supported mode exists.
    #[must_use]
    pub fn next_after(self, current: Repeat) -> Option<Repeat> {
        let order = match current {
            Repeat::None => [Repeat::All, Repeat::One],
            Repeat::All => [Repeat::One, Repeat::None],
            Repeat::One => [Repeat::None, Repeat::All],
        };
        order.into_iter().find(|mode| self.contains(*mode))
    }
}

impl FromIterator<Repeat> for RepeatSet {
    fn from_iter<I: IntoIterator<Item = Repeat>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

// ============================================================================
// RatingSystem
// ============================================================================

/// How a player's `rating` value is interpreted.
///
/// For `Like` and `LikeDislike`: 0 unrated, 1 disliked, 5 liked. For `Scale`
/// the rating is a star count from 0 to 5.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingSystem {
    /// Player has no rating.
    #[default]
    None,
    /// Like only.
    Like,
    /// Like and dislike.
    LikeDislike,
    /// Star scale.
    Scale,
}

impl RatingSystem {
    /// Parses a wire value.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "NONE" | "0" => Some(Self::None),
            "LIKE" | "1" => Some(Self::Like),
            "LIKE_DISLIKE" | "2" => Some(Self::LikeDislike),
            "SCALE" | "3" => Some(Self::Scale),
            _ => None,
        }
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Controls a player currently advertises.
///
/// Always taken from the extension, never inferred.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capabilities {
    /// State can be set.
    pub can_set_state: bool,
    /// Previous track is reachable.
    pub can_skip_previous: bool,
    /// Next track is reachable.
    pub can_skip_next: bool,
    /// Position can be set.
    pub can_set_position: bool,
    /// Volume can be set.
    pub can_set_volume: bool,
    /// Rating can be set.
    pub can_set_rating: bool,
    /// Repeat mode can be set.
    pub can_set_repeat: bool,
    /// Shuffle can be set.
    pub can_set_shuffle: bool,
}

impl Capabilities {
    /// Every capability disabled.
    pub const NONE: Self = Self {
        can_set_state: false,
        can_skip_previous: false,
        can_skip_next: false,
        can_set_position: false,
        can_set_volume: false,
        can_set_rating: false,
        can_set_repeat: false,
        can_set_shuffle: false,
    };

    /// Every capability enabled.
    pub const ALL: Self = Self {
        can_set_state: true,
        can_skip_previous: true,
        can_skip_next: true,
        can_set_position: true,
        can_set_volume: true,
        can_set_rating: true,
        can_set_repeat: true,
        can_set_shuffle: true,
    };

    /// Returns `true` if no capability is advertised.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// Reads one flag.
    #[must_use]
    pub const fn get(&self, capability: Capability) -> bool {
        match capability {
            Capability::SetState => self.can_set_state,
            Capability::SkipPrevious => self.can_skip_previous,
            Capability::SkipNext => self.can_skip_next,
            Capability::SetPosition => self.can_set_position,
            Capability::SetVolume => self.can_set_volume,
            Capability::SetRating => self.can_set_rating,
            Capability::SetRepeat => self.can_set_repeat,
            Capability::SetShuffle => self.can_set_shuffle,
        }
    }

    /// Writes one flag.
    pub fn set(&mut self, capability: Capability, enabled: bool) {
        let flag = match capability {
            Capability::SetState => &mut self.can_set_state,
            Capability::SkipPrevious => &mut self.can_skip_previous,
            Capability::SkipNext => &mut self.can_skip_next,
            Capability::SetPosition => &mut self.can_set_position,
            Capability::SetVolume => &mut self.can_set_volume,
            Capability::SetRating => &mut self.can_set_rating,
            Capability::SetRepeat => &mut self.can_set_repeat,
            Capability::SetShuffle => &mut self.can_set_shuffle,
        };
        *flag = enabled;
    }
}

// ============================================================================
// Capability
// ============================================================================

/// Name of a single capability flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `can_set_state`
    SetState,
    /// `can_skip_previous`
    SkipPrevious,
    /// `can_skip_next`
    SkipNext,
    /// `can_set_position`
    SetPosition,
    /// `can_set_volume`
    SetVolume,
    /// `can_set_rating`
    SetRating,
    /// `can_set_repeat`
    SetRepeat,
    /// `can_set_shuffle`
    SetShuffle,
}

// ============================================================================
// Tests
// ============================================================================
