//! Mutable player state owned by a session.
//!
//! [`PlayerState::apply`] folds one decoded frame into the current snapshot.
//! Fields absent from a frame keep their previous value. Numeric values
//! outside their declared range are dropped and logged; they never reach a
//! snapshot.

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, warn};

use crate::identifiers::PlayerId;
use crate::protocol::{FieldUpdate, ParsedMessage};

use super::model::PlaybackState;
use super::snapshot::PlayerSnapshot;

// ============================================================================
// Constants
// ============================================================================

/// Largest accepted volume.
pub const MAX_VOLUME: f64 = 100.0;

/// Largest accepted rating.
pub const MAX_RATING: f64 = 5.0;

// ============================================================================
// Applied
// ============================================================================

/// Outcome of folding one frame into the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// At least one field changed.
    Changed,
    /// The frame matched the current state, or carried no field.
    Unchanged,
    /// The value was out of range and was dropped.
    Rejected,
}

// ============================================================================
// PlayerState
// ============================================================================

/// Live state of one player.
#[derive(Debug, Clone)]
pub struct PlayerState {
    current: PlayerSnapshot,
    /// When the player last entered `Stopped`, ms since the unix epoch.
    stopped_since: Option<u64>,
}

impl PlayerState {
    /// Creates the state of a newly registered player.
    #[must_use]
    pub fn new(id: PlayerId, now_ms: u64) -> Self {
        Self {
            current: PlayerSnapshot::new(id, now_ms),
            stopped_since: Some(now_ms),
        }
    }

    /// Returns a copy of the current state.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.current.clone()
    }

    /// Borrows the current state.
    #[inline]
    #[must_use]
    pub fn current(&self) -> &PlayerSnapshot {
        &self.current
    }

    /// Returns when the player entered `Stopped`, if it is stopped.
    #[inline]
    #[must_use]
    pub fn stopped_since(&self) -> Option<u64> {
        self.stopped_since
    }

    /// Folds a decoded message into the state.
    ///
    /// Non-field messages are ignored. `updated_at` only advances when a
    /// value actually changes, so applying the same frame twice is a no-op.
    pub fn apply(&mut self, message: &ParsedMessage, now_ms: u64) -> Applied {
        match message {
            ParsedMessage::Field(update) => self.apply_field(update, now_ms),
            _ => Applied::Unchanged,
        }
    }

    /// Folds one field update into the state.
    pub fn apply_field(&mut self, update: &FieldUpdate, now_ms: u64) -> Applied {
        let id = self.current.id;
        let player = &mut self.current;

        let changed = match update {
            FieldUpdate::Name(value) => replace(&mut player.name, value),
            FieldUpdate::Title(value) => replace(&mut player.title, value),
            FieldUpdate::Artist(value) => replace(&mut player.artist, value),
            FieldUpdate::Album(value) => replace(&mut player.album, value),
            FieldUpdate::Cover(value) => replace(&mut player.cover, value),
            FieldUpdate::CoverSrc(value) => replace(&mut player.cover_src, value),

            FieldUpdate::State(state) => {
                if player.state == *state {
                    false
                } else {
                    player.state = *state;
                    player.active_at = now_ms;
                    self.stopped_since = (*state == PlaybackState::Stopped).then_some(now_ms);
                    true
                }
            }

            FieldUpdate::Position(position) => {
                let over_duration = player.duration > 0.0 && *position > player.duration;
                if *position < 0.0 || over_duration {
                    return reject(id, update, "position outside [0, duration]");
                }
                set(&mut player.position, *position)
            }

            FieldUpdate::Duration(duration) => {
                if *duration < 0.0 {
                    return reject(id, update, "negative duration");
                }
                let mut changed = set(&mut player.duration, *duration);
                if *duration > 0.0 && player.position > *duration {
                    debug!(
                        player_id = %id,
                        position = player.position,
                        duration,
                        "Position clamped to new duration"
                    );
                    changed |= set(&mut player.position, *duration);
                }
                changed
            }

            FieldUpdate::Volume(volume) => {
                if !(0.0..=MAX_VOLUME).contains(volume) {
                    return reject(id, update, "volume outside [0, 100]");
                }
                set(&mut player.volume, *volume)
            }

            FieldUpdate::Rating(rating) => {
                if !(0.0..=MAX_RATING).contains(rating) {
                    return reject(id, update, "rating outside [0, 5]");
                }
                set(&mut player.rating, *rating)
            }

            FieldUpdate::RatingSystem(system) => set(&mut player.rating_system, *system),
            FieldUpdate::Repeat(repeat) => set(&mut player.repeat, *repeat),
            FieldUpdate::Shuffle(shuffle) => set(&mut player.shuffle, *shuffle),
            FieldUpdate::AvailableRepeat(modes) => set(&mut player.available_repeat, *modes),

            FieldUpdate::Capability(capability, enabled) => {
                let changed = player.capabilities.get(*capability) != *enabled;
                player.capabilities.set(*capability, *enabled);
                changed
            }

            FieldUpdate::ActiveAt(active_at) => set(&mut player.active_at, *active_at),
            FieldUpdate::IsDesktopPlayer(flag) => set(&mut player.is_desktop_player, *flag),
        };

        if changed {
            player.updated_at = now_ms.max(player.updated_at);
            Applied::Changed
        } else {
            Applied::Unchanged
        }
    }
}

fn replace(field: &mut String, value: &str) -> bool {
    if field == value {
        return false;
    }
    value.clone_into(field);
    true
}

fn set<T: PartialEq + Copy>(field: &mut T, value: T) -> bool {
    if *field == value {
        return false;
    }
    *field = value;
    true
}

fn reject(id: PlayerId, update: &FieldUpdate, reason: &str) -> Applied {
    warn!(player_id = %id, tag = update.tag(), ?update, reason, "Out-of-range update dropped");
    Applied::Rejected
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::player::{Capability, PlaybackState, PlayerSnapshot, Repeat};
    use crate::protocol::decode_line;

    fn state() -> PlayerState {
        PlayerState::new(PlayerId::next(), 1_000)
    }

    fn feed(state: &mut PlayerState, line: &str, now_ms: u64) -> Applied {
        let message = decode_line(line).expect("decode");
        state.apply(&message, now_ms)
    }

    #[test]
    fn test_absent_fields_keep_previous_values() {
        let mut player = state();
        feed(&mut player, "ARTIST \"Artist\"", 1_001);
        feed(&mut player, "TITLE \"Title\"", 1_002);

        let snapshot = player.snapshot();
        assert_eq!(snapshot.artist, "Artist");
        assert_eq!(snapshot.title, "Title");
        assert_eq!(snapshot.updated_at, 1_002);
    }

    #[test]
    fn test_reapplying_a_frame_is_a_noop() {
        let mut player = state();
        assert_eq!(feed(&mut player, "VOLUME 30", 1_100), Applied::Changed);
        let before = player.snapshot();

        assert_eq!(feed(&mut player, "VOLUME 30", 1_200), Applied::Unchanged);
        assert_eq!(player.snapshot(), before);
    }

    #[test]
    fn test_out_of_range_values_dropped() {
        let mut player = state();
        feed(&mut player, "DURATION 200", 1_001);
        feed(&mut player, "VOLUME 40", 1_001);

        assert_eq!(feed(&mut player, "DURATION -1", 1_002), Applied::Rejected);
        assert_eq!(feed(&mut player, "VOLUME 150", 1_002), Applied::Rejected);
        assert_eq!(feed(&mut player, "POSITION 201", 1_002), Applied::Rejected);
        assert_eq!(feed(&mut player, "POSITION -3", 1_002), Applied::Rejected);
        assert_eq!(feed(&mut player, "RATING 6", 1_002), Applied::Rejected);

        let snapshot = player.snapshot();
        assert_eq!(snapshot.duration, 200.0);
        assert_eq!(snapshot.volume, 40.0);
        assert_eq!(snapshot.position, 0.0);
        assert_eq!(snapshot.updated_at, 1_001);
    }

    #[test]
    fn test_shorter_duration_clamps_position() {
        let mut player = state();
        feed(&mut player, "DURATION 300", 1_001);
        feed(&mut player, "POSITION 250", 1_002);
        feed(&mut player, "DURATION 120", 1_003);

        let snapshot = player.snapshot();
        assert_eq!(snapshot.duration, 120.0);
        assert_eq!(snapshot.position, 120.0);
    }

    #[test]
    fn test_state_change_marks_activity() {
        let mut player = state();
        assert_eq!(player.stopped_since(), Some(1_000));

        feed(&mut player, "STATE PLAYING", 2_000);
        assert_eq!(player.current().active_at, 2_000);
        assert_eq!(player.stopped_since(), None);

        feed(&mut player, "STATE STOPPED", 3_000);
        assert_eq!(player.current().active_at, 3_000);
        assert_eq!(player.stopped_since(), Some(3_000));

        // same state again does not count as activity
        feed(&mut player, "STATE STOPPED", 4_000);
        assert_eq!(player.current().active_at, 3_000);
    }

    #[test]
    fn test_explicit_active_at() {
        let mut player = state();
        feed(&mut player, "ACTIVE_AT 1702093090497", 2_000);
        assert_eq!(player.current().active_at, 1_702_093_090_497);
    }

    #[test]
    fn test_capabilities_and_repeat() {
        let mut player = state();
        feed(&mut player, "CAN_SET_REPEAT 1", 1_001);
        feed(&mut player, "AVAILABLE_REPEAT NONE|ONE", 1_001);
        feed(&mut player, "REPEAT ONE", 1_001);

        let snapshot = player.snapshot();
        assert!(snapshot.capabilities.get(Capability::SetRepeat));
        assert!(snapshot.available_repeat.contains(Repeat::One));
        assert!(!snapshot.available_repeat.contains(Repeat::All));
        assert_eq!(snapshot.repeat, Repeat::One);
    }

    #[test]
    fn test_non_field_messages_ignored() {
        let mut player = state();
        let before = player.snapshot();
        assert_eq!(feed(&mut player, "PING", 5_000), Applied::Unchanged);
        assert_eq!(feed(&mut player, "UNKNOWN_FIELD 1", 5_000), Applied::Unchanged);
        assert_eq!(player.snapshot(), before);
    }

    #[derive(Debug, Clone)]
    enum Frame {
        Title(String),
        Artist(String),
        Volume(u32),
        Rating(u32),
        State(PlaybackState),
        Shuffle(bool),
        SkipNext(bool),
    }

    impl Frame {
        fn line(&self) -> String {
            match self {
                Self::Title(s) => format!("TITLE \"{s}\""),
                Self::Artist(s) => format!("ARTIST \"{s}\""),
                Self::Volume(v) => format!("VOLUME {v}"),
                Self::Rating(v) => format!("RATING {v}"),
                Self::State(state) => format!("STATE {}", state.as_wire()),
                Self::Shuffle(b) => format!("SHUFFLE {}", u8::from(*b)),
                Self::SkipNext(b) => format!("CAN_SKIP_NEXT {}", u8::from(*b)),
            }
        }

        /// Folds the frame into the expected snapshot.
        fn record(&self, expected: &mut PlayerSnapshot) {
            match self {
                Self::Title(s) => expected.title = s.clone(),
                Self::Artist(s) => expected.artist = s.clone(),
                Self::Volume(v) => expected.volume = f64::from(*v),
                Self::Rating(v) => expected.rating = f64::from(*v),
                Self::State(state) => expected.state = *state,
                Self::Shuffle(b) => expected.shuffle = *b,
                Self::SkipNext(b) => expected.capabilities.can_skip_next = *b,
            }
        }
    }

    fn frame() -> impl Strategy<Value = Frame> {
        prop_oneof![
            "[a-zA-Z ]{0,12}".prop_map(Frame::Title),
            "[a-zA-Z ]{0,12}".prop_map(Frame::Artist),
            (0u32..=100).prop_map(Frame::Volume),
            (0u32..=5).prop_map(Frame::Rating),
            prop_oneof![
                Just(PlaybackState::Playing),
                Just(PlaybackState::Paused),
                Just(PlaybackState::Stopped),
            ]
            .prop_map(Frame::State),
            any::<bool>().prop_map(Frame::Shuffle),
            any::<bool>().prop_map(Frame::SkipNext),
        ]
    }

    proptest! {
        #[test]
        fn prop_snapshot_holds_last_value_per_field(frames in prop::collection::vec(frame(), 1..40)) {
            let mut player = state();
            let mut expected = player.snapshot();
            for (i, frame) in frames.iter().enumerate() {
                feed(&mut player, &frame.line(), 2_000 + i as u64);
                frame.record(&mut expected);
            }

            let after_once = player.snapshot();
            prop_assert_eq!(&after_once.title, &expected.title);
            prop_assert_eq!(&after_once.artist, &expected.artist);
            prop_assert_eq!(after_once.volume, expected.volume);
            prop_assert_eq!(after_once.rating, expected.rating);
            prop_assert_eq!(after_once.state, expected.state);
            prop_assert_eq!(after_once.shuffle, expected.shuffle);
            prop_assert_eq!(
                after_once.capabilities.can_skip_next,
                expected.capabilities.can_skip_next
            );

            // replaying the final frame of each field changes nothing
            let lines: Vec<String> = frames.iter().map(Frame::line).collect();
            for line in &lines {
                let tag = line.split(' ').next().unwrap_or_default();
                if let Some(last) = lines.iter().rev().find(|l| l.starts_with(&format!("{tag} "))) {
                    feed(&mut player, last, 9_999);
                }
            }
            prop_assert_eq!(player.snapshot(), after_once);
        }
    }
}
