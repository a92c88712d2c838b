//! Command dispatcher.
//!
//! Validates a control request against the target player and hands the
//! encoded frame to its session. Checks run in a fixed order:
//!
//! 1. the id resolves to a registered session ([`Error::NoSuchPlayer`])
//! 2. the player advertises the gating capability ([`Error::Unsupported`])
//! 3. the value is in range ([`Error::InvalidValue`])
//!
//! A rejected command never reaches the wire. An accepted one is
//! fire-and-forget: the new state shows up in a later snapshot once the
//! extension echoes it, and the optional `EVENT_RESULT` lands in
//! [`EventResults`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `results` | Acknowledgement table |

// ============================================================================
// Submodules
// ============================================================================

/// Command acknowledgement table.
pub mod results;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::{EventId, PlayerId};
use crate::player::{MAX_RATING, MAX_VOLUME, PlaybackState, PlayerSnapshot};
use crate::protocol::{Command, CommandFrame, CommandTag, Payload, encode_command};
use crate::registry::Registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use results::{DEFAULT_RESULT_TIMEOUT, EventResults, MAX_TRACKED_EVENTS};

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes control requests to sessions.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    results: Arc<EventResults>,
}

impl Dispatcher {
    /// Creates a dispatcher over a registry and result table.
    #[must_use]
    pub fn new(registry: Arc<Registry>, results: Arc<EventResults>) -> Self {
        Self { registry, results }
    }

    /// Returns the acknowledgement table.
    #[inline]
    #[must_use]
    pub fn results(&self) -> &Arc<EventResults> {
        &self.results
    }

    /// Validates `command` and queues it for player `id`.
    ///
    /// Returns the event id the extension will acknowledge.
    ///
    /// # Errors
    ///
    /// - [`Error::NoSuchPlayer`] if `id` is not registered
    /// - [`Error::Unsupported`] if the player lacks the capability
    /// - [`Error::InvalidValue`] if the value is out of range
    pub fn dispatch(&self, id: PlayerId, command: Command) -> Result<EventId> {
        let handle = self
            .registry
            .get(id)
            .ok_or_else(|| Error::no_such_player(id))?;
        let player = handle.snapshot();

        let tag = command.tag();
        if !player.capabilities.get(tag.capability()) {
            debug!(player_id = %id, command = %tag, "Command not supported by player");
            return Err(Error::unsupported(id, tag));
        }

        let payload = validate(&player, command)?;

        let event_id = EventId::next();
        let frame = CommandFrame::new(event_id, tag, payload);
        self.results.insert_pending(event_id);

        if handle.send_frame(encode_command(&frame)).is_err() {
            // session loop ended between lookup and send
            self.results.remove(event_id);
            return Err(Error::no_such_player(id));
        }

        debug!(player_id = %id, command = %tag, event_id = %event_id, "Command dispatched");
        Ok(event_id)
    }
}

// ============================================================================
// Dispatcher - Utility Commands
// ============================================================================

impl Dispatcher {
    /// Plays a paused or stopped player, pauses a playing one.
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::dispatch`].
    pub fn play_pause(&self, id: PlayerId) -> Result<EventId> {
        let state = self.current(id)?.state;
        let next = match state {
            PlaybackState::Playing => PlaybackState::Paused,
            PlaybackState::Paused | PlaybackState::Stopped => PlaybackState::Playing,
        };
        self.dispatch(id, Command::SetState(next))
    }

    /// Seeks backwards by `seconds`, stopping at the start.
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::dispatch`].
    pub fn revert(&self, id: PlayerId, seconds: f64) -> Result<EventId> {
        self.seek_relative(id, |player| player.position - seconds)
    }

    /// Seeks forwards by `seconds`, stopping at the end.
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::dispatch`].
    pub fn forward(&self, id: PlayerId, seconds: f64) -> Result<EventId> {
        self.seek_relative(id, |player| player.position + seconds)
    }

    /// Seeks to a percentage of the track.
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::dispatch`].
    pub fn set_position_percent(&self, id: PlayerId, percent: f64) -> Result<EventId> {
        self.seek_relative(id, |player| player.duration * percent / 100.0)
    }

    /// Seeks backwards by a percentage of the track.
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::dispatch`].
    pub fn revert_percent(&self, id: PlayerId, percent: f64) -> Result<EventId> {
        self.seek_relative(id, |player| {
            player.position - player.duration * percent / 100.0
        })
    }

    /// Seeks forwards by a percentage of the track.
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::dispatch`].
    pub fn forward_percent(&self, id: PlayerId, percent: f64) -> Result<EventId> {
        self.seek_relative(id, |player| {
            player.position + player.duration * percent / 100.0
        })
    }

    fn current(&self, id: PlayerId) -> Result<PlayerSnapshot> {
        self.registry
            .get(id)
            .map(|handle| handle.snapshot())
            .ok_or_else(|| Error::no_such_player(id))
    }

    fn seek_relative(
        &self,
        id: PlayerId,
        target: impl FnOnce(&PlayerSnapshot) -> f64,
    ) -> Result<EventId> {
        let player = self.current(id)?;
        let position = target(&player);
        let position = if position.is_finite() {
            position.clamp(0.0, player.duration.max(0.0))
        } else {
            position
        };
        self.dispatch(id, Command::SetPosition(position))
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate(player: &PlayerSnapshot, command: Command) -> Result<Payload> {
    let tag = command.tag();
    match command {
        Command::SetState(state) => Ok(Payload::State(state)),
        Command::SkipPrevious | Command::SkipNext => Ok(Payload::Empty),

        Command::SetPosition(seconds) => {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(Error::invalid_value(tag, format!("{seconds} is not a position")));
            }
            if player.duration <= 0.0 {
                return Err(Error::invalid_value(tag, "track duration is unknown"));
            }
            if seconds > player.duration {
                return Err(Error::invalid_value(
                    tag,
                    format!("{seconds} exceeds duration {}", player.duration),
                ));
            }
            Ok(Payload::Number(seconds))
        }

        Command::SetVolume(volume) => {
            in_range(tag, volume, MAX_VOLUME)?;
            Ok(Payload::Number(volume))
        }

        Command::SetRating(rating) => {
            in_range(tag, rating, MAX_RATING)?;
            Ok(Payload::Number(rating))
        }

        Command::SetRepeat(repeat) => {
            if !player.available_repeat.contains(repeat) {
                return Err(Error::invalid_value(
                    tag,
                    format!("player does not support repeat {}", repeat.as_wire()),
                ));
            }
            Ok(Payload::Repeat(repeat))
        }

        Command::ToggleRepeat => player
            .available_repeat
            .next_after(player.repeat)
            .map(Payload::Repeat)
            .ok_or_else(|| Error::invalid_value(tag, "no other repeat mode available")),

        Command::SetShuffle(shuffle) => Ok(Payload::Bool(shuffle)),
    }
}

fn in_range(tag: CommandTag, value: f64, max: f64) -> Result<()> {
    if value.is_finite() && (0.0..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::invalid_value(tag, format!("{value} outside [0, {max}]")))
    }
}

// ============================================================================
// Tests
// ============================================================================
