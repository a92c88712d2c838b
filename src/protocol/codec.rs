//! Line codec for the media-control protocol.
//!
//! # Frame Format
//!
//! ```text
//! TAG [SP VALUE] LF
//! ```
//!
//! A WebSocket text message carries one or more frames. `TAG` matches
//! `[A-Z][A-Z0-9_]*`; `VALUE` is everything after the first space.
//!
//! | Value | Encoding |
//! |-------|----------|
//! | string | bare or `"quoted"`, escapes `\\` `\n` `\r` `\t` `\"` |
//! | number | decimal, finite |
//! | bool | `1`, `0`, `true`, `false` |
//! | list | `|`-separated, `\|` escapes a literal pipe |
//!
//! Decoding is pure: a malformed frame yields [`Error::Decode`] and nothing
//! else. Unknown tags decode to [`ParsedMessage::Unknown`].

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};
use crate::identifiers::EventId;
use crate::player::{Capability, PlaybackState, RatingSystem, Repeat, RepeatSet};

use super::command::{CommandFrame, Payload};
use super::message::{EventResult, FieldUpdate, ParsedMessage, capability_tag};

// ============================================================================
// Constants
// ============================================================================

/// Protocol revision announced to extensions on connect.
pub const PROTOCOL_REVISION: u32 = 3;

/// Separator between list items.
const LIST_SEPARATOR: char = '|';

// ============================================================================
// Decoding
// ============================================================================

/// Decodes every frame in one WebSocket text message.
///
/// Blank lines are skipped. Each line decodes independently, so one bad
/// frame does not hide the ones after it.
pub fn decode_frames(text: &str) -> impl Iterator<Item = Result<ParsedMessage>> + '_ {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .map(decode_line)
}

/// Decodes a single frame.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the tag is malformed or a known tag carries
/// a value of the wrong shape.
pub fn decode_line(line: &str) -> Result<ParsedMessage> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let (tag, value) = line.split_once(' ').unwrap_or((line, ""));

    if !is_valid_tag(tag) {
        return Err(Error::decode(format!("invalid tag {tag:?}")));
    }

    let message = match tag {
        "ADAPTER_VERSION" => ParsedMessage::Hello {
            adapter_version: parse_string(value)?,
        },
        "PING" => ParsedMessage::Ping,
        "EVENT_RESULT" => parse_event_result(value)?,

        "NAME" => field(FieldUpdate::Name(parse_string(value)?)),
        "TITLE" => field(FieldUpdate::Title(parse_string(value)?)),
        "ARTIST" => field(FieldUpdate::Artist(parse_string(value)?)),
        "ALBUM" => field(FieldUpdate::Album(parse_string(value)?)),
        "COVER" => field(FieldUpdate::Cover(parse_string(value)?)),
        "COVER_SRC" => field(FieldUpdate::CoverSrc(parse_string(value)?)),
        "STATE" => field(FieldUpdate::State(parse_enum(
            tag,
            value,
            PlaybackState::from_wire,
        )?)),
        "POSITION" => field(FieldUpdate::Position(parse_number(tag, value)?)),
        "DURATION" => field(FieldUpdate::Duration(parse_number(tag, value)?)),
        "VOLUME" => field(FieldUpdate::Volume(parse_number(tag, value)?)),
        "RATING" => field(FieldUpdate::Rating(parse_number(tag, value)?)),
        "RATING_SYSTEM" => field(FieldUpdate::RatingSystem(parse_enum(
            tag,
            value,
            RatingSystem::from_wire,
        )?)),
        "REPEAT" => field(FieldUpdate::Repeat(parse_enum(tag, value, Repeat::from_wire)?)),
        "SHUFFLE" => field(FieldUpdate::Shuffle(parse_bool(tag, value)?)),
        "AVAILABLE_REPEAT" => field(FieldUpdate::AvailableRepeat(parse_repeat_set(value)?)),
        "ACTIVE_AT" => field(FieldUpdate::ActiveAt(parse_u64(tag, value)?)),
        "IS_DESKTOP_PLAYER" => field(FieldUpdate::IsDesktopPlayer(parse_bool(tag, value)?)),

        _ => match capability_from_tag(tag) {
            Some(capability) => field(FieldUpdate::Capability(
                capability,
                parse_bool(tag, value)?,
            )),
            None => ParsedMessage::Unknown {
                tag: tag.to_string(),
            },
        },
    };

    Ok(message)
}

#[inline]
fn field(update: FieldUpdate) -> ParsedMessage {
    ParsedMessage::Field(update)
}

fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn capability_from_tag(tag: &str) -> Option<Capability> {
    const CAPABILITIES: [Capability; 8] = [
        Capability::SetState,
        Capability::SkipPrevious,
        Capability::SkipNext,
        Capability::SetPosition,
        Capability::SetVolume,
        Capability::SetRating,
        Capability::SetRepeat,
        Capability::SetShuffle,
    ];

    CAPABILITIES
        .into_iter()
        .find(|capability| capability_tag(*capability) == tag)
}

fn parse_string(value: &str) -> Result<String> {
    match value.strip_prefix('"') {
        Some(rest) => {
            let inner = rest
                .strip_suffix('"')
                .filter(|inner| !inner.ends_with('\\') || inner.ends_with("\\\\"))
                .ok_or_else(|| Error::decode("unterminated quoted string"))?;
            unescape(inner)
        }
        None => unescape(value),
    }
}

fn parse_number(tag: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or_else(|| Error::decode(format!("{tag}: expected a finite number, got {value:?}")))
}

fn parse_u64(tag: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::decode(format!("{tag}: expected an unsigned integer, got {value:?}")))
}

fn parse_bool(tag: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(Error::decode(format!("{tag}: expected a bool, got {value:?}"))),
    }
}

fn parse_enum<T>(tag: &str, value: &str, from_wire: impl Fn(&str) -> Option<T>) -> Result<T> {
    from_wire(value.trim())
        .ok_or_else(|| Error::decode(format!("{tag}: unknown value {value:?}")))
}

fn parse_repeat_set(value: &str) -> Result<RepeatSet> {
    let value = value.trim();
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        let bits = value
            .parse::<u8>()
            .map_err(|_| Error::decode(format!("AVAILABLE_REPEAT: bad bitmask {value:?}")))?;
        return Ok(RepeatSet::from_bits(bits));
    }

    split_list(value)?
        .iter()
        .map(|item| parse_enum("AVAILABLE_REPEAT", item, Repeat::from_wire))
        .collect()
}

fn parse_event_result(value: &str) -> Result<ParsedMessage> {
    let (id, result) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| Error::decode("EVENT_RESULT: expected `<event_id> <result>`"))?;

    Ok(ParsedMessage::EventResult {
        event_id: EventId::from_u64(parse_u64("EVENT_RESULT", id)?),
        result: parse_enum("EVENT_RESULT", result, EventResult::from_wire)?,
    })
}

/// Splits a list value on unescaped pipes.
///
/// Empty input is an empty list.
///
/// # Errors
///
/// Returns [`Error::Decode`] on an invalid escape sequence.
pub fn split_list(value: &str) -> Result<Vec<String>> {
    if value.is_empty() {
        return Ok(Vec::new());
    }

    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.as_str().starts_with(LIST_SEPARATOR) => {
                current.push(LIST_SEPARATOR);
                chars.next();
            }
            LIST_SEPARATOR => items.push(unescape(&std::mem::take(&mut current))?),
            _ => current.push(c),
        }
    }
    items.push(unescape(&current)?);

    Ok(items)
}

/// Reverses [`escape`] on a string body (without surrounding quotes).
///
/// # Errors
///
/// Returns [`Error::Decode`] on an unknown or dangling escape.
pub fn unescape(raw: &str) -> Result<String> {
    if !raw.contains('\\') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some(other) => return Err(Error::decode(format!("invalid escape \\{other}"))),
            None => return Err(Error::decode("dangling escape at end of value")),
        }
    }

    Ok(out)
}

// ============================================================================
// Encoding
// ============================================================================

/// Escapes a string value and wraps it in quotes.
#[must_use]
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Encodes a command frame: `TAG EVENT_ID [VALUE]`.
#[must_use]
pub fn encode_command(frame: &CommandFrame) -> String {
    let head = format!("{} {}", frame.tag.as_wire(), frame.event_id);
    match frame.payload {
        Payload::Empty => head,
        Payload::State(state) => format!("{head} {}", state.as_wire()),
        Payload::Number(number) => format!("{head} {number}"),
        Payload::Repeat(repeat) => format!("{head} {}", repeat.as_wire()),
        Payload::Bool(flag) => format!("{head} {}", u8::from(flag)),
    }
}

/// Encodes the greeting sent to an extension right after the upgrade.
#[must_use]
pub fn encode_greeting(adapter_version: &str) -> String {
    format!(
        "ADAPTER_VERSION {}\nPROTOCOL_REVISION {PROTOCOL_REVISION}",
        escape(adapter_version)
    )
}

/// Encodes a field update the way an extension sends it.
#[must_use]
pub fn encode_field(update: &FieldUpdate) -> String {
    let tag = update.tag();
    let value = match update {
        FieldUpdate::Name(s)
        | FieldUpdate::Title(s)
        | FieldUpdate::Artist(s)
        | FieldUpdate::Album(s)
        | FieldUpdate::Cover(s)
        | FieldUpdate::CoverSrc(s) => escape(s),
        FieldUpdate::State(state) => state.as_wire().to_string(),
        FieldUpdate::Position(n)
        | FieldUpdate::Duration(n)
        | FieldUpdate::Volume(n)
        | FieldUpdate::Rating(n) => n.to_string(),
        FieldUpdate::RatingSystem(system) => match system {
            RatingSystem::None => "NONE",
            RatingSystem::Like => "LIKE",
            RatingSystem::LikeDislike => "LIKE_DISLIKE",
            RatingSystem::Scale => "SCALE",
        }
        .to_string(),
        FieldUpdate::Repeat(repeat) => repeat.as_wire().to_string(),
        FieldUpdate::AvailableRepeat(set) => set
            .iter()
            .map(Repeat::as_wire)
            .collect::<Vec<_>>()
            .join("|"),
        FieldUpdate::Shuffle(flag)
        | FieldUpdate::Capability(_, flag)
        | FieldUpdate::IsDesktopPlayer(flag) => u8::from(*flag).to_string(),
        FieldUpdate::ActiveAt(ms) => ms.to_string(),
    };
    format!("{tag} {value}")
}

// ============================================================================
// Tests
// ============================================================================
