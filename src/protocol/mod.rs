//! Media-control wire protocol.
//!
//! Line-oriented frames exchanged between the server and a browser extension.
//!
//! # Protocol Overview
//!
//! | Frame | Direction | Purpose |
//! |-------|-----------|---------|
//! | `ADAPTER_VERSION` | both | Handshake / greeting |
//! | `PROTOCOL_REVISION` | Server → Extension | Greeting |
//! | field tags (`TITLE`, `STATE`, ...) | Extension → Server | Player state |
//! | command tags (`SET_VOLUME`, ...) | Server → Extension | Control request |
//! | `EVENT_RESULT` | Extension → Server | Command acknowledgement |
//! | `PING` | Extension → Server | Keep-alive |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `codec` | Frame decoding and encoding |
//! | `command` | Outbound command types |
//! | `message` | Decoded inbound frames |
//! | `version` | Handshake version compatibility |

// ============================================================================
// Submodules
// ============================================================================

/// Frame decoding and encoding.
pub mod codec;

/// Outbound command types.
pub mod command;

/// Decoded inbound frame types.
pub mod message;

/// Handshake version compatibility.
pub mod version;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{
    PROTOCOL_REVISION, decode_frames, decode_line, encode_command, encode_field,
    encode_greeting, escape, split_list, unescape,
};
pub use command::{Command, CommandFrame, CommandTag, Payload};
pub use message::{EventResult, FieldUpdate, ParsedMessage};
pub use version::AdapterVersion;
