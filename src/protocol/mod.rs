//! Device wire protocol.
//!
//! The rig speaks compact JSON with no delimiter and no length prefix:
//! - [`command`] encodes the configuration payload we send
//! - [`frame`] recovers acknowledgment and telemetry frames from the byte stream

pub mod command;
pub mod frame;

pub use command::{GameConfig, GoalType, encode as encode_config};
pub use frame::{
    ACK_MARKER, DEFAULT_BUFFER_CAPACITY, Extraction, FrameKind, InboundBuffer, TELEMETRY_MARKER,
    extract,
};
