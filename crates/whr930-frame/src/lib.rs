//! Serial frame codec for the StorkAir WHR930 (ComfoAir protocol).
//!
//! Every frame on the wire looks like:
//! - A 2-byte start marker `07 F0`
//! - A 2-byte big-endian command ID
//! - A 1-byte payload length and the payload
//! - A 1-byte checksum and the `07 0F` terminator
//!
//! Replies from the unit are additionally prefixed with an `07 F3`
//! acknowledge pair. Outbound frames are fixed literals; inbound telemetry
//! is decoded by fixed offset.

pub mod codec;
pub mod command;
pub mod error;
pub mod telemetry;

pub use codec::{
    checksum, encode_frame, encode_set_level, parse_reply, parse_response, Frame, ACK, END, FRAME_OVERHEAD,
    MAX_PAYLOAD, START,
};
pub use command::{
    command_name, FAN_STATUS_REPLY, GET_FAN_STATUS, GET_TEMPERATURES, READ_FAN_STATUS,
    READ_TEMPERATURES, SET_LEVEL, SET_LEVEL_FRAMES, TEMPERATURES_REPLY,
};
pub use error::{FrameError, Result};
pub use telemetry::{
    decode_fan_status, decode_temperatures, raw_to_celsius, FanStatus, Temperatures,
    VentilationLevel, FAN_STATUS_MIN_LEN, TEMPERATURES_MIN_LEN,
};
