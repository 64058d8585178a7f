use std::fmt;
use std::io;

use whr930_bridge::{BridgeError, CommandError};
use whr930_frame::FrameError;
use whr930_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Local process failures (runtime, threads). Never device related.
pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(INTERNAL, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::InvalidLevel(_) | FrameError::UnparsableLevel(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn bridge_error(context: &str, err: BridgeError) -> CliError {
    match err {
        BridgeError::Transport(err) => transport_error(context, err),
        BridgeError::Frame(err) => frame_error(context, err),
        BridgeError::WorkerGone => CliError::new(INTERNAL, format!("{context}: {err}")),
        BridgeError::DeviceBusy | BridgeError::Publish(_) | BridgeError::BusDisconnected(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}

pub fn command_error(context: &str, err: CommandError) -> CliError {
    match err {
        CommandError::OutOfRange { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        CommandError::Device(err) => bridge_error(context, err),
    }
}
