//! Inbound "set ventilation level" commands.

use bytes::Bytes;
use tracing::{info, warn};
use whr930_frame::{encode_set_level, VentilationLevel};

use crate::error::{BridgeError, CommandError};
use crate::worker::DeviceHandle;

/// Turns bus payloads into set-level writes on the unit.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    device: DeviceHandle,
}

impl CommandHandler {
    pub fn new(device: DeviceHandle) -> Self {
        Self { device }
    }

    /// Parse a raw payload as a level in `0..=3`. Surrounding whitespace is
    /// ignored.
    pub fn parse_level(payload: &[u8]) -> Result<VentilationLevel, CommandError> {
        let out_of_range = || CommandError::OutOfRange {
            payload: String::from_utf8_lossy(payload).into_owned(),
        };
        let text = std::str::from_utf8(payload).map_err(|_| out_of_range())?;
        text.parse::<VentilationLevel>().map_err(|_| out_of_range())
    }

    /// Validate `payload` and write the matching set-level frame, waiting
    /// until it has gone out on the wire.
    ///
    /// Invalid payloads are logged and leave the unit untouched.
    pub async fn handle_set_level(&self, payload: &[u8]) -> Result<VentilationLevel, CommandError> {
        let (level, frame) = Self::prepare(payload)?;
        self.device.write_and_wait(frame).await?;
        Ok(level)
    }

    /// Like [`CommandHandler::handle_set_level`], but never waits: the frame
    /// is handed to the worker only if its queue has room.
    pub fn submit_set_level(&self, payload: &[u8]) -> Result<VentilationLevel, CommandError> {
        let (level, frame) = Self::prepare(payload)?;
        self.device.try_write(frame)?;
        Ok(level)
    }

    fn prepare(payload: &[u8]) -> Result<(VentilationLevel, Bytes), CommandError> {
        let level = match Self::parse_level(payload) {
            Ok(level) => level,
            Err(err) => {
                warn!(error = %err, "ignoring set_ventilation_level command");
                return Err(err);
            }
        };

        info!(%level, "setting ventilation level");
        let frame = encode_set_level(i64::from(level.get())).map_err(BridgeError::from)?;
        Ok((level, frame))
    }
}
