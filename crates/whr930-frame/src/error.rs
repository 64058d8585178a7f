/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The captured response is too short to hold the requested fields.
    #[error("short frame ({got} bytes, need at least {needed})")]
    ShortFrame { needed: usize, got: usize },

    /// The requested ventilation level is outside 0..=3.
    #[error("invalid ventilation level {0} (expected 0..=3)")]
    InvalidLevel(i64),

    /// The level text is not a decimal number.
    #[error("invalid ventilation level {0:?} (expected 0..=3)")]
    UnparsableLevel(String),

    /// The unit reported a fan stage outside its 1..=4 encoding.
    #[error("fan stage byte {0:#04x} out of range (expected 0x01..=0x04)")]
    FanLevelOutOfRange(u8),

    /// The payload does not fit the one-byte length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The response does not begin with the `07 F0` start marker.
    #[error("missing frame start marker (expected 0x07 0xF0)")]
    BadStart,

    /// The response does not end with the `07 0F` terminator.
    #[error("missing frame terminator (expected 0x07 0x0F)")]
    BadTerminator,

    /// The declared payload length disagrees with the captured bytes.
    #[error("length mismatch (declared {declared} payload bytes, captured {captured})")]
    LengthMismatch { declared: usize, captured: usize },

    /// The checksum byte does not match the frame contents.
    #[error("checksum mismatch (expected {expected:#04x}, got {actual:#04x})")]
    BadChecksum { expected: u8, actual: u8 },

    /// A well-formed reply carries a different reply ID than requested.
    #[error("unexpected reply {actual:#06x} (expected {expected:#06x})")]
    UnexpectedReply { expected: u16, actual: u16 },
}

pub type Result<T> = std::result::Result<T, FrameError>;
