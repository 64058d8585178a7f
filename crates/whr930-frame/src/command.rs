//! Command IDs and the literal request frames sent to the unit.
//!
//! Commands are 16-bit big-endian on the wire. Requests use even IDs; the
//! unit answers with the matching reply ID.

/// Read temperature sensors (T1-T4 plus flags).
pub const GET_TEMPERATURES: u16 = 0x000F;

/// Reply to [`GET_TEMPERATURES`].
pub const TEMPERATURES_REPLY: u16 = 0x00D2;

/// Read fan status (configured and actual air levels, current stage).
pub const GET_FAN_STATUS: u16 = 0x00CD;

/// Reply to [`GET_FAN_STATUS`].
pub const FAN_STATUS_REPLY: u16 = 0x00CE;

/// Set ventilation stage. One payload byte, 1-indexed stage.
pub const SET_LEVEL: u16 = 0x0099;

/// Read-temperatures request, `07 F0 00 0F 00 BC 07 0F`.
pub static READ_TEMPERATURES: [u8; 8] = [0x07, 0xF0, 0x00, 0x0F, 0x00, 0xBC, 0x07, 0x0F];

/// Read-fan-status request, `07 F0 00 CD 00 7A 07 0F`.
pub static READ_FAN_STATUS: [u8; 8] = [0x07, 0xF0, 0x00, 0xCD, 0x00, 0x7A, 0x07, 0x0F];

/// Set-level frames indexed by published level (0-3).
pub static SET_LEVEL_FRAMES: [[u8; 9]; 4] = [
    [0x07, 0xF0, 0x00, 0x99, 0x01, 0x01, 0x48, 0x07, 0x0F],
    [0x07, 0xF0, 0x00, 0x99, 0x01, 0x02, 0x49, 0x07, 0x0F],
    [0x07, 0xF0, 0x00, 0x99, 0x01, 0x03, 0x4A, 0x07, 0x0F],
    [0x07, 0xF0, 0x00, 0x99, 0x01, 0x04, 0x4B, 0x07, 0x0F],
];

/// Returns a human-readable name for a command ID.
pub fn command_name(id: u16) -> &'static str {
    match id {
        GET_TEMPERATURES => "GET_TEMPERATURES",
        TEMPERATURES_REPLY => "TEMPERATURES_REPLY",
        GET_FAN_STATUS => "GET_FAN_STATUS",
        FAN_STATUS_REPLY => "FAN_STATUS_REPLY",
        SET_LEVEL => "SET_LEVEL",
        _ => "UNKNOWN",
    }
}

