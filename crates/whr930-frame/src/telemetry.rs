//! Offset-based decoding of the two telemetry replies.
//!
//! Offsets are counted from the first captured byte, i.e. they include the
//! leading `07 F3` acknowledge pair. No header or checksum check happens
//! here; see [`crate::parse_response`] for that.

use std::fmt;
use std::str::FromStr;

use crate::error::{FrameError, Result};

/// First temperature byte (outside air, T1).
pub const TEMPERATURE_OFFSET: usize = 7;

/// Minimum capture length for [`decode_temperatures`].
pub const TEMPERATURES_MIN_LEN: usize = 11;

/// Return air level byte.
pub const RETURN_AIR_OFFSET: usize = 13;

/// Supply air level byte.
pub const SUPPLY_AIR_OFFSET: usize = 14;

/// Current fan stage byte (1-indexed on the wire).
pub const FAN_STAGE_OFFSET: usize = 15;

/// Minimum capture length for [`decode_fan_status`].
pub const FAN_STATUS_MIN_LEN: usize = 16;

/// Highest ventilation level the unit accepts.
pub const MAX_LEVEL: u8 = 3;

/// The four air temperatures in °C.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Temperatures {
    pub outside: f32,
    pub supply: f32,
    pub return_air: f32,
    pub exhaust: f32,
}

/// Fan status as reported by the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FanStatus {
    /// Raw return (extract) air level, percent.
    pub return_air_level: u8,
    /// Raw supply air level, percent.
    pub supply_air_level: u8,
    /// Current ventilation level.
    pub fan_level: VentilationLevel,
}

/// A ventilation level in `0..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(transparent))]
pub struct VentilationLevel(u8);

impl VentilationLevel {
    /// Create a level, rejecting anything above 3.
    pub fn new(level: u8) -> Option<Self> {
        (level <= MAX_LEVEL).then_some(Self(level))
    }

    /// Numeric level as published on the bus.
    pub fn get(self) -> u8 {
        self.0
    }

    /// The stage byte the unit uses for this level (1-indexed).
    pub fn device_stage(self) -> u8 {
        self.0 + 1
    }

    /// Map a 1-indexed stage byte from the unit to a level.
    pub fn from_device_stage(stage: u8) -> Result<Self> {
        stage
            .checked_sub(1)
            .and_then(Self::new)
            .ok_or(FrameError::FanLevelOutOfRange(stage))
    }
}

impl TryFrom<i64> for VentilationLevel {
    type Error = FrameError;

    fn try_from(value: i64) -> Result<Self> {
        u8::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or(FrameError::InvalidLevel(value))
    }
}

impl FromStr for VentilationLevel {
    type Err = FrameError;

    /// Parses a decimal level; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let value: i64 = text
            .parse()
            .map_err(|_| FrameError::UnparsableLevel(text.to_string()))?;
        Self::try_from(value)
    }
}

impl fmt::Display for VentilationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Convert a raw sensor byte: half a degree per count, -20 °C offset.
pub fn raw_to_celsius(raw: u8) -> f32 {
    f32::from(raw) / 2.0 - 20.0
}

fn require_len(src: &[u8], needed: usize) -> Result<()> {
    if src.len() < needed {
        return Err(FrameError::ShortFrame {
            needed,
            got: src.len(),
        });
    }
    Ok(())
}

/// Decode the reply to a read-temperatures request.
pub fn decode_temperatures(src: &[u8]) -> Result<Temperatures> {
    require_len(src, TEMPERATURES_MIN_LEN)?;
    let t = &src[TEMPERATURE_OFFSET..TEMPERATURES_MIN_LEN];
    Ok(Temperatures {
        outside: raw_to_celsius(t[0]),
        supply: raw_to_celsius(t[1]),
        return_air: raw_to_celsius(t[2]),
        exhaust: raw_to_celsius(t[3]),
    })
}

/// Decode the reply to a read-fan-status request.
pub fn decode_fan_status(src: &[u8]) -> Result<FanStatus> {
    require_len(src, FAN_STATUS_MIN_LEN)?;
    Ok(FanStatus {
        return_air_level: src[RETURN_AIR_OFFSET],
        supply_air_level: src[SUPPLY_AIR_OFFSET],
        fan_level: VentilationLevel::from_device_stage(src[FAN_STAGE_OFFSET])?,
    })
}
