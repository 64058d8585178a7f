use bytes::{BufMut, Bytes, BytesMut};

use crate::command::SET_LEVEL_FRAMES;
use crate::error::{FrameError, Result};

/// Frame start marker.
pub const START: [u8; 2] = [0x07, 0xF0];

/// Frame terminator.
pub const END: [u8; 2] = [0x07, 0x0F];

/// Acknowledge pair the unit sends ahead of every reply.
pub const ACK: [u8; 2] = [0x07, 0xF3];

/// Added to the byte sum when computing a checksum.
pub const CHECKSUM_SEED: u8 = 173;

/// Start (2) + command (2) + length (1) + checksum (1) + terminator (2).
pub const FRAME_OVERHEAD: usize = 8;

/// Offset of the first payload byte inside a frame.
pub const PAYLOAD_OFFSET: usize = 5;

/// Largest payload the one-byte length field can describe.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// A structurally valid frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command or reply ID.
    pub command: u16,
    /// The payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(command: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            command,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }

    /// Encode this frame into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        encode_frame(self.command, self.payload.as_ref(), &mut dst)?;
        Ok(dst.freeze())
    }

    /// Encode this frame the way the unit sends it: acknowledge pair first.
    ///
    /// Telemetry offsets are defined against this layout.
    pub fn to_capture(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(ACK.len() + self.wire_size());
        dst.put_slice(&ACK);
        encode_frame(self.command, self.payload.as_ref(), &mut dst)?;
        Ok(dst.freeze())
    }
}

/// Compute the checksum over command, length and payload bytes.
///
/// The sum wraps at 256.
pub fn checksum(command: u16, payload: &[u8]) -> u8 {
    let [hi, lo] = command.to_be_bytes();
    payload
        .iter()
        .fold(
            CHECKSUM_SEED
                .wrapping_add(hi)
                .wrapping_add(lo)
                .wrapping_add(payload.len() as u8),
            |acc, b| acc.wrapping_add(*b),
        )
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬───────────┬────────┬──────────────┬──────────┬──────────┐
/// │ Start    │ Command   │ Length │ Payload      │ Checksum │ End      │
/// │ 07 F0    │ (2B BE)   │ (1B)   │ (Length B)   │ (1B)     │ 07 0F    │
/// └──────────┴───────────┴────────┴──────────────┴──────────┴──────────┘
/// ```
pub fn encode_frame(command: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(FRAME_OVERHEAD + payload.len());
    dst.put_slice(&START);
    dst.put_u16(command);
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
    dst.put_u8(checksum(command, payload));
    dst.put_slice(&END);
    Ok(())
}

/// Return the literal set-level frame for a published level (0-3).
pub fn encode_set_level(level: i64) -> Result<Bytes> {
    usize::try_from(level)
        .ok()
        .and_then(|idx| SET_LEVEL_FRAMES.get(idx))
        .map(|frame| Bytes::from_static(frame))
        .ok_or(FrameError::InvalidLevel(level))
}

/// Strictly parse a captured response.
///
/// Accepts an optional leading [`ACK`] pair, then checks the start marker,
/// declared length, checksum and terminator. Bytes after the terminator are
/// ignored.
pub fn parse_response(src: &[u8]) -> Result<Frame> {
    let body = src.strip_prefix(&ACK[..]).unwrap_or(src);

    if body.len() < FRAME_OVERHEAD {
        return Err(FrameError::ShortFrame {
            needed: FRAME_OVERHEAD,
            got: body.len(),
        });
    }

    if body[0..2] != START {
        return Err(FrameError::BadStart);
    }

    let command = u16::from_be_bytes([body[2], body[3]]);
    let declared = body[4] as usize;
    let captured = body.len() - FRAME_OVERHEAD;
    if captured < declared {
        return Err(FrameError::LengthMismatch { declared, captured });
    }

    let payload = &body[PAYLOAD_OFFSET..PAYLOAD_OFFSET + declared];
    let actual = body[PAYLOAD_OFFSET + declared];
    let expected = checksum(command, payload);
    if actual != expected {
        return Err(FrameError::BadChecksum { expected, actual });
    }

    let end = PAYLOAD_OFFSET + declared + 1;
    if body[end..end + 2] != END {
        return Err(FrameError::BadTerminator);
    }

    Ok(Frame::new(command, Bytes::copy_from_slice(payload)))
}

/// [`parse_response`] plus a check that the reply answers `expected`.
pub fn parse_reply(src: &[u8], expected: u16) -> Result<Frame> {
    let frame = parse_response(src)?;
    if frame.command != expected {
        return Err(FrameError::UnexpectedReply {
            expected,
            actual: frame.command,
        });
    }
    Ok(frame)
}
