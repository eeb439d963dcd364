//! Length-prefixed JSON frame codec.
//!
//! Every frame is a 4-byte big-endian payload length followed by exactly
//! that many bytes of JSON. The prefix lets the reader size its buffer
//! before parsing and reject oversized frames up front.

use serde::{Serialize, de::DeserializeOwned};

use crate::errors::ProtocolError;

/// Size of the big-endian length prefix in bytes.
pub const LEN_PREFIX_SIZE: usize = 4;

/// Maximum payload size per frame: 1 MiB.
pub const MAX_FRAME_SIZE: usize = 1 << 20;

/// Encode `value` as a length-prefixed JSON frame.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    let payload = serde_json::to_vec(value)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: payload.len(), max: MAX_FRAME_SIZE });
    }

    let mut frame = Vec::with_capacity(LEN_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Read the payload length from a frame prefix.
///
/// Returns `None` until all [`LEN_PREFIX_SIZE`] bytes are available, and an
/// error when the declared length exceeds [`MAX_FRAME_SIZE`].
pub fn payload_len(prefix: &[u8]) -> Result<Option<usize>, ProtocolError> {
    let Some(bytes) = prefix.get(..LEN_PREFIX_SIZE) else {
        return Ok(None);
    };
    let mut buf = [0u8; LEN_PREFIX_SIZE];
    buf.copy_from_slice(bytes);

    let len = u32::from_be_bytes(buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: len, max: MAX_FRAME_SIZE });
    }
    Ok(Some(len))
}

/// Decode one complete frame, returning the value and the total bytes
/// consumed (prefix plus payload).
pub fn decode_frame<T: DeserializeOwned>(frame: &[u8]) -> Result<(T, usize), ProtocolError> {
    let Some(len) = payload_len(frame)? else {
        return Err(ProtocolError::Truncated { expected: LEN_PREFIX_SIZE, got: frame.len() });
    };

    let payload = frame
        .get(LEN_PREFIX_SIZE..LEN_PREFIX_SIZE + len)
        .ok_or(ProtocolError::Truncated {
            expected: len,
            got: frame.len().saturating_sub(LEN_PREFIX_SIZE),
        })?;

    let value = serde_json::from_slice(payload)?;
    Ok((value, LEN_PREFIX_SIZE + len))
}
