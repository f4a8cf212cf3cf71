//! Journal frame layout.
//!
//! ```text
//! | magic "TSJ1" (4) | payload_len u32 LE (4) | checksum (4) | payload ... |
//! ```
//!
//! The checksum is the first four bytes of the SHA-256 of the payload.

use crate::codec::sha256;
use crate::error::{CoreError, CoreResult};

/// Magic bytes opening every frame.
pub const FRAME_MAGIC: [u8; 4] = *b"TSJ1";

/// Size of the fixed frame header.
pub const FRAME_HEADER_SIZE: usize = 12;

fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = sha256(payload);
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Wraps a payload into a frame.
#[must_use]
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    out.extend_from_slice(&FRAME_MAGIC);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&checksum(payload));
    out.extend_from_slice(payload);
    out
}

/// Result of scanning a journal buffer.
#[derive(Debug, Default)]
pub struct DecodedFrames {
    /// Payloads of every intact frame, in write order.
    pub payloads: Vec<Vec<u8>>,
    /// Length of the intact prefix; anything after it is a torn write.
    pub valid_len: u64,
}

/// Decodes every frame in `data`.
///
/// A partially written final frame is reported through `valid_len` so the
/// caller can truncate it. Damage anywhere before the final frame is
/// corruption.
pub fn decode_frames(data: &[u8]) -> CoreResult<DecodedFrames> {
    let mut decoded = DecodedFrames::default();
    let mut offset = 0usize;

    while offset < data.len() {
        let rest = &data[offset..];
        if rest.len() < FRAME_HEADER_SIZE {
            break;
        }
        if rest[0..4] != FRAME_MAGIC {
            return Err(CoreError::journal_corruption(
                offset as u64,
                "bad frame magic",
            ));
        }

        let len = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let end = FRAME_HEADER_SIZE + len;
        if rest.len() < end {
            break;
        }

        let payload = &rest[FRAME_HEADER_SIZE..end];
        if checksum(payload) != rest[8..12] {
            if offset + end == data.len() {
                // Torn final frame.
                break;
            }
            return Err(CoreError::journal_corruption(
                offset as u64,
                "checksum mismatch",
            ));
        }

        decoded.payloads.push(payload.to_vec());
        offset += end;
        decoded.valid_len = offset as u64;
    }

    Ok(decoded)
}
