//! Frame codec
//!
//! Encoding and decoding of length-prefixed record frames.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬─────────────────────────────┐
//! │ Len (4)  │         Payload             │
//! └──────────┴─────────────────────────────┘
//! ```
//! `Len` is the little-endian payload length. The payload is the bincode
//! encoding of a `Record` (fixed-width integers, little-endian), so the same
//! record always produces the same bytes.

use std::io::{ErrorKind, Read};

use bincode::Options;
use bytes::{BufMut, BytesMut};

use crate::error::{Result, VislogError};

use super::{Payload, Record};

/// Header size: 4 bytes payload length
pub const FRAME_HEADER_SIZE: usize = 4;

/// Maximum payload size (64 MB)
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(MAX_FRAME_SIZE as u64)
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a record into one frame
///
/// Format: payload_len (4) + payload
pub fn encode_frame(record: &Record) -> Result<Vec<u8>> {
    let payload = options().serialize(record)?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);

    Ok(frame)
}

/// Encode records back to back into `buf`
///
/// Returns the size of every frame in input order, so callers can derive
/// each record's byte range once the batch has been appended.
pub fn encode_frames<'a, I>(records: I, buf: &mut BytesMut) -> Result<Vec<u64>>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut sizes = Vec::new();
    for record in records {
        let payload = options().serialize(record)?;
        buf.reserve(FRAME_HEADER_SIZE + payload.len());
        buf.put_u32_le(payload.len() as u32);
        buf.put_slice(&payload);
        sizes.push((FRAME_HEADER_SIZE + payload.len()) as u64);
    }
    Ok(sizes)
}

// =============================================================================
// Decoding
// =============================================================================

/// Total size (header + payload) of the frame starting at `bytes[0]`
pub fn frame_len(bytes: &[u8]) -> Result<usize> {
    if bytes.len() < FRAME_HEADER_SIZE {
        return Err(VislogError::Truncated {
            needed: FRAME_HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let payload_len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);

    if payload_len > MAX_FRAME_SIZE {
        return Err(VislogError::Codec(format!(
            "Payload too large: {} bytes (max {})",
            payload_len, MAX_FRAME_SIZE
        )));
    }

    Ok(FRAME_HEADER_SIZE + payload_len as usize)
}

/// Decode the frame at the start of `bytes`
///
/// Returns the record and the number of bytes consumed
pub fn decode_frame(bytes: &[u8]) -> Result<(Record, usize)> {
    let total_len = frame_len(bytes)?;
    if bytes.len() < total_len {
        return Err(VislogError::Truncated {
            needed: total_len,
            available: bytes.len(),
        });
    }

    let record = options().deserialize(&bytes[FRAME_HEADER_SIZE..total_len])?;
    Ok((record, total_len))
}

/// Decode a byte range that must hold exactly one frame of kind `M`
pub fn decode_payload<M: Payload>(bytes: &[u8]) -> Result<M> {
    let (record, consumed) = decode_frame(bytes)?;
    if consumed != bytes.len() {
        return Err(VislogError::Codec(format!(
            "Range holds {} bytes but its frame is {} bytes",
            bytes.len(),
            consumed
        )));
    }
    M::from_record(record)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read the next frame from a stream
///
/// Returns `Ok(None)` on a clean end of stream (no bytes before the next
/// header). A header or payload cut short is `Truncated`.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<(Record, usize)>> {
    // Read header, distinguishing clean EOF from a partial header
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let mut filled = 0;
    while filled < FRAME_HEADER_SIZE {
        match reader.read(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    if filled == 0 {
        return Ok(None);
    }
    let total_len = frame_len(&header[..filled])?;

    // Read payload
    let mut frame = vec![0u8; total_len];
    frame[..FRAME_HEADER_SIZE].copy_from_slice(&header);
    let mut filled = FRAME_HEADER_SIZE;
    while filled < total_len {
        match reader.read(&mut frame[filled..]) {
            Ok(0) => {
                return Err(VislogError::Truncated {
                    needed: total_len,
                    available: filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    decode_frame(&frame).map(Some)
}
