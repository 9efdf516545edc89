//! Frame encoding and decoding.
//!
//! Every frame occupies exactly [`FRAME_SIZE`] bytes:
//!
//! ```text
//! +----------+-----------------+------------------------------+
//! | Kind (1) | Length (2, BE)  | Payload (32, zero-padded)    |
//! +----------+-----------------+------------------------------+
//! ```
//!
//! Fields are written at explicit offsets, so the layout does not depend on
//! how the compiler lays out [`Frame`] in memory.

use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, BytesMut};

use crate::types::{ExchangeError, Frame, FrameKind, Result, FRAME_SIZE, PAYLOAD_CAPACITY};

const KIND_OFFSET: usize = 0;
const LENGTH_OFFSET: usize = 1;
const PAYLOAD_OFFSET: usize = 3;

/// Wrap `payload` in a frame of the given kind.
pub fn encode(kind: FrameKind, payload: &[u8]) -> Result<Frame> {
    Frame::new(kind, payload)
}

/// Parse one frame from the first [`FRAME_SIZE`] bytes of `bytes`.
///
/// Trailing bytes are ignored. Padding past `length` is dropped, so the
/// returned frame always carries a zeroed tail.
pub fn decode(bytes: &[u8]) -> Result<Frame> {
    if bytes.len() < FRAME_SIZE {
        return Err(ExchangeError::TruncatedFrame {
            len: bytes.len(),
            expected: FRAME_SIZE,
        });
    }

    let kind = FrameKind::try_from(bytes[KIND_OFFSET])?;

    let length = BigEndian::read_u16(&bytes[LENGTH_OFFSET..PAYLOAD_OFFSET]);
    if length as usize > PAYLOAD_CAPACITY {
        return Err(ExchangeError::CorruptLength(length));
    }

    let start = PAYLOAD_OFFSET;
    Frame::new(kind, &bytes[start..start + length as usize])
}

/// Write `frame` into its fixed wire form.
pub fn serialize(frame: &Frame) -> [u8; FRAME_SIZE] {
    let mut buf = [0u8; FRAME_SIZE];
    serialize_into(frame, &mut buf);
    buf
}

/// Write `frame` into the first [`FRAME_SIZE`] bytes of `buf`.
///
/// # Panics
///
/// Panics if `buf` is shorter than [`FRAME_SIZE`].
pub fn serialize_into(frame: &Frame, buf: &mut [u8]) {
    let payload = frame.payload();

    buf[KIND_OFFSET] = frame.kind().as_u8();
    BigEndian::write_u16(&mut buf[LENGTH_OFFSET..PAYLOAD_OFFSET], payload.len() as u16);

    let slot = &mut buf[PAYLOAD_OFFSET..FRAME_SIZE];
    slot[..payload.len()].copy_from_slice(payload);
    slot[payload.len()..].fill(0);
}

/// Inverse of [`serialize`].
pub fn deserialize(bytes: &[u8]) -> Result<Frame> {
    decode(bytes)
}

/// Encode a frame to a freshly allocated byte vector.
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    serialize(frame).to_vec()
}

/// Take one frame off the front of `buf`.
///
/// Returns `Ok(None)` if fewer than [`FRAME_SIZE`] bytes are buffered. On a
/// decode error the offending frame's bytes are still consumed.
pub fn try_decode_frame(buf: &mut BytesMut) -> Result<Option<Frame>> {
    if buf.len() < FRAME_SIZE {
        return Ok(None);
    }

    let result = decode(&buf[..FRAME_SIZE]);
    buf.advance(FRAME_SIZE);
    result.map(Some)
}
