//! Core types: frame kinds, the frame record and the error type.

use std::fmt;
use thiserror::Error;

/// Capacity of the payload buffer carried by every frame.
pub const PAYLOAD_CAPACITY: usize = 32;

/// Size of one frame on the wire: kind (1) + length (2) + payload (32).
pub const FRAME_SIZE: usize = 1 + 2 + PAYLOAD_CAPACITY;

/// Payload byte of an acknowledgment that accepts the request.
pub const ACK_ACCEPTED: u8 = 0x01;

/// Payload byte of an acknowledgment that rejects the request.
pub const ACK_REJECTED: u8 = 0x00;

/// Frame kind tag, stored as a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    Request = 0x00,
    Response = 0x01,
}

impl FrameKind {
    /// Wire value of this kind.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FrameKind {
    type Error = ExchangeError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0x00 => Ok(FrameKind::Request),
            0x01 => Ok(FrameKind::Response),
            other => Err(ExchangeError::UnknownFrameType(other)),
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Request => f.write_str("REQUEST"),
            FrameKind::Response => f.write_str("RESPONSE"),
        }
    }
}

/// One fixed-size message unit.
///
/// Fields are private: [`Frame::new`] and [`Frame::ack`] are the only
/// constructors, so `length` never exceeds [`PAYLOAD_CAPACITY`] and bytes of
/// the buffer past `length` are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    kind: FrameKind,
    length: u16,
    payload: [u8; PAYLOAD_CAPACITY],
}

impl Frame {
    /// Build a frame, copying `payload` left-justified into a zeroed buffer.
    pub fn new(kind: FrameKind, payload: &[u8]) -> Result<Self> {
        if payload.len() > PAYLOAD_CAPACITY {
            return Err(ExchangeError::PayloadTooLarge {
                size: payload.len(),
                max: PAYLOAD_CAPACITY,
            });
        }

        let mut buf = [0u8; PAYLOAD_CAPACITY];
        buf[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            kind,
            length: payload.len() as u16,
            payload: buf,
        })
    }

    /// Build a `REQUEST` frame.
    pub fn request(payload: &[u8]) -> Result<Self> {
        Self::new(FrameKind::Request, payload)
    }

    /// Build a `RESPONSE` frame.
    pub fn response(payload: &[u8]) -> Result<Self> {
        Self::new(FrameKind::Response, payload)
    }

    /// Build the acknowledgment frame a peer sends back for a request.
    pub fn ack(accepted: bool) -> Self {
        let mut payload = [0u8; PAYLOAD_CAPACITY];
        payload[0] = if accepted { ACK_ACCEPTED } else { ACK_REJECTED };
        Self {
            kind: FrameKind::Response,
            length: 1,
            payload,
        }
    }

    /// Kind tag of this frame.
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Number of meaningful payload bytes, at most [`PAYLOAD_CAPACITY`].
    pub fn len(&self) -> usize {
        self.length as usize
    }

    /// Whether the payload carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The meaningful bytes of the payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.length as usize]
    }

    /// Interpret this frame as an acknowledgment.
    ///
    /// Returns `None` unless it is a `RESPONSE` carrying exactly one status byte
    /// with a known value.
    pub fn ack_status(&self) -> Option<bool> {
        if self.kind != FrameKind::Response {
            return None;
        }
        match self.payload() {
            [ACK_ACCEPTED] => Some(true),
            [ACK_REJECTED] => Some(false),
            _ => None,
        }
    }
}

/// Errors produced by the codec and the exchange session.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("not connected")]
    NotConnected,

    #[error("payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("truncated frame: got {len} bytes, need {expected}")]
    TruncatedFrame { len: usize, expected: usize },

    #[error("unknown frame type: {0:#04x}")]
    UnknownFrameType(u8),

    #[error("corrupt length field: {0} exceeds payload capacity")]
    CorruptLength(u16),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("acknowledgment timed out")]
    AckTimeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`ExchangeError`].
pub type Result<T> = std::result::Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_is_exactly_35() {
        assert_eq!(FRAME_SIZE, 35);
    }

    #[test]
    fn test_kind_from_byte() {
        assert_eq!(FrameKind::try_from(0u8).unwrap(), FrameKind::Request);
        assert_eq!(FrameKind::try_from(1u8).unwrap(), FrameKind::Response);
        assert!(matches!(
            FrameKind::try_from(2u8),
            Err(ExchangeError::UnknownFrameType(2))
        ));
    }

    #[test]
    fn test_new_zero_fills_tail() {
        let frame = Frame::request(b"abc").unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.kind(), FrameKind::Request);
        assert_eq!(&frame.payload[..3], b"abc");
        assert!(frame.payload[3..].iter().all(|&b| b == 0));
        assert_eq!(frame.payload(), b"abc");
    }

    #[test]
    fn test_constructed_frames_stay_within_capacity() {
        for len in [0, 1, 31, 32] {
            let frame = Frame::response(&vec![1u8; len]).unwrap();
            assert_eq!(frame.len(), len);
            assert_eq!(frame.is_empty(), len == 0);
            assert_eq!(frame.payload().len(), len);
        }
        for len in [33, 40, usize::from(u16::MAX) + 1] {
            assert!(matches!(
                Frame::request(&vec![1u8; len]),
                Err(ExchangeError::PayloadTooLarge { .. })
            ));
        }
        assert_eq!(Frame::ack(true).len(), 1);
    }

    #[test]
    fn test_new_rejects_oversized_payload() {
        let err = Frame::request(&[0u8; 33]).unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::PayloadTooLarge { size: 33, max: 32 }
        ));
    }

    #[test]
    fn test_ack_status() {
        assert_eq!(Frame::ack(true).ack_status(), Some(true));
        assert_eq!(Frame::ack(false).ack_status(), Some(false));
        assert_eq!(Frame::response(b"").unwrap().ack_status(), None);
        assert_eq!(Frame::response(&[7]).unwrap().ack_status(), None);
        assert_eq!(Frame::request(&[ACK_ACCEPTED]).unwrap().ack_status(), None);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(ExchangeError::NotConnected.to_string(), "not connected");
        assert_eq!(
            ExchangeError::UnknownFrameType(2).to_string(),
            "unknown frame type: 0x02"
        );
    }
}
