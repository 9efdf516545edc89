//! `tokio_util` codec for moving frames over a byte stream.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{serialize, try_decode_frame};
use crate::types::{ExchangeError, Frame, FRAME_SIZE};

/// Fixed-size frame codec for use with `Framed`, `FramedRead` and `FramedWrite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Create a new frame codec.
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ExchangeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FRAME_SIZE {
            src.reserve(FRAME_SIZE - src.len());
            return Ok(None);
        }
        try_decode_frame(src)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ExchangeError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&serialize(&item));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FrameKind;

    #[test]
    fn test_encode_then_decode_sequence() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let frames = [
            Frame::request(&1i32.to_be_bytes()).unwrap(),
            Frame::ack(true),
            Frame::new(FrameKind::Request, &[]).unwrap(),
        ];
        for frame in frames {
            codec.encode(frame, &mut buf).unwrap();
        }
        assert_eq!(buf.len(), 3 * FRAME_SIZE);

        for expected in frames {
            assert_eq!(codec.decode(&mut buf).unwrap(), Some(expected));
        }
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_decode_waits_for_full_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&serialize(&Frame::ack(false))[..10]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.capacity() >= FRAME_SIZE);
    }

    #[test]
    fn test_decode_reports_unknown_tag() {
        let mut codec = FrameCodec::new();
        let mut bytes = serialize(&Frame::ack(true));
        bytes[0] = 2;
        let mut buf = BytesMut::from(&bytes[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ExchangeError::UnknownFrameType(2))
        ));
    }
}
