//! # ackframe
//!
//! Fixed-size binary frames and a request/acknowledgment exchange that runs
//! over any async byte stream.
//!
//! ## Quick Start
//!
//! ```rust
//! use ackframe::{Exchange, Loopback};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ackframe::ExchangeError> {
//! let mut session = Exchange::new(Loopback::default());
//! session.on_acknowledgment(|accepted| println!("accepted: {}", accepted));
//!
//! session.connect().await?;
//! let ack = session.send(42).await?;
//! assert!(ack.await?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Wire Format
//!
//! Every frame is exactly 35 bytes:
//!
//! | Offset | Size | Field   | Encoding                           |
//! |--------|------|---------|------------------------------------|
//! | 0      | 1    | kind    | `0x00` REQUEST, `0x01` RESPONSE    |
//! | 1      | 2    | length  | unsigned, big-endian, at most 32   |
//! | 3      | 32   | payload | raw bytes, zero-padded past length |
//!
//! A peer acknowledges each REQUEST with one RESPONSE whose single payload
//! byte is `0x01` (accepted) or `0x00` (rejected). Acknowledgments arrive in
//! the order the requests were sent.

pub mod codec;
pub mod frame;
pub mod session;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use types::{
    ExchangeError, Frame, FrameKind, Result, ACK_ACCEPTED, ACK_REJECTED, FRAME_SIZE,
    PAYLOAD_CAPACITY,
};

pub use codec::FrameCodec;
pub use frame::{decode, deserialize, encode, encode_frame, serialize, try_decode_frame};
pub use session::{Exchange, Observer, PayloadByteOrder, PendingAck, SessionConfig, SessionState};
pub use transport::{AckPolicy, Connector, Established, Loopback, Responder};
