//! In-memory transport with a built-in responder.

use std::io;

use tokio::io::DuplexStream;
use tracing::{debug, error};

use super::responder::{AckPolicy, Responder};
use super::Connector;

/// Default buffer size of each duplex pipe.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Connector that pairs every session with an in-process [`Responder`].
///
/// Each `connect` creates a fresh `tokio::io::duplex` pipe and spawns a
/// responder task on the far end, so it must be called inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct Loopback {
    policy: AckPolicy,
    buffer_size: usize,
    next_session_id: u64,
}

impl Loopback {
    /// Create a loopback whose responders answer according to `policy`.
    pub fn new(policy: AckPolicy) -> Self {
        Self {
            policy,
            buffer_size: DEFAULT_BUFFER_SIZE,
            next_session_id: 1,
        }
    }

    /// Set the buffer size of each duplex pipe.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }
}

impl Default for Loopback {
    fn default() -> Self {
        Self::new(AckPolicy::default())
    }
}

impl Connector for Loopback {
    type Io = DuplexStream;

    async fn connect(&mut self) -> io::Result<DuplexStream> {
        let (local, remote) = tokio::io::duplex(self.buffer_size);

        let session_id = self.next_session_id;
        self.next_session_id += 1;

        let responder = Responder::new(self.policy.clone());
        tokio::spawn(async move {
            if let Err(e) = responder.serve(session_id, remote).await {
                error!("Loopback responder {} failed: {}", session_id, e);
            }
        });

        debug!("Loopback session {} opened", session_id);
        Ok(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FrameCodec;
    use crate::types::Frame;
    use futures::{SinkExt, StreamExt};
    use tokio_util::codec::Framed;

    #[tokio::test]
    async fn test_each_connect_gets_a_responder() {
        let mut loopback = Loopback::default();

        for _ in 0..2 {
            let io = loopback.connect().await.unwrap();
            let mut framed = Framed::new(io, FrameCodec::new());
            framed.send(Frame::request(b"ping").unwrap()).await.unwrap();
            let reply = framed.next().await.unwrap().unwrap();
            assert_eq!(reply.ack_status(), Some(true));
        }
        assert_eq!(loopback.next_session_id, 3);
    }
}
