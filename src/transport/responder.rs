//! Peer side of the exchange: answers requests with acknowledgments.

use std::fmt;
use std::sync::Arc;

use futures::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

use crate::codec::FrameCodec;
use crate::types::{Frame, FrameKind, Result};

/// Decides whether the responder accepts a request.
#[derive(Clone, Default)]
pub enum AckPolicy {
    #[default]
    AcceptAll,
    RejectAll,
    Custom(Arc<dyn Fn(&Frame) -> bool + Send + Sync>),
}

impl AckPolicy {
    /// Build a policy from a predicate over the incoming request.
    pub fn custom<F>(decide: F) -> Self
    where
        F: Fn(&Frame) -> bool + Send + Sync + 'static,
    {
        AckPolicy::Custom(Arc::new(decide))
    }

    /// Whether a request should be acknowledged as accepted.
    pub fn accepts(&self, frame: &Frame) -> bool {
        match self {
            AckPolicy::AcceptAll => true,
            AckPolicy::RejectAll => false,
            AckPolicy::Custom(decide) => decide(frame),
        }
    }
}

impl fmt::Debug for AckPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckPolicy::AcceptAll => f.write_str("AcceptAll"),
            AckPolicy::RejectAll => f.write_str("RejectAll"),
            AckPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Serves one stream, replying to every `REQUEST` frame with one `RESPONSE`.
#[derive(Debug, Clone, Default)]
pub struct Responder {
    policy: AckPolicy,
}

impl Responder {
    /// Create a responder that answers according to `policy`.
    pub fn new(policy: AckPolicy) -> Self {
        Self { policy }
    }

    /// Run until the stream closes or a frame fails to decode.
    ///
    /// Returns the number of requests acknowledged.
    pub async fn serve<T>(&self, session_id: u64, io: T) -> Result<u64>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        info!("Starting responder session {}", session_id);

        let mut framed = Framed::new(io, FrameCodec::new());
        let mut answered = 0u64;

        loop {
            match framed.try_next().await {
                Ok(Some(frame)) => {
                    if frame.kind() != FrameKind::Request {
                        warn!(
                            "Session {} ignoring unexpected {} frame",
                            session_id, frame.kind()
                        );
                        continue;
                    }

                    let accepted = self.policy.accepts(&frame);
                    debug!(
                        "Session {} request of {} bytes -> {}",
                        session_id,
                        frame.len(),
                        if accepted { "accepted" } else { "rejected" }
                    );
                    framed.send(Frame::ack(accepted)).await?;
                    answered += 1;
                }
                Ok(None) => {
                    info!("Session {} stream closed", session_id);
                    break;
                }
                Err(e) => {
                    error!("Session {} frame error: {}", session_id, e);
                    return Err(e);
                }
            }
        }

        info!(
            "Session {} ended after {} acknowledgments",
            session_id, answered
        );
        Ok(answered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::serialize;
    use crate::types::ExchangeError;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_answers_each_request() {
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(async move { Responder::default().serve(1, server).await });

        client
            .write_all(&serialize(&Frame::request(b"one").unwrap()))
            .await
            .unwrap();
        client
            .write_all(&serialize(&Frame::request(b"two").unwrap()))
            .await
            .unwrap();

        let mut reply = [0u8; 70];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply[..35], &serialize(&Frame::ack(true))[..]);
        assert_eq!(&reply[35..], &serialize(&Frame::ack(true))[..]);

        drop(client);
        assert_eq!(task.await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_skips_response_frames() {
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(async move {
            Responder::new(AckPolicy::RejectAll).serve(2, server).await
        });

        client
            .write_all(&serialize(&Frame::ack(true)))
            .await
            .unwrap();
        client
            .write_all(&serialize(&Frame::request(&[]).unwrap()))
            .await
            .unwrap();

        let mut reply = [0u8; 35];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, serialize(&Frame::ack(false)));

        drop(client);
        assert_eq!(task.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stops_on_bad_frame() {
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(async move { Responder::default().serve(3, server).await });

        let mut bytes = serialize(&Frame::request(b"x").unwrap());
        bytes[0] = 9;
        client.write_all(&bytes).await.unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(ExchangeError::UnknownFrameType(9))));
    }

    #[test]
    fn test_custom_policy() {
        let policy = AckPolicy::custom(|frame| frame.payload() == b"yes");
        assert!(policy.accepts(&Frame::request(b"yes").unwrap()));
        assert!(!policy.accepts(&Frame::request(b"no").unwrap()));
        assert_eq!(format!("{:?}", policy), "Custom(..)");
    }
}
