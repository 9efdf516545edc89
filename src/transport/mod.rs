//! Byte-stream transports for the exchange session.
//!
//! A session never opens sockets itself. It asks a [`Connector`] for a stream
//! and runs the frame protocol over whatever comes back.

use std::future::Future;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

pub mod loopback;
pub mod responder;

pub use loopback::Loopback;
pub use responder::{AckPolicy, Responder};

/// Source of byte streams for an exchange session.
pub trait Connector {
    type Io: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Open a new stream to the peer.
    fn connect(&mut self) -> impl Future<Output = io::Result<Self::Io>> + Send;
}

/// Connector over a stream the caller already holds.
///
/// Hands the stream out once; a second `connect` fails with
/// [`io::ErrorKind::NotConnected`].
#[derive(Debug)]
pub struct Established<T> {
    io: Option<T>,
}

impl<T> Established<T> {
    /// Wrap a stream that is already connected to the peer.
    pub fn new(io: T) -> Self {
        Self { io: Some(io) }
    }
}

impl<T> Connector for Established<T>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    type Io = T;

    async fn connect(&mut self) -> io::Result<T> {
        self.io.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "stream already handed out")
        })
    }
}
