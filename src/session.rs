//! Exchange session: connection lifecycle, request emission and
//! acknowledgment delivery.
//!
//! A connected session owns the write half of the stream and a reader task
//! on the read half. Each `send` queues an outstanding entry before the frame
//! is written; the reader pops entries in FIFO order as `RESPONSE` frames
//! arrive, calls the registered observer and resolves the caller's
//! [`PendingAck`].

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use futures::SinkExt;
use tokio::io::{AsyncRead, WriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tokio_stream::StreamExt;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::codec::FrameCodec;
use crate::frame::encode;
use crate::transport::Connector;
use crate::types::{ExchangeError, FrameKind, Result};

/// Acknowledgment observer. Receives `true` when the peer accepted a request.
pub type Observer = Arc<dyn Fn(bool) + Send + Sync>;

type ObserverSlot = Arc<Mutex<Option<Observer>>>;
type OutstandingQueue = Arc<Mutex<Outstanding>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Requests awaiting acknowledgment on one link.
///
/// `closed` is set under the same lock that drains `queue`, so no sender can
/// be queued after the link has stopped reading.
#[derive(Default)]
struct Outstanding {
    queue: VecDeque<oneshot::Sender<bool>>,
    closed: bool,
}

impl Outstanding {
    /// Mark the link closed and drop every queued sender.
    ///
    /// Returns how many requests were still waiting.
    fn close(&mut self) -> usize {
        self.closed = true;
        let n = self.queue.len();
        self.queue.clear();
        n
    }
}

/// Byte order used to pack an `i32` value into a request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadByteOrder {
    #[default]
    Big,
    Little,
}

impl PayloadByteOrder {
    /// Pack `value` into four bytes.
    pub fn encode_i32(self, value: i32) -> [u8; 4] {
        let mut buf = [0u8; 4];
        match self {
            PayloadByteOrder::Big => BigEndian::write_i32(&mut buf, value),
            PayloadByteOrder::Little => LittleEndian::write_i32(&mut buf, value),
        }
        buf
    }

    /// Read an `i32` from the first four bytes of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than 4 bytes.
    pub fn decode_i32(self, bytes: &[u8]) -> i32 {
        match self {
            PayloadByteOrder::Big => BigEndian::read_i32(bytes),
            PayloadByteOrder::Little => LittleEndian::read_i32(bytes),
        }
    }
}

/// Configuration for an exchange session
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Byte order of integer payloads built by [`Exchange::send`]
    pub byte_order: PayloadByteOrder,
    /// How long a [`PendingAck`] waits before failing with `AckTimeout`
    pub ack_timeout: Option<Duration>,
}

/// Connection lifecycle state of an [`Exchange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

struct Link<Io> {
    sink: FramedWrite<WriteHalf<Io>, FrameCodec>,
    reader: JoinHandle<()>,
    outstanding: OutstandingQueue,
}

impl<Io> Drop for Link<Io> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// One side of a request/acknowledgment exchange.
pub struct Exchange<C: Connector> {
    connector: C,
    config: SessionConfig,
    observer: ObserverSlot,
    link: Option<Link<C::Io>>,
    sent: u64,
}

impl<C: Connector> Exchange<C> {
    /// Create a disconnected session with the default configuration.
    pub fn new(connector: C) -> Self {
        Self::with_config(connector, SessionConfig::default())
    }

    /// Create a disconnected session with a custom configuration.
    pub fn with_config(connector: C, config: SessionConfig) -> Self {
        Self {
            connector,
            config,
            observer: Arc::new(Mutex::new(None)),
            link: None,
            sent: 0,
        }
    }

    /// Get the session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> SessionState {
        if self.link.is_some() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    /// Whether [`Exchange::connect`] has succeeded since the last disconnect.
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Number of requests written since the session was created.
    pub fn sent_count(&self) -> u64 {
        self.sent
    }

    /// Open the stream and start reading acknowledgments.
    ///
    /// Does nothing if already connected. A session whose stream was closed by
    /// the peer is reopened.
    pub async fn connect(&mut self) -> Result<()> {
        if let Some(link) = &self.link {
            if !lock(&link.outstanding).closed {
                debug!("Session already connected");
                return Ok(());
            }
            info!("Previous stream closed, reconnecting");
            self.link = None;
        }

        let io = self.connector.connect().await?;
        let (read_half, write_half) = tokio::io::split(io);

        let outstanding: OutstandingQueue = Arc::new(Mutex::new(Outstanding::default()));
        let reader = tokio::spawn(read_acknowledgments(
            FramedRead::new(read_half, FrameCodec::new()),
            outstanding.clone(),
            self.observer.clone(),
        ));

        self.link = Some(Link {
            sink: FramedWrite::new(write_half, FrameCodec::new()),
            reader,
            outstanding,
        });

        info!("Session connected");
        Ok(())
    }

    /// Close the stream.
    ///
    /// Outstanding [`PendingAck`]s resolve with `ConnectionClosed`. Does nothing
    /// if already disconnected.
    pub async fn disconnect(&mut self) -> Result<()> {
        let Some(mut link) = self.link.take() else {
            return Ok(());
        };

        if let Err(e) = link.sink.close().await {
            warn!("Error while closing stream: {}", e);
        }
        link.reader.abort();

        let dropped = lock(&link.outstanding).close();

        info!(
            "Session disconnected ({} acknowledgments outstanding)",
            dropped
        );
        Ok(())
    }

    /// Send `value` as a 4-byte `REQUEST` payload.
    pub async fn send(&mut self, value: i32) -> Result<PendingAck> {
        let payload = self.config.byte_order.encode_i32(value);
        self.send_payload(&payload).await
    }

    /// Send arbitrary bytes (at most 32) in a `REQUEST` frame.
    pub async fn send_payload(&mut self, payload: &[u8]) -> Result<PendingAck> {
        let ack_timeout = self.config.ack_timeout;

        let link = self.link.as_mut().ok_or(ExchangeError::NotConnected)?;
        let frame = encode(FrameKind::Request, payload)?;

        // Queue before writing so the acknowledgment can never beat its entry.
        let (tx, rx) = oneshot::channel();
        {
            let mut outstanding = lock(&link.outstanding);
            if outstanding.closed {
                return Err(ExchangeError::ConnectionClosed);
            }
            outstanding.queue.push_back(tx);
        }

        if let Err(e) = link.sink.send(frame).await {
            lock(&link.outstanding).queue.pop_back();
            error!("Failed to write request: {}", e);
            return Err(e);
        }

        self.sent += 1;
        debug!("Sent request #{} ({} bytes)", self.sent, frame.len());

        Ok(PendingAck {
            sequence: self.sent,
            rx,
            deadline: ack_timeout.map(|d| Box::pin(tokio::time::sleep(d))),
        })
    }

    /// Register the acknowledgment observer, replacing any previous one.
    pub fn on_acknowledgment<F>(&self, observer: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        *lock(&self.observer) = Some(Arc::new(observer));
    }

    /// Remove the acknowledgment observer.
    pub fn clear_observer(&self) {
        *lock(&self.observer) = None;
    }
}

/// Outcome of one sent request.
///
/// Resolves to `Ok(true)` if the peer accepted the request and `Ok(false)` if
/// it rejected it. Dropping the handle does not recall the frame, but the
/// observer is not called for it.
#[must_use = "dropping a PendingAck suppresses its acknowledgment callback"]
#[derive(Debug)]
pub struct PendingAck {
    sequence: u64,
    rx: oneshot::Receiver<bool>,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl PendingAck {
    /// Position of the request in its session, starting at 1.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Future for PendingAck {
    type Output = Result<bool>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Poll::Ready(result) = Pin::new(&mut this.rx).poll(cx) {
            return Poll::Ready(result.map_err(|_| ExchangeError::ConnectionClosed));
        }

        if let Some(deadline) = this.deadline.as_mut() {
            if deadline.as_mut().poll(cx).is_ready() {
                return Poll::Ready(Err(ExchangeError::AckTimeout));
            }
        }

        Poll::Pending
    }
}

async fn read_acknowledgments<R>(
    mut frames: FramedRead<R, FrameCodec>,
    outstanding: OutstandingQueue,
    observer: ObserverSlot,
) where
    R: AsyncRead + Unpin,
{
    loop {
        match frames.try_next().await {
            Ok(Some(frame)) => {
                if frame.kind() != FrameKind::Response {
                    warn!("Ignoring unexpected {} frame from peer", frame.kind());
                    continue;
                }

                let accepted = frame.ack_status().unwrap_or_else(|| {
                    warn!(
                        "Malformed acknowledgment ({} bytes), treating as rejected",
                        frame.len()
                    );
                    false
                });

                let Some(tx) = lock(&outstanding).queue.pop_front() else {
                    warn!("Acknowledgment with no outstanding request");
                    continue;
                };

                if tx.is_closed() {
                    debug!("Acknowledgment for a dropped handle, callback suppressed");
                    continue;
                }

                let current = lock(&observer).clone();
                if let Some(notify) = current {
                    notify(accepted);
                }
                let _ = tx.send(accepted);
            }
            Ok(None) => {
                info!("Peer closed the stream");
                break;
            }
            Err(e) => {
                error!("Failed to read acknowledgment: {}", e);
                break;
            }
        }
    }

    lock(&outstanding).close();
}
