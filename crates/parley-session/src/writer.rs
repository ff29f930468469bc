//! The single serialized write path.
//!
//! Two tasks write to the socket: the presence poller and whoever is
//! sending chat messages. A frame is written with `write_all`, which may
//! take several `write` calls; if two frames were written at once their
//! bytes could interleave and the server would see garbage.
//!
//! [`MessageWriter`] owns the write half behind a `tokio::sync::Mutex`.
//! Encoding, framing, and writing happen while holding the lock, so each
//! frame reaches the stream as one contiguous block. The mutex is fair
//! (FIFO), so a busy poller cannot starve the UI.
//!
//! Shutdown takes the same lock. It waits for an in-flight write to
//! finish, then closes the stream; every later `send` gets
//! [`SessionError::Closed`]. A writer built with
//! [`cancel_on`](MessageWriter::cancel_on) refuses to start a frame once
//! the session's cancellation signal is raised. A frame that is already
//! being written is allowed to finish: it gets `close_grace` from the
//! moment of cancellation, and is only abandoned if the peer has stopped
//! reading for that long.

use std::time::Duration;

use parley_protocol::{Codec, JsonCodec, Message, ProtocolError, encode_frame, write_frame};
use parley_transport::TransportError;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, watch};

use crate::lifecycle::cancelled;
use crate::{SessionConfig, SessionError};

struct Sink<W> {
    inner: W,
    /// No more frames may be written.
    closed: bool,
    /// `shutdown` has already run on `inner`.
    shut_down: bool,
}

/// Serializes every outgoing frame onto one write half.
pub struct MessageWriter<W, C = JsonCodec> {
    sink: Mutex<Sink<W>>,
    codec: C,
    max_frame_len: usize,
    write_timeout: Option<Duration>,
    close_grace: Duration,
    cancel: Option<watch::Receiver<bool>>,
}

impl<W, C> MessageWriter<W, C>
where
    W: AsyncWrite + Unpin + Send,
    C: Codec,
{
    pub fn new(inner: W, codec: C, config: &SessionConfig) -> Self {
        Self {
            sink: Mutex::new(Sink {
                inner,
                closed: false,
                shut_down: false,
            }),
            codec,
            max_frame_len: config.max_frame_len,
            write_timeout: config.write_timeout,
            close_grace: config.close_grace,
            cancel: None,
        }
    }

    /// Refuses new writes once `cancel` is `true`. A write in progress
    /// keeps going for up to `close_grace` after that.
    pub fn cancel_on(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Encodes `message` and writes it as one frame.
    ///
    /// # Errors
    /// - [`SessionError::Closed`]: the writer was shut down, an earlier
    ///   write failed, or the cancellation signal was raised.
    /// - [`SessionError::Encode`]: the message couldn't be encoded or is
    ///   over the frame limit. Nothing was written and the writer is
    ///   still usable.
    /// - [`SessionError::Write`]: the stream failed (or timed out). The
    ///   writer is now closed, since a partial frame may be on the wire.
    pub async fn send(&self, message: &Message) -> Result<(), SessionError> {
        let mut sink = self.sink.lock().await;
        if sink.closed {
            return Err(SessionError::Closed);
        }

        if self.cancel.as_ref().is_some_and(|cancel| *cancel.borrow()) {
            sink.closed = true;
            tracing::debug!(kind = %message.kind(), "session cancelled, frame not sent");
            return Err(SessionError::Closed);
        }

        let payload = self.codec.encode(message).map_err(SessionError::Encode)?;
        let frame =
            encode_frame(&payload, self.max_frame_len).map_err(SessionError::Encode)?;

        let write = timed_write(&mut sink.inner, &frame, self.write_timeout);
        let result = match self.cancel.clone() {
            Some(mut cancel) => {
                let grace = self.close_grace;
                tokio::select! {
                    result = write => Some(result),
                    _ = async {
                        cancelled(&mut cancel).await;
                        tokio::time::sleep(grace).await;
                    } => None,
                }
            }
            None => Some(write.await),
        };

        match result {
            None => {
                sink.closed = true;
                tracing::warn!(
                    kind = %message.kind(),
                    grace = ?self.close_grace,
                    "peer stopped reading, frame abandoned"
                );
                Err(SessionError::Closed)
            }
            Some(Ok(())) => {
                tracing::trace!(kind = %message.kind(), bytes = frame.len(), "frame written");
                Ok(())
            }
            Some(Err(e)) => {
                sink.closed = true;
                Err(SessionError::Write(e))
            }
        }
    }

    /// Stops all further writes and shuts down the write half.
    ///
    /// Waits for an in-flight `send` to finish first. Safe to call more
    /// than once; only the first call touches the stream.
    pub async fn shutdown(&self) -> Result<(), ProtocolError> {
        let mut sink = self.sink.lock().await;
        sink.closed = true;
        if sink.shut_down {
            return Ok(());
        }
        sink.shut_down = true;
        sink.inner
            .shutdown()
            .await
            .map_err(|e| TransportError::CloseFailed(e).into())
    }

    /// Whether writes are still accepted.
    pub async fn is_open(&self) -> bool {
        !self.sink.lock().await.closed
    }
}

async fn timed_write<W: AsyncWrite + Unpin>(
    inner: &mut W,
    frame: &[u8],
    limit: Option<Duration>,
) -> Result<(), ProtocolError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, write_frame(inner, frame))
            .await
            .unwrap_or_else(|_| Err(TransportError::TimedOut("write", limit).into())),
        None => write_frame(inner, frame).await,
    }
}
