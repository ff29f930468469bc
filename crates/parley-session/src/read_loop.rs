//! The continuous read loop.
//!
//! Exactly one read is outstanding at any time. Each cycle:
//!
//! ```text
//!          ┌──────────── frame decoded + dispatched ───────────┐
//!          ▼                                                   │
//!      ┌───────┐   frame arrives   ┌───────────┐               │
//!      │ Armed │ ────────────────► │ Completed │ ──────────────┘
//!      └───────┘                   └───────────┘
//!          │
//!          │ EOF / transport error / oversized frame / cancel
//!          ▼
//!   ┌──────────────┐
//!   │ Disconnected │   terminal: no read is ever issued again
//!   └──────────────┘
//! ```
//!
//! A payload that fails to decode (bad JSON, unknown kind, missing
//! fields) only spoils that one message: it is logged and the loop
//! re-arms. Anything that breaks the byte stream itself ends the loop.
//!
//! The loop doesn't report errors to the UI or tear anything down. It
//! returns a [`ReadExit`] saying why it stopped and the session decides
//! what to do with it.

use std::time::Duration;

use parley_protocol::{Codec, JsonCodec, ProtocolError, read_frame};
use parley_transport::TransportError;
use tokio::io::AsyncRead;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::lifecycle::cancelled;
use crate::{Dispatcher, SessionConfig};

/// Where the loop is in its read cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    /// A read is outstanding.
    Armed,
    /// A frame arrived and is being decoded and dispatched.
    Completed,
    /// The loop has stopped for good.
    Disconnected,
}

/// Why the read loop stopped.
#[derive(Debug)]
pub enum ReadExit {
    /// The cancellation signal was raised.
    Cancelled,
    /// The server closed the connection at a frame boundary.
    RemoteClosed,
    /// The stream failed: an I/O error, EOF inside a frame, an oversized
    /// frame, or the idle timeout.
    Failed(ProtocolError),
}

pub struct ReadLoop<R, C = JsonCodec> {
    reader: R,
    codec: C,
    dispatcher: Dispatcher,
    max_frame_len: usize,
    idle_timeout: Option<Duration>,
    state: ReadState,
    reads_issued: u64,
}

impl<R, C> ReadLoop<R, C>
where
    R: AsyncRead + Unpin,
    C: Codec,
{
    pub fn new(reader: R, codec: C, dispatcher: Dispatcher, config: &SessionConfig) -> Self {
        Self {
            reader,
            codec,
            dispatcher,
            max_frame_len: config.max_frame_len,
            idle_timeout: config.read_idle_timeout,
            state: ReadState::Armed,
            reads_issued: 0,
        }
    }

    pub fn state(&self) -> ReadState {
        self.state
    }

    /// How many reads have been armed so far.
    pub fn reads_issued(&self) -> u64 {
        self.reads_issued
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Reads, decodes, and dispatches frames until the stream ends, fails,
    /// or `cancel` becomes `true`.
    ///
    /// Calling `run` again after it has returned does nothing and returns
    /// [`ReadExit::Cancelled`].
    pub async fn run(&mut self, cancel: &mut watch::Receiver<bool>) -> ReadExit {
        if self.state == ReadState::Disconnected {
            debug!("read loop already disconnected");
            return ReadExit::Cancelled;
        }

        loop {
            self.state = ReadState::Armed;
            self.reads_issued += 1;

            let read = tokio::select! {
                biased;
                _ = cancelled(cancel) => None,
                read = next_frame(&mut self.reader, self.max_frame_len, self.idle_timeout) => Some(read),
            };

            let exit = match read {
                None => ReadExit::Cancelled,
                Some(Ok(Some(payload))) => {
                    self.state = ReadState::Completed;
                    self.handle_payload(&payload);
                    continue;
                }
                Some(Ok(None)) => ReadExit::RemoteClosed,
                Some(Err(e)) => ReadExit::Failed(e),
            };

            self.state = ReadState::Disconnected;
            debug!(?exit, reads = self.reads_issued, "read loop stopped");
            return exit;
        }
    }

    fn handle_payload(&self, payload: &[u8]) {
        match self.codec.decode_message(payload) {
            Ok(message) => {
                trace!(kind = %message.kind(), bytes = payload.len(), "frame decoded");
                self.dispatcher.dispatch(message);
            }
            Err(e) => {
                warn!(error = %e, bytes = payload.len(), "discarding undecodable message");
            }
        }
    }
}

async fn next_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_frame_len: usize,
    idle_timeout: Option<Duration>,
) -> Result<Option<Vec<u8>>, ProtocolError> {
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, read_frame(reader, max_frame_len))
            .await
            .unwrap_or_else(|_| Err(TransportError::TimedOut("read", limit).into())),
        None => read_frame(reader, max_frame_len).await,
    }
}
