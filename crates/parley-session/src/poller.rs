//! Background presence polling.
//!
//! The server never pushes the user list; the client has to ask. The
//! poller sends `GetUsers` right away and then once every
//! `poll_interval` until the session ends. Answers come back through the
//! read loop like any other message.
//!
//! The sleep between polls races the cancellation signal, so the poller
//! stops within one scheduling tick of cancellation rather than after
//! its current sleep. The signal is also checked before each send, so no
//! request is written once teardown has begun.

use std::sync::Arc;
use std::time::Duration;

use parley_protocol::{Codec, JsonCodec, Message};
use rand::Rng;
use tokio::io::AsyncWrite;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::lifecycle::cancelled;
use crate::{MessageWriter, SessionConfig, SessionError};

/// Why the poller stopped.
#[derive(Debug)]
pub enum PollerExit {
    /// Cancelled, or found the writer already closed.
    Stopped { polls: u64 },
    /// Sending a poll failed.
    WriteFailed(SessionError),
}

pub struct PresencePoller<W, C = JsonCodec> {
    writer: Arc<MessageWriter<W, C>>,
    interval: Duration,
    initial_jitter: Duration,
    cancel: watch::Receiver<bool>,
}

impl<W, C> PresencePoller<W, C>
where
    W: AsyncWrite + Unpin + Send,
    C: Codec,
{
    pub fn new(
        writer: Arc<MessageWriter<W, C>>,
        config: &SessionConfig,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            writer,
            interval: config.poll_interval,
            initial_jitter: config.poll_jitter,
            cancel,
        }
    }

    /// Polls until cancelled or until a send fails.
    pub async fn run(mut self) -> PollerExit {
        let mut polls = 0;

        let jitter = self.first_delay();
        if !jitter.is_zero() {
            trace!(?jitter, "delaying first presence poll");
            tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => return PollerExit::Stopped { polls },
                _ = tokio::time::sleep(jitter) => {}
            }
        }

        loop {
            if *self.cancel.borrow() {
                break;
            }
            match self.writer.send(&Message::GetUsers).await {
                Ok(()) => polls += 1,
                Err(SessionError::Closed) => break,
                Err(e) => return PollerExit::WriteFailed(e),
            }

            tokio::select! {
                biased;
                _ = cancelled(&mut self.cancel) => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        debug!(polls, "presence poller stopped");
        PollerExit::Stopped { polls }
    }

    fn first_delay(&self) -> Duration {
        let max_us = u64::try_from(self.initial_jitter.as_micros()).unwrap_or(u64::MAX);
        if max_us == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rand::rng().random_range(0..max_us))
    }
}
