//! Shared shutdown state for one session.
//!
//! Four things can end a session: an explicit disconnect, the server
//! closing the connection, a read failure, or a write failure. They all
//! go through [`Lifecycle`], which raises one cancellation signal. The
//! read loop, the poller, and the teardown supervisor all watch that
//! signal, so there is exactly one teardown path however the session
//! ends.
//!
//! `Lifecycle` also decides whether the UI hears about a failure: at most
//! one `ConnectionError` per session, and none once the user has asked
//! to disconnect.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::events::{EventSender, SessionEvent};

pub(crate) struct Lifecycle {
    cancel: watch::Sender<bool>,
    /// An explicit disconnect has started.
    closing: AtomicBool,
    /// A `ConnectionError` has been posted.
    reported: AtomicBool,
    events: EventSender,
}

impl Lifecycle {
    pub(crate) fn new(events: EventSender) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            cancel,
            closing: AtomicBool::new(false),
            reported: AtomicBool::new(false),
            events,
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.cancel.subscribe()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Explicit disconnect: raise the signal, report nothing.
    pub(crate) fn begin_close(&self) {
        if !self.closing.swap(true, Ordering::SeqCst) {
            debug!("disconnect requested");
        }
        self.cancel.send_replace(true);
    }

    /// A background failure: report it (once, unless closing) and raise
    /// the signal.
    pub(crate) fn fail(&self, message: &str, cause: Option<String>) {
        if self.closing.load(Ordering::SeqCst) {
            debug!(reason = message, ?cause, "failure during disconnect, not reported");
        } else if !self.reported.swap(true, Ordering::SeqCst) {
            warn!(reason = message, ?cause, "connection error");
            self.events.post(SessionEvent::ConnectionError {
                message: message.to_owned(),
                cause,
            });
        } else {
            debug!(reason = message, ?cause, "connection error already reported");
        }
        self.cancel.send_replace(true);
    }

    /// A failure the caller already got back as an `Err`: raise the
    /// signal, and make sure no event reports it a second time.
    pub(crate) fn fail_returned(&self, message: &str) {
        if !self.reported.swap(true, Ordering::SeqCst) {
            warn!(reason = message, "connection error returned to caller");
        }
        self.cancel.send_replace(true);
    }
}

/// Resolves once `cancel` is `true`, or its sender is gone.
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    // An Err means the sender was dropped, which also means "stop".
    let _ = cancel.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events;

    #[test]
    fn test_fail_reports_once() {
        let (tx, mut rx) = events::channel();
        let lifecycle = Lifecycle::new(tx);

        lifecycle.fail("remote disconnected", None);
        lifecycle.fail("write failed", Some("broken pipe".into()));

        assert!(lifecycle.is_cancelled());
        assert_eq!(
            rx.try_recv(),
            Some(SessionEvent::ConnectionError {
                message: "remote disconnected".into(),
                cause: None,
            })
        );
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_fail_after_close_is_silent() {
        let (tx, mut rx) = events::channel();
        let lifecycle = Lifecycle::new(tx);

        lifecycle.begin_close();
        lifecycle.fail("remote disconnected", None);

        assert!(lifecycle.is_cancelled());
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_returned_failure_suppresses_later_events() {
        let (tx, mut rx) = events::channel();
        let lifecycle = Lifecycle::new(tx);

        lifecycle.fail_returned("write failed");
        lifecycle.fail("remote disconnected", None);

        assert!(lifecycle.is_cancelled());
        assert_eq!(rx.try_recv(), None);
    }

    #[tokio::test]
    async fn test_subscribers_see_the_signal() {
        let (tx, _rx) = events::channel();
        let lifecycle = Lifecycle::new(tx);
        let mut watcher = lifecycle.subscribe();

        let waiter = tokio::spawn(async move { cancelled(&mut watcher).await });
        lifecycle.begin_close();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_lifecycle_releases_watchers() {
        let (tx, _rx) = events::channel();
        let lifecycle = Lifecycle::new(tx);
        let mut watcher = lifecycle.subscribe();
        drop(lifecycle);
        cancelled(&mut watcher).await;
    }
}
