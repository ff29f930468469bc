//! Notifications from the session to the UI.
//!
//! The read loop, the presence poller, and the teardown path all run on
//! tokio tasks. The UI usually has a thread of its own and must not be
//! called from those tasks. So the session never calls into the UI
//! directly: it posts a [`SessionEvent`] on a channel, and the UI pulls
//! events off the [`EventReceiver`] on its own thread, either by
//! matching on them or by handing them to a [`SessionListener`].
//!
//! The channel is unbounded: the session must never block on a slow UI.
//! Events arrive in the order they were posted, which for messages from
//! the server is the order the frames were decoded.

use tokio::sync::mpsc;

use crate::roster::Roster;

/// Something the UI should know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The server sent a fresh user list.
    UserListUpdated(Roster),

    /// A chat message arrived.
    MessageReceived {
        sender: String,
        text: String,
        broadcast: bool,
    },

    /// The server answered `GetTime`, in UTC milliseconds since the epoch.
    ServerTimeReceived(i64),

    /// The connection failed. Sent at most once per session, and never
    /// after an explicit disconnect.
    ConnectionError {
        message: String,
        cause: Option<String>,
    },
}

impl SessionEvent {
    /// Calls the matching method on `listener`.
    pub fn deliver<L: SessionListener + ?Sized>(&self, listener: &mut L) {
        match self {
            Self::UserListUpdated(roster) => listener.on_user_list_updated(roster),
            Self::MessageReceived {
                sender,
                text,
                broadcast,
            } => listener.on_message_received(sender, text, *broadcast),
            Self::ServerTimeReceived(millis) => listener.on_server_time_received(*millis),
            Self::ConnectionError { message, cause } => {
                listener.on_connection_error(message, cause.as_deref())
            }
        }
    }
}

/// Callback-style view of [`SessionEvent`]s.
///
/// Implemented by the UI. Never called from a session task: only from
/// [`EventReceiver::drain`] or [`SessionEvent::deliver`], on whatever
/// thread the UI calls those from.
pub trait SessionListener {
    /// The user list changed. `roster` is already sorted by name and does
    /// not contain the broadcast entry; use
    /// [`Roster::receiver_choices`] for that.
    fn on_user_list_updated(&mut self, roster: &Roster);

    fn on_message_received(&mut self, sender: &str, text: &str, broadcast: bool);

    fn on_server_time_received(&mut self, utc_millis: i64);

    /// The connection is gone. The session has already torn itself down.
    fn on_connection_error(&mut self, message: &str, cause: Option<&str>);
}

/// Creates a linked sender/receiver pair.
pub(crate) fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}

/// Session-side end of the event channel.
#[derive(Debug, Clone)]
pub(crate) struct EventSender {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSender {
    /// Posts an event. If the UI has dropped its receiver the event is
    /// discarded.
    pub(crate) fn post(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver dropped, discarding event");
        }
    }
}

/// UI-side end of the event channel.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl EventReceiver {
    /// Waits for the next event. `None` once the session has been dropped,
    /// its tasks have finished, and every event has been taken.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Takes the next event if one is ready.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }

    /// Blocking version of [`recv`](Self::recv), for UI threads outside
    /// the tokio runtime.
    ///
    /// # Panics
    /// If called from inside an async context.
    pub fn blocking_recv(&mut self) -> Option<SessionEvent> {
        self.rx.blocking_recv()
    }

    /// Delivers every event that is ready right now to `listener`,
    /// without waiting. Returns how many were delivered.
    ///
    /// Meant to be called from the UI's own loop (a timer tick, an idle
    /// callback).
    pub fn drain<L: SessionListener + ?Sized>(&mut self, listener: &mut L) -> usize {
        let mut delivered = 0;
        while let Some(event) = self.try_recv() {
            event.deliver(listener);
            delivered += 1;
        }
        delivered
    }
}
