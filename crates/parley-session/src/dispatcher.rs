//! Routes each decoded message to the handler registered for its kind.
//!
//! The table is filled in once, while the session is being set up, and
//! then moved into the read loop. After that nothing can register into it:
//! the read loop is the only owner and it only calls [`Dispatcher::dispatch`].
//! So there is no lock, and no way for registration to race dispatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parley_protocol::{Message, MessageKind};

/// Something that reacts to one kind of message.
///
/// Closures work directly thanks to the blanket impl:
///
/// ```rust
/// use parley_protocol::{Message, MessageKind};
/// use parley_session::Dispatcher;
///
/// let mut dispatcher = Dispatcher::new();
/// dispatcher.register(MessageKind::GetTimeResponse, |msg: Message| {
///     println!("server time: {msg:?}");
/// });
/// assert!(dispatcher.is_registered(MessageKind::GetTimeResponse));
/// ```
pub trait MessageHandler: Send + Sync + 'static {
    /// Handles one message. Only ever called with a message whose
    /// [`kind`](Message::kind) is the one this handler was registered for.
    fn handle(&self, message: Message);
}

impl<F> MessageHandler for F
where
    F: Fn(Message) + Send + Sync + 'static,
{
    fn handle(&self, message: Message) {
        self(message)
    }
}

/// What [`Dispatcher::dispatch`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler was found and called.
    Handled,
    /// No handler for this kind; the message was discarded.
    Dropped,
}

/// Handler table keyed by [`MessageKind`], at most one handler per kind.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<MessageKind, Box<dyn MessageHandler>>,
    dropped: AtomicU64,
}

impl Dispatcher {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind`. A later registration for the same
    /// kind replaces the earlier one.
    pub fn register(
        &mut self,
        kind: MessageKind,
        handler: impl MessageHandler,
    ) -> &mut Self {
        if self.handlers.insert(kind, Box::new(handler)).is_some() {
            tracing::debug!(%kind, "replaced message handler");
        }
        self
    }

    /// Whether a handler exists for `kind`.
    pub fn is_registered(&self, kind: MessageKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Calls the handler for `message.kind()`.
    ///
    /// A missing handler is not an error: the message is dropped, counted,
    /// and logged at debug level.
    pub fn dispatch(&self, message: Message) -> Dispatch {
        let kind = message.kind();
        match self.handlers.get(&kind) {
            Some(handler) => {
                tracing::trace!(%kind, "dispatching");
                handler.handle(message);
                Dispatch::Handled
            }
            None => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%kind, "no handler registered, message dropped");
                Dispatch::Dropped
            }
        }
    }

    /// How many messages have been dropped for lack of a handler.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort();
        f.debug_struct("Dispatcher")
            .field("kinds", &kinds)
            .field("dropped", &self.dropped())
            .finish()
    }
}
