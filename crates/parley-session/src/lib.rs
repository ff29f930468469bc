//! Client-side chat sessions for Parley.
//!
//! This crate is everything between "the user pressed Connect" and "a
//! message shows up in the chat window":
//!
//! 1. **Connecting** ([`ChatSession::connect`], [`ChatSessionBuilder`]) —
//!    opens TCP, logs in, asks for the server time.
//! 2. **Reading** ([`ReadLoop`]) — keeps exactly one read outstanding,
//!    turning frames into [`Message`](parley_protocol::Message)s.
//! 3. **Dispatching** ([`Dispatcher`]) — routes each message to the handler
//!    for its kind.
//! 4. **Writing** ([`MessageWriter`]) — serializes frames from the UI and
//!    the [`PresencePoller`] onto the one socket.
//! 5. **Notifying** ([`SessionEvent`], [`EventReceiver`],
//!    [`SessionListener`]) — hands results to the UI on the UI's thread.
//! 6. **Tearing down** — one cancellation signal, one supervisor, a fixed
//!    shutdown order, however the session ends.
//!
//! # How it fits in the stack
//!
//! ```text
//! UI (above)            ← drains SessionEvents, calls send_to / disconnect
//!     ↕
//! Session (this crate)  ← owns the tasks that share the socket
//!     ↕
//! Protocol (below)      ← Message, JsonCodec, length-prefixed frames
//!     ↕
//! Transport (below)     ← ServerAddress, TCP connect with timeout
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use parley_session::{ChatSession, Recipient, SessionEvent};
//!
//! # async fn demo() -> Result<(), parley_session::SessionError> {
//! let (session, mut events) = ChatSession::connect("alice", "localhost", 8989).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::UserListUpdated(roster) => {
//!             if let Some(bob) = roster.find("bob") {
//!                 session.send_to(&Recipient::User(bob.clone()), "hi bob").await?;
//!             }
//!         }
//!         SessionEvent::ConnectionError { message, .. } => {
//!             eprintln!("lost connection: {message}");
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//! session.disconnect().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod dispatcher;
mod error;
mod events;
mod lifecycle;
mod poller;
mod read_loop;
mod roster;
mod session;
mod writer;

pub use config::SessionConfig;
pub use dispatcher::{Dispatch, Dispatcher, MessageHandler};
pub use error::SessionError;
pub use events::{EventReceiver, SessionEvent, SessionListener};
pub use poller::{PollerExit, PresencePoller};
pub use read_loop::{ReadExit, ReadLoop, ReadState};
pub use roster::{BROADCAST_LABEL, Recipient, Roster};
pub use session::{ChatSession, ChatSessionBuilder};
pub use writer::MessageWriter;
