//! # Parley
//!
//! Client-side session layer for a simple TCP chat protocol.
//!
//! Parley owns one connection to a chat server: it logs in, keeps a read
//! loop running, polls for the user list, serializes outgoing messages,
//! and hands everything the UI needs back as [`SessionEvent`]s. The UI
//! itself (windows, input boxes, lists) is yours.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::prelude::*;
//!
//! # async fn demo() -> Result<(), ParleyError> {
//! let (session, mut events) = ChatSession::connect("alice", "localhost", 8989).await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::MessageReceived { sender, text, .. } => {
//!             println!("{sender}: {text}");
//!             session.send_to(&Recipient::Everyone, "got it").await?;
//!         }
//!         SessionEvent::ConnectionError { message, .. } => {
//!             eprintln!("{message}");
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//! session.disconnect().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! | Crate | Provides |
//! |---|---|
//! | [`transport`] | server addresses, TCP connect with timeout |
//! | [`protocol`] | message types, JSON codec, length-prefixed frames |
//! | [`session`] | `ChatSession`, events, dispatcher, poller |

mod error;

pub use error::ParleyError;

pub use parley_protocol as protocol;
pub use parley_session as session;
pub use parley_transport as transport;

/// Everything a typical chat client needs, in one import.
pub mod prelude {
    pub use crate::ParleyError;
    pub use parley_protocol::{Message, MessageKind, User};
    pub use parley_session::{
        ChatSession, ChatSessionBuilder, EventReceiver, Recipient, Roster, SessionConfig,
        SessionError, SessionEvent, SessionListener,
    };
    pub use parley_transport::{DEFAULT_PORT, ServerAddress};
}
