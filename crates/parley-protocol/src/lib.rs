//! Wire protocol for Parley.
//!
//! This crate defines the "language" a chat client and server speak:
//!
//! - **Types** ([`Message`], [`MessageKind`], [`User`]) — the messages
//!   that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how one message is
//!   converted to/from bytes.
//! - **Framing** ([`framing`]) — how those bytes are delimited on a byte
//!   stream, so the reader always decodes exactly one whole envelope.
//! - **Errors** ([`ProtocolError`]) — what can go wrong doing the above.
//!
//! # Architecture
//!
//! ```text
//! Transport (TCP bytes) → Framing (payloads) → Codec (Message) → Session
//! ```

mod codec;
mod error;
pub mod framing;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use framing::{DEFAULT_MAX_FRAME_LEN, encode_frame, read_frame, write_frame};
pub use types::{Message, MessageKind, User};
