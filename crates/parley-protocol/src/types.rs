//! Core protocol types for Parley's wire format.
//!
//! Every message exchanged with a chat server is one [`Message`]. On the
//! wire it is a JSON object whose `"kind"` field names the variant and whose
//! remaining fields carry that variant's data:
//!
//! ```text
//! {"kind":"SendMessageRequest","receiver":"10.0.0.2","message":"hi","broadcast":false}
//! ```
//!
//! In memory it is a closed Rust `enum`, so the compiler makes every
//! `match` handle every kind, and there is no way to construct a message
//! the codec can't encode.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user connected to the chat server, as reported in a roster.
///
/// `name` is what people see; `address` is what the server uses to route
/// a direct message (it's the `receiver` of a [`Message::SendMessage`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "userName")]
    pub name: String,
    pub address: String,
}

impl User {
    /// Convenience constructor.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.address)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One protocol message: a request the client sends, or a response/event
/// the server sends.
///
/// `#[serde(tag = "kind")]` makes this "internally tagged": the variant
/// name goes into a `"kind"` field next to the variant's own fields,
/// instead of wrapping them (`{"Login": {...}}`). The `rename` attributes
/// pin the wire names, which differ from the Rust names in places.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Message {
    // -- Client → Server --

    /// Identifies the user. Sent exactly once, first, on every connection.
    #[serde(rename = "LoginRequest")]
    Login { username: String },

    /// Asks for the current roster. Sent periodically by the presence poller.
    #[serde(rename = "GetUsersRequest")]
    GetUsers,

    /// Asks for the server's clock. Sent once, right after login.
    #[serde(rename = "GetTimeRequest")]
    GetTime,

    /// Sends chat text.
    ///
    /// For a direct message `receiver` is the target user's `address` and
    /// `broadcast` is false. For a message to everyone, `receiver` is empty
    /// and `broadcast` is true.
    #[serde(rename = "SendMessageRequest")]
    SendMessage {
        receiver: String,
        #[serde(rename = "message")]
        body: String,
        broadcast: bool,
    },

    // -- Server → Client --

    /// The roster, in whatever order the server keeps it.
    GetUsersResponse { users: Vec<User> },

    /// The server's clock, in milliseconds since the Unix epoch (UTC).
    GetTimeResponse {
        #[serde(rename = "utcServerTime")]
        utc_timestamp_millis: i64,
    },

    /// Chat text from another user.
    IncomingMessage {
        #[serde(rename = "senderName")]
        from: String,
        #[serde(rename = "message")]
        body: String,
        broadcast: bool,
    },
}

impl Message {
    /// Builds a [`Message::Login`].
    pub fn login(username: impl Into<String>) -> Self {
        Self::Login {
            username: username.into(),
        }
    }

    /// Builds a [`Message::SendMessage`].
    pub fn send(
        receiver: impl Into<String>,
        body: impl Into<String>,
        broadcast: bool,
    ) -> Self {
        Self::SendMessage {
            receiver: receiver.into(),
            body: body.into(),
            broadcast,
        }
    }

    /// The discriminant of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Login { .. } => MessageKind::LoginRequest,
            Self::GetUsers => MessageKind::GetUsersRequest,
            Self::GetTime => MessageKind::GetTimeRequest,
            Self::SendMessage { .. } => MessageKind::SendMessageRequest,
            Self::GetUsersResponse { .. } => MessageKind::GetUsersResponse,
            Self::GetTimeResponse { .. } => MessageKind::GetTimeResponse,
            Self::IncomingMessage { .. } => MessageKind::IncomingMessage,
        }
    }
}

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// The kind of a [`Message`], without its data.
///
/// This is what the dispatcher keys its handler table on. Each variant's
/// name is exactly the `"kind"` string used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    LoginRequest,
    GetUsersRequest,
    GetTimeRequest,
    SendMessageRequest,
    GetUsersResponse,
    GetTimeResponse,
    IncomingMessage,
}

impl MessageKind {
    /// Every kind, requests first.
    pub const ALL: [MessageKind; 7] = [
        Self::LoginRequest,
        Self::GetUsersRequest,
        Self::GetTimeRequest,
        Self::SendMessageRequest,
        Self::GetUsersResponse,
        Self::GetTimeResponse,
        Self::IncomingMessage,
    ];

    /// The wire tag for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoginRequest => "LoginRequest",
            Self::GetUsersRequest => "GetUsersRequest",
            Self::GetTimeRequest => "GetTimeRequest",
            Self::SendMessageRequest => "SendMessageRequest",
            Self::GetUsersResponse => "GetUsersResponse",
            Self::GetTimeResponse => "GetTimeResponse",
            Self::IncomingMessage => "IncomingMessage",
        }
    }

    /// Looks a kind up by its wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// `true` for kinds the server sends to the client.
    pub fn is_inbound(self) -> bool {
        matches!(
            self,
            Self::GetUsersResponse | Self::GetTimeResponse | Self::IncomingMessage
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =========================================================================
// Tests
// =========================================================================
