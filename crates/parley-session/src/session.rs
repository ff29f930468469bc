//! `ChatSession`: one live connection to a chat server.
//!
//! A session owns three tasks that share one socket:
//!
//! ```text
//!                 ┌──────────────┐  frames  ┌────────────┐  events  ┌────┐
//!   socket ─read─►│  read loop   │─────────►│ dispatcher │─────────►│ UI │
//!                 └──────────────┘          └────────────┘          └────┘
//!                 ┌──────────────┐ GetUsers ┌───────────────┐
//!                 │    poller    │─────────►│               │
//!                 └──────────────┘          │ MessageWriter │─write─► socket
//!   UI ── send_message / send_to ──────────►│               │
//!                                           └───────────────┘
//! ```
//!
//! and a fourth, the supervisor, which does nothing until the session's
//! cancellation signal is raised. Then it tears down in a fixed order:
//! wait for the poller, wait for the read loop, close the socket.
//!
//! # Startup
//!
//! 1. Validate the username (before any I/O).
//! 2. Start the read loop.
//! 3. Send `Login`, then `GetTime`.
//! 4. Start the presence poller.
//!
//! # Shutdown
//!
//! Explicit [`disconnect`](ChatSession::disconnect), the server closing the
//! connection, a read failure, and a write failure all raise the same
//! signal. Only background failures reach the UI, as one
//! [`SessionEvent::ConnectionError`](crate::SessionEvent), and not at all
//! when the user disconnected first.

use std::sync::Arc;
use std::time::Duration;

use parley_protocol::{JsonCodec, Message, MessageKind};
use parley_transport::ServerAddress;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::events::{self, EventReceiver, EventSender, SessionEvent};
use crate::lifecycle::{Lifecycle, cancelled};
use crate::poller::{PollerExit, PresencePoller};
use crate::read_loop::{ReadExit, ReadLoop};
use crate::{Dispatcher, MessageWriter, Recipient, Roster, SessionConfig, SessionError};

type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

// ---------------------------------------------------------------------------
// ChatSession
// ---------------------------------------------------------------------------

/// A connected, logged-in chat session.
///
/// All methods take `&self`, so a session can be shared (e.g. in an `Arc`)
/// between the UI and anything else that sends messages.
///
/// Dropping the session raises the cancellation signal; the background
/// tasks then wind down on their own. Call
/// [`disconnect`](Self::disconnect) to wait until they have.
pub struct ChatSession {
    username: String,
    writer: Arc<MessageWriter<BoxedWrite>>,
    lifecycle: Arc<Lifecycle>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ChatSession {
    /// Starts building a session that connects over TCP.
    pub fn builder() -> ChatSessionBuilder {
        ChatSessionBuilder::default()
    }

    /// Connects to `host:port` with the default configuration and logs in.
    pub async fn connect(
        username: &str,
        host: &str,
        port: u16,
    ) -> Result<(Self, EventReceiver), SessionError> {
        Self::builder().connect(username, host, port).await
    }

    /// Runs a session over an already-open stream.
    ///
    /// This is what [`connect`](Self::connect) calls once TCP is up. Use it
    /// directly for other transports, or with `tokio::io::duplex` in tests.
    ///
    /// # Errors
    /// - [`SessionError::InvalidUsername`] if `username` is blank. Nothing
    ///   is written.
    /// - The error from sending `Login` or `GetTime`. The session is torn
    ///   down before returning.
    pub async fn start<S>(
        stream: S,
        username: &str,
        config: SessionConfig,
    ) -> Result<(Self, EventReceiver), SessionError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let username = validate_username(username)?;
        let config = config.validated();
        let (read_half, write_half) = tokio::io::split(stream);

        let (events, receiver) = events::channel();
        let lifecycle = Arc::new(Lifecycle::new(events.clone()));
        let writer = Arc::new(
            MessageWriter::new(Box::new(write_half) as BoxedWrite, JsonCodec, &config)
                .cancel_on(lifecycle.subscribe()),
        );

        let read_loop = ReadLoop::new(
            BufReader::new(read_half),
            JsonCodec,
            default_dispatcher(&events),
            &config,
        );
        let reader = tokio::spawn(run_reader(read_loop, Arc::clone(&lifecycle)));

        if let Err(e) = handshake(&writer, &username).await {
            tracing::warn!(%username, error = %e, "login failed");
            lifecycle.begin_close();
            if let Err(join) = reader.await {
                tracing::warn!(error = %join, "read loop task failed");
            }
            if let Err(close) = writer.shutdown().await {
                tracing::debug!(error = %close, "closing the connection failed");
            }
            return Err(e);
        }

        let poller = PresencePoller::new(Arc::clone(&writer), &config, lifecycle.subscribe());
        let poller = tokio::spawn(run_poller(poller, Arc::clone(&lifecycle)));
        let supervisor = tokio::spawn(supervise(
            lifecycle.subscribe(),
            poller,
            reader,
            Arc::clone(&writer),
        ));

        tracing::info!(%username, poll_interval = ?config.poll_interval, "session started");
        let session = Self {
            username,
            writer,
            lifecycle,
            supervisor: Mutex::new(Some(supervisor)),
        };
        Ok((session, receiver))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// `false` once the session has started shutting down, for whatever
    /// reason.
    pub fn is_connected(&self) -> bool {
        !self.lifecycle.is_cancelled()
    }

    /// Sends a chat message.
    ///
    /// `receiver` is the recipient's address, or empty with `broadcast`
    /// set. [`send_to`](Self::send_to) builds these from a [`Recipient`].
    ///
    /// # Errors
    /// - [`SessionError::Closed`] once the session is shutting down.
    /// - [`SessionError::Encode`] if the message is too large. The session
    ///   carries on.
    /// - [`SessionError::Write`] if the socket failed. The session tears
    ///   itself down; this error is the only report of it.
    pub async fn send_message(
        &self,
        receiver: &str,
        text: &str,
        broadcast: bool,
    ) -> Result<(), SessionError> {
        if self.lifecycle.is_cancelled() {
            return Err(SessionError::Closed);
        }
        let result = self
            .writer
            .send(&Message::send(receiver, text, broadcast))
            .await;
        if let Err(e @ SessionError::Write(_)) = &result {
            self.lifecycle.fail_returned(&e.to_string());
        }
        result
    }

    /// Sends `text` to one of the choices from
    /// [`Roster::receiver_choices`].
    pub async fn send_to(&self, recipient: &Recipient, text: &str) -> Result<(), SessionError> {
        let (receiver, broadcast) = recipient.wire_target();
        self.send_message(receiver, text, broadcast).await
    }

    /// Shuts the session down and waits until it is fully closed.
    ///
    /// Returns once the poller and the read loop have stopped and the
    /// socket is closed. No `ConnectionError` is reported for anything that
    /// fails along the way. Calling it again, or after the connection was
    /// already lost, is harmless.
    pub async fn disconnect(&self) {
        self.lifecycle.begin_close();
        let mut supervisor = self.supervisor.lock().await;
        if let Some(handle) = supervisor.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "session supervisor failed");
            }
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.lifecycle.begin_close();
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("username", &self.username)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ChatSessionBuilder
// ---------------------------------------------------------------------------

/// Builds a [`ChatSession`] over TCP.
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), parley_session::SessionError> {
/// use std::time::Duration;
/// use parley_session::ChatSession;
///
/// let (session, mut events) = ChatSession::builder()
///     .connect_timeout(Duration::from_secs(3))
///     .poll_interval(Duration::from_secs(10))
///     .connect("alice", "chat.example.com", 8989)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChatSessionBuilder {
    config: SessionConfig,
}

impl ChatSessionBuilder {
    /// Replaces the whole configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn poll_jitter(mut self, jitter: Duration) -> Self {
        self.config.poll_jitter = jitter;
        self
    }

    pub fn max_frame_len(mut self, len: usize) -> Self {
        self.config.max_frame_len = len;
        self
    }

    pub fn read_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_idle_timeout = Some(timeout);
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = Some(timeout);
        self
    }

    pub fn close_grace(mut self, grace: Duration) -> Self {
        self.config.close_grace = grace;
        self
    }

    /// Validates the inputs, opens a TCP connection, and starts the
    /// session.
    ///
    /// # Errors
    /// - [`SessionError::InvalidUsername`] or [`SessionError::Address`]:
    ///   bad input, checked before any network I/O.
    /// - [`SessionError::Connect`]: the server could not be reached in
    ///   time.
    /// - Anything [`ChatSession::start`] returns.
    pub async fn connect(
        self,
        username: &str,
        host: &str,
        port: u16,
    ) -> Result<(ChatSession, EventReceiver), SessionError> {
        validate_username(username)?;
        let address = ServerAddress::new(host, port)?;
        self.connect_to(username, &address).await
    }

    /// Like [`connect`](Self::connect), with an already-parsed address.
    pub async fn connect_to(
        self,
        username: &str,
        address: &ServerAddress,
    ) -> Result<(ChatSession, EventReceiver), SessionError> {
        validate_username(username)?;
        let config = self.config.validated();
        let connection = parley_transport::connect(address, config.connect_timeout).await?;
        tracing::debug!(conn_id = %connection.id(), %address, "starting session");
        ChatSession::start(connection.into_stream(), username, config).await
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn validate_username(username: &str) -> Result<String, SessionError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(SessionError::InvalidUsername);
    }
    Ok(username.to_owned())
}

async fn handshake(
    writer: &MessageWriter<BoxedWrite>,
    username: &str,
) -> Result<(), SessionError> {
    writer.send(&Message::login(username)).await?;
    writer.send(&Message::GetTime).await
}

/// Turns the three server messages into UI events.
fn default_dispatcher(events: &EventSender) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();

    let tx = events.clone();
    dispatcher.register(MessageKind::GetUsersResponse, move |msg: Message| {
        if let Message::GetUsersResponse { users } = msg {
            tx.post(SessionEvent::UserListUpdated(Roster::new(users)));
        }
    });

    let tx = events.clone();
    dispatcher.register(MessageKind::GetTimeResponse, move |msg: Message| {
        if let Message::GetTimeResponse {
            utc_timestamp_millis,
        } = msg
        {
            tx.post(SessionEvent::ServerTimeReceived(utc_timestamp_millis));
        }
    });

    let tx = events.clone();
    dispatcher.register(MessageKind::IncomingMessage, move |msg: Message| {
        if let Message::IncomingMessage {
            from,
            body,
            broadcast,
        } = msg
        {
            tx.post(SessionEvent::MessageReceived {
                sender: from,
                text: body,
                broadcast,
            });
        }
    });

    dispatcher
}

async fn run_reader<R: AsyncRead + Unpin>(mut read_loop: ReadLoop<R>, lifecycle: Arc<Lifecycle>) {
    let mut cancel = lifecycle.subscribe();
    match read_loop.run(&mut cancel).await {
        ReadExit::Cancelled => {}
        ReadExit::RemoteClosed => lifecycle.fail("remote disconnected", None),
        ReadExit::Failed(e) => lifecycle.fail("connection lost", Some(e.to_string())),
    }

    let dropped = read_loop.dispatcher().dropped();
    if dropped > 0 {
        tracing::debug!(dropped, "messages dropped without a handler");
    }
}

async fn run_poller(poller: PresencePoller<BoxedWrite>, lifecycle: Arc<Lifecycle>) {
    if let PollerExit::WriteFailed(e) = poller.run().await {
        lifecycle.fail("failed to request the user list", Some(e.to_string()));
    }
}

/// Waits for the cancellation signal, then tears down in order: poller,
/// read loop, socket.
async fn supervise(
    mut cancel: watch::Receiver<bool>,
    poller: JoinHandle<()>,
    reader: JoinHandle<()>,
    writer: Arc<MessageWriter<BoxedWrite>>,
) {
    cancelled(&mut cancel).await;
    tracing::debug!("tearing down session");

    if let Err(e) = poller.await {
        tracing::warn!(error = %e, "presence poller task failed");
    }
    if let Err(e) = reader.await {
        tracing::warn!(error = %e, "read loop task failed");
    }
    if let Err(e) = writer.shutdown().await {
        tracing::debug!(error = %e, "closing the connection failed");
    }

    tracing::info!("session closed");
}
