//! End-to-end session behavior against a scripted server.
//!
//! The "server" is the far end of an in-memory duplex pipe. Each test
//! plays the server's side by hand: read the client's frames, write
//! responses, hang up.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use parley_protocol::{
    Codec, DEFAULT_MAX_FRAME_LEN, JsonCodec, Message, User, encode_frame, read_frame, write_frame,
};
use parley_session::{
    ChatSession, EventReceiver, Recipient, SessionConfig, SessionError, SessionEvent,
};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

const EVENT_WAIT: Duration = Duration::from_secs(5);

struct FakeServer {
    stream: DuplexStream,
}

impl FakeServer {
    async fn next(&mut self) -> Option<Message> {
        read_frame(&mut self.stream, DEFAULT_MAX_FRAME_LEN)
            .await
            .expect("client sent a bad frame")
            .map(|payload| JsonCodec.decode_message(&payload).expect("client sent bad JSON"))
    }

    async fn expect(&mut self) -> Message {
        self.next().await.expect("client closed the connection")
    }

    async fn send(&mut self, msg: &Message) {
        self.send_raw(&JsonCodec.encode(msg).unwrap()).await;
    }

    async fn send_raw(&mut self, payload: &[u8]) {
        let frame = encode_frame(payload, DEFAULT_MAX_FRAME_LEN).unwrap();
        write_frame(&mut self.stream, &frame).await.unwrap();
    }

    /// Reads until the client closes, returning everything it sent.
    async fn drain_until_closed(&mut self) -> Vec<Message> {
        let mut rest = Vec::new();
        while let Some(msg) = self.next().await {
            rest.push(msg);
        }
        rest
    }
}

/// Starts a session and consumes the login handshake.
async fn started(config: SessionConfig) -> (ChatSession, EventReceiver, FakeServer) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (session, events) = ChatSession::start(client, "alice", config).await.unwrap();
    let mut server = FakeServer { stream: server };
    assert_eq!(server.expect().await, Message::login("alice"));
    assert_eq!(server.expect().await, Message::GetTime);
    (session, events, server)
}

async fn next_event(events: &mut EventReceiver) -> SessionEvent {
    tokio::time::timeout(EVENT_WAIT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Every event still queued once the session is gone.
async fn remaining_events(session: ChatSession, mut events: EventReceiver) -> Vec<SessionEvent> {
    session.disconnect().await;
    drop(session);
    let mut rest = Vec::new();
    while let Some(event) = events.recv().await {
        rest.push(event);
    }
    rest
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_login_then_get_time_then_first_poll() {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (session, _events) = ChatSession::start(client, "  alice ", SessionConfig::default())
        .await
        .unwrap();
    let mut server = FakeServer { stream: server };

    assert_eq!(session.username(), "alice");
    assert!(session.is_connected());
    assert_eq!(server.expect().await, Message::login("alice"));
    assert_eq!(server.expect().await, Message::GetTime);
    assert_eq!(server.expect().await, Message::GetUsers);
}

#[tokio::test(start_paused = true)]
async fn test_polls_every_interval_until_disconnect() {
    let (session, _events, mut server) = started(SessionConfig::default()).await;
    let start = tokio::time::Instant::now();

    assert_eq!(server.expect().await, Message::GetUsers);
    assert_eq!(server.expect().await, Message::GetUsers);
    assert!(start.elapsed() >= Duration::from_secs(5));

    session.disconnect().await;
    assert!(server.drain_until_closed().await.is_empty());
}

// ---------------------------------------------------------------------------
// Inbound messages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_user_list_is_sorted_and_has_no_broadcast_entry() {
    let (_session, mut events, mut server) = started(SessionConfig::default()).await;
    server
        .send(&Message::GetUsersResponse {
            users: vec![
                User::new("carol", "10.0.0.3"),
                User::new("alice", "10.0.0.1"),
                User::new("bob", "10.0.0.2"),
            ],
        })
        .await;

    let SessionEvent::UserListUpdated(roster) = next_event(&mut events).await else {
        panic!("expected a user list");
    };
    let names: Vec<_> = roster.users().iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob", "carol"]);

    let choices = roster.receiver_choices();
    assert_eq!(choices.len(), 4);
    assert_eq!(choices.last(), Some(&Recipient::Everyone));
}

#[tokio::test]
async fn test_server_time_and_messages_arrive_in_order() {
    let (session, mut events, mut server) = started(SessionConfig::default()).await;
    server
        .send(&Message::GetTimeResponse {
            utc_timestamp_millis: 1_700_000_000_000,
        })
        .await;
    server
        .send(&Message::IncomingMessage {
            from: "bob".into(),
            body: "hi alice".into(),
            broadcast: false,
        })
        .await;
    server
        .send(&Message::IncomingMessage {
            from: "carol".into(),
            body: "hi all".into(),
            broadcast: true,
        })
        .await;

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::ServerTimeReceived(1_700_000_000_000)
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::MessageReceived {
            sender: "bob".into(),
            text: "hi alice".into(),
            broadcast: false,
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::MessageReceived {
            sender: "carol".into(),
            text: "hi all".into(),
            broadcast: true,
        }
    );

    // Each message was delivered exactly once.
    assert!(remaining_events(session, events).await.is_empty());
}

#[tokio::test]
async fn test_bad_frames_are_skipped_without_ending_the_session() {
    let (session, mut events, mut server) = started(SessionConfig::default()).await;
    server.send_raw(b"\x00\x01 not json").await;
    server.send_raw(br#"{"kind":"Teleport","to":"mars"}"#).await;
    server.send_raw(br#"{"kind":"IncomingMessage","senderName":"bob"}"#).await;
    server
        .send(&Message::IncomingMessage {
            from: "bob".into(),
            body: "still here".into(),
            broadcast: false,
        })
        .await;

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::MessageReceived {
            sender: "bob".into(),
            text: "still here".into(),
            broadcast: false,
        }
    );
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_oversized_inbound_frame_ends_the_session() {
    let config = SessionConfig {
        max_frame_len: 64,
        ..SessionConfig::default()
    };
    let (session, mut events, mut server) = started(config).await;
    server
        .send(&Message::IncomingMessage {
            from: "bob".into(),
            body: "x".repeat(200),
            broadcast: false,
        })
        .await;

    let SessionEvent::ConnectionError { cause, .. } = next_event(&mut events).await else {
        panic!("expected a connection error");
    };
    assert!(cause.unwrap().contains("exceeds"));
    assert!(!session.is_connected());
}

// ---------------------------------------------------------------------------
// Outbound messages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_send_to_user_and_everyone() {
    let (session, _events, mut server) = started(SessionConfig::default()).await;
    assert_eq!(server.expect().await, Message::GetUsers);

    let bob = Recipient::User(User::new("bob", "10.0.0.2"));
    session.send_to(&bob, "hi bob").await.unwrap();
    session.send_to(&Recipient::Everyone, "hi all").await.unwrap();

    assert_eq!(
        server.expect().await,
        Message::SendMessage {
            receiver: "10.0.0.2".into(),
            body: "hi bob".into(),
            broadcast: false,
        }
    );
    assert_eq!(
        server.expect().await,
        Message::SendMessage {
            receiver: String::new(),
            body: "hi all".into(),
            broadcast: true,
        }
    );
}

#[tokio::test]
async fn test_too_large_outbound_message_leaves_session_usable() {
    let config = SessionConfig {
        max_frame_len: 256,
        ..SessionConfig::default()
    };
    let (session, _events, mut server) = started(config).await;
    assert_eq!(server.expect().await, Message::GetUsers);

    let err = session
        .send_message("10.0.0.2", &"x".repeat(1000), false)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Encode(_)));
    assert!(session.is_connected());

    session.send_message("10.0.0.2", "short", false).await.unwrap();
    assert_eq!(
        server.expect().await,
        Message::send("10.0.0.2", "short", false)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_are_never_interleaved() {
    const TASKS: usize = 8;
    const PER_TASK: usize = 25;

    // A tiny pipe forces every frame through many partial writes.
    let (client, server) = tokio::io::duplex(32);
    let config = SessionConfig {
        poll_interval: SessionConfig::MIN_POLL_INTERVAL,
        ..SessionConfig::default()
    };
    let (session, _events) = ChatSession::start(client, "alice", config).await.unwrap();
    let session = Arc::new(session);

    let reader = tokio::spawn(async move {
        let mut server = FakeServer { stream: server };
        let mut bodies = Vec::new();
        while bodies.len() < TASKS * PER_TASK {
            match server.expect().await {
                Message::SendMessage { body, .. } => bodies.push(body),
                Message::Login { .. } | Message::GetTime | Message::GetUsers => {}
                other => panic!("unexpected frame from client: {other:?}"),
            }
        }
        bodies
    });

    let mut senders = Vec::new();
    for task in 0..TASKS {
        let session = Arc::clone(&session);
        senders.push(tokio::spawn(async move {
            for i in 0..PER_TASK {
                let body = format!("task{task}-msg{i}-{}", "#".repeat(100));
                session.send_message("10.0.0.2", &body, false).await.unwrap();
            }
        }));
    }
    for sender in senders {
        sender.await.unwrap();
    }

    let bodies = reader.await.unwrap();
    assert_eq!(bodies.len(), TASKS * PER_TASK);

    // Every task's messages arrived whole and in that task's order.
    let mut next_index: HashMap<usize, usize> = HashMap::new();
    for body in &bodies {
        let (task, rest) = body
            .strip_prefix("task")
            .and_then(|b| b.split_once("-msg"))
            .unwrap();
        let (index, padding) = rest.split_once('-').unwrap();
        assert_eq!(padding, "#".repeat(100));
        let task: usize = task.parse().unwrap();
        let index: usize = index.parse().unwrap();
        let expected = next_index.entry(task).or_default();
        assert_eq!(index, *expected);
        *expected += 1;
    }

    session.disconnect().await;
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_remote_close_reports_exactly_once() {
    let (session, mut events, server) = started(SessionConfig::default()).await;
    drop(server);

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::ConnectionError {
            message: "remote disconnected".into(),
            cause: None,
        }
    );
    assert!(!session.is_connected());
    assert!(matches!(
        session.send_message("", "anyone?", true).await,
        Err(SessionError::Closed)
    ));

    let rest = remaining_events(session, events).await;
    assert!(
        !rest
            .iter()
            .any(|e| matches!(e, SessionEvent::ConnectionError { .. })),
        "error reported twice: {rest:?}"
    );
}

#[tokio::test]
async fn test_explicit_disconnect_reports_nothing() {
    let (session, events, mut server) = started(SessionConfig::default()).await;

    session.disconnect().await;
    assert!(!session.is_connected());

    // The socket is closed: the server sees a clean end of stream.
    for msg in server.drain_until_closed().await {
        assert_eq!(msg, Message::GetUsers);
    }
    drop(server);

    assert!(matches!(
        session.send_message("", "late", true).await,
        Err(SessionError::Closed)
    ));
    assert!(remaining_events(session, events).await.is_empty());
}

#[tokio::test]
async fn test_disconnect_lets_a_message_in_flight_finish() {
    // A small pipe: the message below cannot be written until the server
    // reads, so it is still in flight when disconnect starts.
    let (client, server) = tokio::io::duplex(256);
    let (session, mut events) = ChatSession::start(client, "alice", SessionConfig::default())
        .await
        .unwrap();
    let session = Arc::new(session);
    let mut server = FakeServer { stream: server };
    let text = "x".repeat(8 * 1024);

    let sending = {
        let session = Arc::clone(&session);
        let text = text.clone();
        tokio::spawn(async move { session.send_message("10.0.0.2", &text, false).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let closing = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.disconnect().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Every frame arrives whole, then a clean end of stream.
    let received = tokio::time::timeout(EVENT_WAIT, server.drain_until_closed())
        .await
        .expect("socket was not closed");
    assert!(received.contains(&Message::send("10.0.0.2", text, false)));

    closing.await.unwrap();
    sending.await.unwrap().unwrap();
    assert!(!session.is_connected());
    assert_eq!(events.try_recv(), None);
}

#[tokio::test]
async fn test_disconnect_twice_is_harmless() {
    let (session, _events, _server) = started(SessionConfig::default()).await;
    session.disconnect().await;
    session.disconnect().await;
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_concurrent_disconnects_both_return() {
    let (session, _events, _server) = started(SessionConfig::default()).await;
    let session = Arc::new(session);
    let other = Arc::clone(&session);

    tokio::join!(session.disconnect(), other.disconnect());
    assert!(!session.is_connected());
}

#[tokio::test]
async fn test_disconnect_after_remote_close() {
    let (session, mut events, server) = started(SessionConfig::default()).await;
    drop(server);
    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::ConnectionError { .. }
    ));
    session.disconnect().await;
}

#[tokio::test]
async fn test_dropping_the_session_closes_the_socket() {
    let (session, _events, mut server) = started(SessionConfig::default()).await;
    drop(session);

    let rest = tokio::time::timeout(EVENT_WAIT, server.drain_until_closed())
        .await
        .expect("socket was not closed");
    assert!(rest.iter().all(|m| *m == Message::GetUsers));
}

/// Accepts writes until `broken` is set, then fails them. Reads never
/// complete.
struct DeafStream {
    broken: Arc<AtomicBool>,
}

impl AsyncRead for DeafStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _: &mut Context<'_>,
        _: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

impl AsyncWrite for DeafStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.broken.load(Ordering::SeqCst) {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone")))
        } else {
            Poll::Ready(Ok(buf.len()))
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_is_returned_not_reported() {
    let broken = Arc::new(AtomicBool::new(false));
    let stream = DeafStream {
        broken: Arc::clone(&broken),
    };
    let (session, events) = ChatSession::start(stream, "alice", SessionConfig::default())
        .await
        .unwrap();

    broken.store(true, Ordering::SeqCst);
    let err = session.send_message("", "hello?", true).await.unwrap_err();
    assert!(matches!(err, SessionError::Write(_)));
    assert!(err.is_fatal());
    assert!(!session.is_connected());

    // The caller got the error; the UI is not told a second time.
    assert!(remaining_events(session, events).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_poll_write_failure_is_reported_once() {
    let broken = Arc::new(AtomicBool::new(false));
    let stream = DeafStream {
        broken: Arc::clone(&broken),
    };
    let (session, mut events) = ChatSession::start(stream, "alice", SessionConfig::default())
        .await
        .unwrap();

    broken.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(5)).await;

    match next_event(&mut events).await {
        SessionEvent::ConnectionError { message, cause } => {
            assert_eq!(message, "failed to request the user list");
            assert!(cause.is_some());
        }
        other => panic!("expected a connection error, got {other:?}"),
    }
    assert!(!session.is_connected());
    assert!(remaining_events(session, events).await.is_empty());
}
