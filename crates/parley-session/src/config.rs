//! Session configuration.
//!
//! Timeouts, the presence-poll cadence, and frame limits. Every field has
//! a sensible default, so the usual way to build one is:
//!
//! ```rust
//! use std::time::Duration;
//! use parley_session::SessionConfig;
//!
//! let config = SessionConfig {
//!     connect_timeout: Duration::from_secs(3),
//!     ..SessionConfig::default()
//! };
//! assert_eq!(config.poll_interval, Duration::from_secs(5));
//! ```

use std::time::Duration;

use parley_protocol::DEFAULT_MAX_FRAME_LEN;
use tracing::warn;

/// Configuration for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on DNS resolution plus TCP connect. Default: 10 s.
    pub connect_timeout: Duration,

    /// Delay between presence polls (`GetUsers` requests). Default: 5 s.
    pub poll_interval: Duration,

    /// Random delay (0 to this) before the FIRST presence poll. Spreads
    /// out the polls of many clients that start at the same instant.
    /// Default: 0 (poll immediately).
    pub poll_jitter: Duration,

    /// Largest frame payload accepted or sent. Default: 1 MiB.
    pub max_frame_len: usize,

    /// Give up on the connection if nothing arrives for this long.
    /// Default: `None` (wait forever). The presence poll normally keeps
    /// responses flowing, so something near 3× `poll_interval` is a
    /// reasonable value.
    pub read_idle_timeout: Option<Duration>,

    /// Treat a single write that takes longer than this as a failure.
    /// Default: `None`.
    pub write_timeout: Option<Duration>,

    /// How long a frame already being written may keep going after the
    /// session starts closing. A peer that reads nothing for this long
    /// gets a truncated frame and then end of stream. Default: 2 s.
    pub close_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(5),
            poll_jitter: Duration::ZERO,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            read_idle_timeout: None,
            write_timeout: None,
            close_grace: Duration::from_secs(2),
        }
    }
}

impl SessionConfig {
    /// Presence polls are never scheduled closer together than this.
    pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Largest value `max_frame_len` may take (the prefix is a `u32`).
    pub const MAX_FRAME_LEN_LIMIT: usize = u32::MAX as usize;

    /// Fixes any out-of-range values so the config is safe to use.
    ///
    /// Called by [`ChatSession::start`](crate::ChatSession::start). Rules:
    /// - a zero `connect_timeout` falls back to the default,
    /// - `poll_interval` is raised to at least [`Self::MIN_POLL_INTERVAL`],
    /// - `max_frame_len` of 0 falls back to the default and is capped at
    ///   [`Self::MAX_FRAME_LEN_LIMIT`],
    /// - zero read/write timeouts are treated as "no timeout".
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if self.connect_timeout.is_zero() {
            warn!("connect_timeout is zero, using default");
            self.connect_timeout = defaults.connect_timeout;
        }
        if self.poll_interval < Self::MIN_POLL_INTERVAL {
            warn!(
                interval = ?self.poll_interval,
                min = ?Self::MIN_POLL_INTERVAL,
                "poll_interval below minimum, clamping"
            );
            self.poll_interval = Self::MIN_POLL_INTERVAL;
        }
        if self.max_frame_len == 0 {
            self.max_frame_len = defaults.max_frame_len;
        }
        self.max_frame_len = self.max_frame_len.min(Self::MAX_FRAME_LEN_LIMIT);
        self.read_idle_timeout = self.read_idle_timeout.filter(|t| !t.is_zero());
        self.write_timeout = self.write_timeout.filter(|t| !t.is_zero());
        self
    }
}
