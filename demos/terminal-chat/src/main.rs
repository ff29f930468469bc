//! A line-oriented chat client for the terminal.
//!
//! ```text
//! cargo run -p terminal-chat -- --user alice --server localhost:8989
//! ```
//!
//! Commands:
//!
//! ```text
//! /to <name> <text>   message one user (and make them the default target)
//! /all <text>         message everyone (and make that the default target)
//! /users              show who is online
//! /quit               disconnect and exit
//! <text>              message the default target
//! ```

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use clap::Parser;
use parley::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "terminal-chat", about = "Terminal client for a Parley chat server")]
struct Args {
    /// Name to log in with
    #[arg(long, env = "PARLEY_USER")]
    user: String,

    /// Chat server, as host or host:port
    #[arg(long, env = "PARLEY_SERVER", default_value = "localhost:8989")]
    server: String,

    /// Seconds between user-list refreshes
    #[arg(long, env = "PARLEY_POLL_SECS", default_value = "5")]
    poll_secs: u64,

    /// Seconds to wait for the server to accept the connection
    #[arg(long, env = "PARLEY_CONNECT_TIMEOUT_SECS", default_value = "10")]
    connect_timeout_secs: u64,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    To { name: &'a str, text: &'a str },
    All(&'a str),
    Users,
    Quit,
    Say(&'a str),
    Empty,
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Say(line);
        };
        let (word, args) = rest.split_once(' ').unwrap_or((rest, ""));
        let args = args.trim();
        match word {
            "to" => match args.split_once(' ') {
                Some((name, text)) if !text.trim().is_empty() => Self::To {
                    name,
                    text: text.trim(),
                },
                _ => Self::Unknown(line),
            },
            "all" if !args.is_empty() => Self::All(args),
            "users" => Self::Users,
            "quit" => Self::Quit,
            _ => Self::Unknown(line),
        }
    }
}

// ---------------------------------------------------------------------------
// UI state
// ---------------------------------------------------------------------------

/// Everything the screen shows, owned by the main task.
struct Terminal {
    roster: Roster,
    target: Recipient,
    connected: bool,
}

impl Terminal {
    fn new() -> Self {
        Self {
            roster: Roster::default(),
            target: Recipient::Everyone,
            connected: true,
        }
    }

    fn print_users(&self) {
        if self.roster.is_empty() {
            println!("* nobody else is online");
            return;
        }
        for user in self.roster.users() {
            println!("*   {user}");
        }
    }
}

impl SessionListener for Terminal {
    fn on_user_list_updated(&mut self, roster: &Roster) {
        let before = self.roster.len();
        self.roster = roster.clone();
        self.target = roster
            .reselect(Some(&self.target))
            .unwrap_or(Recipient::Everyone);
        if before != roster.len() {
            println!("* {} user(s) online", roster.len());
        }
    }

    fn on_message_received(&mut self, sender: &str, text: &str, broadcast: bool) {
        if broadcast {
            println!("[all] {sender}: {text}");
        } else {
            println!("{sender}: {text}");
        }
    }

    fn on_server_time_received(&mut self, utc_millis: i64) {
        match server_time(utc_millis) {
            Some(time) => println!("* server time {time}"),
            None => println!("* server sent an invalid time ({utc_millis})"),
        }
    }

    fn on_connection_error(&mut self, message: &str, cause: Option<&str>) {
        self.connected = false;
        match cause {
            Some(cause) => eprintln!("! {message}: {cause}"),
            None => eprintln!("! {message}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let address: ServerAddress = args.server.parse()?;

    let (session, mut events) = ChatSession::builder()
        .connect_timeout(Duration::from_secs(args.connect_timeout_secs))
        .poll_interval(Duration::from_secs(args.poll_secs))
        .connect_to(&args.user, &address)
        .await?;
    println!("* connected to {address} as {}", session.username());

    let mut terminal = Terminal::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while terminal.connected {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => event.deliver(&mut terminal),
                None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(&session, &mut terminal, &line).await {
                    break;
                }
            }
        }
    }

    session.disconnect().await;
    println!("* disconnected");
    Ok(())
}

/// Runs one input line. Returns `false` when the user asked to quit.
async fn handle_line(session: &ChatSession, terminal: &mut Terminal, line: &str) -> bool {
    let sent = match Command::parse(line) {
        Command::Quit => return false,
        Command::Empty => return true,
        Command::Users => {
            terminal.print_users();
            return true;
        }
        Command::Unknown(input) => {
            println!("* unknown command: {input}");
            return true;
        }
        Command::To { name, text } => match terminal.roster.find(name) {
            Some(user) => {
                terminal.target = Recipient::User(user.clone());
                session.send_to(&terminal.target, text).await
            }
            None => {
                println!("* no user named {name}");
                return true;
            }
        },
        Command::All(text) => {
            terminal.target = Recipient::Everyone;
            session.send_to(&terminal.target, text).await
        }
        Command::Say(text) => session.send_to(&terminal.target, text).await,
    };

    if let Err(e) = sent {
        tracing::debug!(error = %e, "send failed");
        eprintln!("! message not sent: {e}");
        if e.is_fatal() {
            terminal.connected = false;
        }
    }
    true
}

/// RFC 3339, whole seconds, `Z` suffix.
fn server_time(utc_millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(utc_millis)
        .map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("/to bob hi there"),
            Command::To {
                name: "bob",
                text: "hi there"
            }
        );
        assert_eq!(Command::parse("/all  hello "), Command::All("hello"));
        assert_eq!(Command::parse("/users"), Command::Users);
        assert_eq!(Command::parse("/quit"), Command::Quit);
        assert_eq!(Command::parse("just talking"), Command::Say("just talking"));
        assert_eq!(Command::parse("   "), Command::Empty);
    }

    #[test]
    fn test_parse_incomplete_commands() {
        assert_eq!(Command::parse("/to bob"), Command::Unknown("/to bob"));
        assert_eq!(Command::parse("/all"), Command::Unknown("/all"));
        assert_eq!(Command::parse("/dance"), Command::Unknown("/dance"));
    }

    #[test]
    fn test_target_follows_roster() {
        let mut terminal = Terminal::new();
        terminal.on_user_list_updated(&Roster::new(vec![User::new("bob", "10.0.0.2")]));
        terminal.target = Recipient::User(User::new("bob", "10.0.0.2"));

        terminal.on_user_list_updated(&Roster::new(vec![User::new("carol", "10.0.0.3")]));
        assert_eq!(terminal.target, Recipient::Everyone);
    }

    #[test]
    fn test_connection_error_stops_the_loop() {
        let mut terminal = Terminal::new();
        terminal.on_connection_error("remote disconnected", None);
        assert!(!terminal.connected);
    }

    #[test]
    fn test_server_time_is_rfc3339() {
        assert_eq!(
            server_time(1_700_000_000_000).as_deref(),
            Some("2023-11-14T22:13:20Z")
        );
        assert_eq!(server_time(i64::MAX), None);
    }
}
