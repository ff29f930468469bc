//! The user list and the receiver choices built from it.
//!
//! The server sends the user list in whatever order it likes. A [`Roster`]
//! sorts it by name and builds the receiver choices the UI shows: every
//! user, then the [`Recipient::Everyone`] broadcast entry.
//!
//! `Everyone` is its own enum variant, not a `User` with a magic name. A
//! real user who happens to be called "Everyone" is just a user.

use std::fmt;

use parley_protocol::User;

/// The label shown for the broadcast entry.
pub const BROADCAST_LABEL: &str = "Everyone";

/// Who a chat message is for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Recipient {
    /// One user, reached by their network address.
    User(User),
    /// Everyone connected to the server.
    Everyone,
}

impl Recipient {
    /// The `(receiver, broadcast)` pair that goes into a `SendMessage`
    /// request: the user's address, or an empty receiver with the
    /// broadcast flag set.
    pub fn wire_target(&self) -> (&str, bool) {
        match self {
            Self::User(user) => (&user.address, false),
            Self::Everyone => ("", true),
        }
    }

    /// What the UI shows for this choice.
    pub fn label(&self) -> &str {
        match self {
            Self::User(user) => &user.name,
            Self::Everyone => BROADCAST_LABEL,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Everyone)
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<User> for Recipient {
    fn from(user: User) -> Self {
        Self::User(user)
    }
}

/// A snapshot of the connected users, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    users: Vec<User>,
}

impl Roster {
    /// Sorts `users` by name. The sort is stable, so users with the same
    /// name keep the server's relative order.
    pub fn new(mut users: Vec<User>) -> Self {
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Self { users }
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// First user with this name.
    pub fn find(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name)
    }

    /// Every user in name order, followed by [`Recipient::Everyone`].
    pub fn receiver_choices(&self) -> Vec<Recipient> {
        self.users
            .iter()
            .cloned()
            .map(Recipient::User)
            .chain(std::iter::once(Recipient::Everyone))
            .collect()
    }

    /// Keeps the UI's selection across a roster refresh.
    ///
    /// Returns `current` if it is still a valid choice. A selected user is
    /// matched by name, so an address change doesn't lose the selection,
    /// and the returned `Recipient` carries the new address. Returns
    /// `None` when nothing was selected or the selected user has left.
    pub fn reselect(&self, current: Option<&Recipient>) -> Option<Recipient> {
        match current? {
            Recipient::Everyone => Some(Recipient::Everyone),
            Recipient::User(user) => self.find(&user.name).cloned().map(Recipient::User),
        }
    }
}
