//! Session and message types.

use chrono::{DateTime, Utc};
use haven_remote::{HistoryMessage, TranscriptRole};
use uuid::Uuid;

use crate::title::SENTINEL_TITLE;

/// The author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// A message typed by the user.
    User,
    /// A reply from the remote assistant.
    Assistant,
}

impl From<TranscriptRole> for Role {
    #[inline]
    fn from(role: TranscriptRole) -> Self {
        match role {
            TranscriptRole::Human => Role::User,
            TranscriptRole::Ai => Role::Assistant,
        }
    }
}

/// A single message of a session transcript.
///
/// Messages are immutable once created; a transcript only ever grows
/// by appending.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Opaque unique identifier.
    pub id: String,
    /// The message text.
    pub content: String,
    /// The author of the message.
    pub role: Role,
    /// Creation time. Not authoritative across client and server;
    /// used for display only.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(content: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            content: content.into(),
            role,
            timestamp: Utc::now(),
        }
    }

    /// Creates a user message with a fresh id and timestamp.
    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(content, Role::User)
    }

    /// Creates an assistant message with a fresh id and timestamp.
    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(content, Role::Assistant)
    }
}

impl From<HistoryMessage> for Message {
    fn from(msg: HistoryMessage) -> Self {
        Self::new(msg.content, msg.role.into())
    }
}

/// One conversation thread: an ordered transcript plus its derived
/// display title.
#[derive(Clone, Debug)]
pub struct Session {
    /// Opaque unique identifier, client-generated or remote-assigned.
    pub id: String,
    /// Display title. Starts as the sentinel and is locked once
    /// derived from the session's first user message.
    pub title: String,
    /// The transcript, in insertion order.
    pub messages: Vec<Message>,
    pub(crate) history_loaded: bool,
    /// Whether the remote listing has ever reported this session.
    /// Sessions it has stop being local-only; if they later vanish
    /// from the listing they were deleted elsewhere.
    pub(crate) remote_known: bool,
    pub(crate) remote_messages: u64,
}

impl Session {
    /// A locally created session has no remote history to fetch.
    pub(crate) fn new_local(id: String) -> Self {
        Self {
            id,
            title: SENTINEL_TITLE.to_owned(),
            messages: Vec::new(),
            history_loaded: true,
            remote_known: false,
            remote_messages: 0,
        }
    }

    /// A session discovered via the remote listing; its transcript is
    /// populated lazily on first selection.
    pub(crate) fn known_remote(id: String, remote_messages: u64) -> Self {
        Self {
            id,
            title: SENTINEL_TITLE.to_owned(),
            messages: Vec::new(),
            history_loaded: false,
            remote_known: true,
            remote_messages,
        }
    }

    /// Returns the first user-authored message, if any.
    pub fn first_user_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role == Role::User)
    }

    /// Message count to display in a listing: the server-reported
    /// count until the transcript has been loaded.
    pub fn message_count(&self) -> u64 {
        if self.history_loaded {
            self.messages.len() as u64
        } else {
            self.remote_messages
        }
    }
}

/// A renderer-facing listing row for one session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    /// The session id.
    pub id: String,
    /// The display title (cached derivation, or the sentinel).
    pub title: String,
    /// Message count, see [`Session::message_count`].
    pub message_count: u64,
}
