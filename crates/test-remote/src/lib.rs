//! A local fake conversation service for testing purpose.

mod canned;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use haven_remote::{
    BackendError, ChatBackend, ChatReply, ChatRequest, ConversationSummary,
    ErrorKind, HistoryMessage, TranscriptRole,
};
use tokio::time::sleep;

pub use canned::*;

/// Error type for [`TestBackend`].
#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl BackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

fn unavailable(message: &'static str) -> Error {
    Error {
        message,
        kind: ErrorKind::Unavailable,
    }
}

#[derive(Default)]
struct Inner {
    /// Threads in recency order, most recently touched first.
    threads: Vec<(String, Vec<HistoryMessage>)>,
    replies: Vec<String>,
    next_reply: usize,
    /// If set, the first `n` calls of the endpoint fail. `Some(0)`
    /// means the calls fail infinitely.
    chat_failures: Option<u64>,
    list_failures: Option<u64>,
    history_failures: Option<u64>,
    delay: Option<Duration>,
    history_delay: Option<Duration>,
    chat_calls: u64,
    list_calls: u64,
    history_calls: HashMap<String, u64>,
}

impl Inner {
    /// Returns the thread for a session, creating it if absent, and
    /// moves it to the front of the recency order.
    fn touch_thread(&mut self, session_id: &str) -> &mut Vec<HistoryMessage> {
        if let Some(idx) =
            self.threads.iter().position(|(id, _)| id == session_id)
        {
            let entry = self.threads.remove(idx);
            self.threads.insert(0, entry);
        } else {
            self.threads.insert(0, (session_id.to_owned(), Vec::new()));
        }
        &mut self.threads[0].1
    }

    fn take_failure(slot: &mut Option<u64>) -> bool {
        match *slot {
            Some(0) => true,
            Some(n) => {
                *slot = (n > 1).then_some(n - 1);
                true
            }
            None => false,
        }
    }
}

/// A local fake conversation service.
///
/// The backend keeps its threads in memory and answers chat requests
/// from a canned reply set, cycling through it deterministically.
/// Like the real service, a chat request persists both the user
/// message and the reply, the listing is ordered by recency, and the
/// history of an unknown session is empty rather than an error.
///
/// Clones share the same state, so a test can keep one handle for
/// assertions while the store owns another.
///
/// # Note
///
/// This type is not optimized for production use. You should only use
/// it for testing and demos.
#[derive(Clone, Default)]
pub struct TestBackend {
    inner: Arc<Mutex<Inner>>,
}

impl TestBackend {
    /// Creates an empty backend with the default canned reply set.
    pub fn new() -> Self {
        let backend = Self::default();
        backend.state().replies = default_replies();
        backend
    }

    /// Creates a backend pre-populated with the demo threads.
    pub fn seeded() -> Self {
        let backend = Self::new();
        {
            let mut state = backend.state();
            for (id, thread) in demo_threads() {
                state.threads.push((id, thread));
            }
        }
        backend
    }

    fn state(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("test backend state poisoned")
    }

    /// Replaces the canned reply set.
    pub fn set_replies(&self, replies: impl Into<Vec<String>>) {
        let mut state = self.state();
        state.replies = replies.into();
        state.next_reply = 0;
    }

    /// Sets an artificial delay applied before each chat reply.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    /// Sets an artificial delay applied before each history response.
    pub fn set_history_delay(&self, delay: Duration) {
        self.state().history_delay = Some(delay);
    }

    /// Sets failure times for the chat endpoint. `Some(0)` means the
    /// endpoint will always fail.
    pub fn set_chat_failures(&self, failures: Option<u64>) {
        self.state().chat_failures = failures;
    }

    /// Sets failure times for the listing endpoint. `Some(0)` means
    /// the endpoint will always fail.
    pub fn set_list_failures(&self, failures: Option<u64>) {
        self.state().list_failures = failures;
    }

    /// Sets failure times for the history endpoint. `Some(0)` means
    /// the endpoint will always fail.
    pub fn set_history_failures(&self, failures: Option<u64>) {
        self.state().history_failures = failures;
    }

    /// Inserts a thread, placing it at the front of the recency
    /// order.
    pub fn insert_thread(
        &self,
        session_id: impl Into<String>,
        messages: impl Into<Vec<HistoryMessage>>,
    ) {
        let mut state = self.state();
        let session_id = session_id.into();
        state.threads.retain(|(id, _)| *id != session_id);
        state.threads.insert(0, (session_id, messages.into()));
    }

    /// Returns a copy of a session's stored thread.
    pub fn thread(&self, session_id: &str) -> Vec<HistoryMessage> {
        self.state()
            .threads
            .iter()
            .find(|(id, _)| id == session_id)
            .map(|(_, msgs)| msgs.clone())
            .unwrap_or_default()
    }

    /// Number of chat requests received so far.
    pub fn chat_calls(&self) -> u64 {
        self.state().chat_calls
    }

    /// Number of listing requests received so far.
    pub fn list_calls(&self) -> u64 {
        self.state().list_calls
    }

    /// Number of history requests received for one session.
    pub fn history_calls(&self, session_id: &str) -> u64 {
        self.state()
            .history_calls
            .get(session_id)
            .copied()
            .unwrap_or(0)
    }
}

impl ChatBackend for TestBackend {
    type Error = Error;

    fn list_conversations(
        &self,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, Error>> + Send + 'static
    {
        let inner = Arc::clone(&self.inner);
        async move {
            let mut state =
                inner.lock().expect("test backend state poisoned");
            state.list_calls += 1;
            if Inner::take_failure(&mut state.list_failures) {
                return Err(unavailable("listing endpoint is down"));
            }
            Ok(state
                .threads
                .iter()
                .map(|(id, msgs)| ConversationSummary {
                    session_id: id.clone(),
                    messages: msgs.len() as u64,
                    last_activity: None,
                })
                .collect())
        }
    }

    fn fetch_history(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Vec<HistoryMessage>, Error>> + Send + 'static
    {
        let inner = Arc::clone(&self.inner);
        let session_id = session_id.to_owned();
        async move {
            let delay = {
                let mut state =
                    inner.lock().expect("test backend state poisoned");
                *state.history_calls.entry(session_id.clone()).or_insert(0) +=
                    1;
                if Inner::take_failure(&mut state.history_failures) {
                    return Err(unavailable("history endpoint is down"));
                }
                state.history_delay
            };
            if let Some(delay) = delay {
                sleep(delay).await;
            }

            let state = inner.lock().expect("test backend state poisoned");
            Ok(state
                .threads
                .iter()
                .find(|(id, _)| *id == session_id)
                .map(|(_, msgs)| msgs.clone())
                .unwrap_or_default())
        }
    }

    fn send_chat(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<ChatReply, Error>> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        let req = req.clone();
        async move {
            let delay = {
                let mut state =
                    inner.lock().expect("test backend state poisoned");
                state.chat_calls += 1;
                if Inner::take_failure(&mut state.chat_failures) {
                    return Err(unavailable("chat endpoint is down"));
                }
                state.delay
            };
            if let Some(delay) = delay {
                sleep(delay).await;
            }

            let mut state =
                inner.lock().expect("test backend state poisoned");
            if state.replies.is_empty() {
                return Err(Error {
                    message: "no canned replies configured",
                    kind: ErrorKind::Other,
                });
            }
            let reply =
                state.replies[state.next_reply % state.replies.len()].clone();
            state.next_reply += 1;

            // Persist both sides, like the real service does.
            let thread = state.touch_thread(&req.session_id);
            thread.push(HistoryMessage {
                role: TranscriptRole::Human,
                content: req.message,
            });
            thread.push(HistoryMessage {
                role: TranscriptRole::Ai,
                content: reply.clone(),
            });

            Ok(ChatReply {
                answer: reply,
                sources: Vec::new(),
            })
        }
    }

    fn reset(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send + 'static {
        let inner = Arc::clone(&self.inner);
        let session_id = session_id.to_owned();
        async move {
            let mut state =
                inner.lock().expect("test backend state poisoned");
            state.threads.retain(|(id, _)| *id != session_id);
            Ok(())
        }
    }
}
