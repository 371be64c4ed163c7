use std::error::Error;

use crate::error::ErrorKind;
use crate::types::{ChatReply, ChatRequest, ConversationSummary, HistoryMessage};

/// The error type for a chat backend.
pub trait BackendError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that represents the remote conversation service, which is
/// the entry for listing sessions, fetching transcripts and sending
/// chat messages.
///
/// Once the backend is created, it should behave like a stateless
/// object from the caller's perspective. It can still have internal
/// state, but callers should not rely on it, and the backend should
/// be prepared for being dropped anytime.
pub trait ChatBackend: Send + Sync {
    /// The error type that may be returned by the backend.
    type Error: BackendError;

    /// Lists the sessions known to the service, with per-session
    /// message counts but no content.
    fn list_conversations(
        &self,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, Self::Error>> + Send + 'static;

    /// Fetches the full transcript of a session, in order.
    ///
    /// An unknown or empty session yields an empty vector, not an
    /// error.
    fn fetch_history(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Vec<HistoryMessage>, Self::Error>> + Send + 'static;

    /// Sends one user message and returns the assistant's reply.
    fn send_chat(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<ChatReply, Self::Error>> + Send + 'static;

    /// Deletes all stored messages of a session. Best-effort.
    fn reset(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static;
}
