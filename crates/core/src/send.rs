use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use haven_remote::{ChatBackend, ChatRequest};
use thiserror::Error;

use crate::error::StoreError;
use crate::session::Message;
use crate::store::SessionStore;

/// How a send request was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message was accepted by the remote and the reply appended.
    Delivered,
    /// The request was dropped without side effects: either the text
    /// was blank, or another send was already in flight.
    Ignored,
}

/// Errors surfaced by [`SendCoordinator::send_message`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The remote rejected or never received the message. The
    /// optimistic append has been rolled back; `text` carries the
    /// original input so the caller can restore it to the composer.
    #[error("message could not be delivered: {reason}")]
    Undelivered {
        /// The text the user tried to send.
        text: String,
        /// Human-readable failure description.
        reason: String,
    },
    /// The store rejected the request before anything was sent.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drives the optimistic send protocol against a [`SessionStore`].
///
/// A send appends the user message to the transcript immediately,
/// performs the remote call, then appends the reply, so the UI can
/// render the outgoing message without waiting on the network. On
/// failure the transcript (and any title derived from the appended
/// message) is restored to its pre-send state.
///
/// At most one send is in flight at a time across all clones; extra
/// requests are ignored rather than queued.
pub struct SendCoordinator<B: ChatBackend> {
    store: SessionStore<B>,
    sending: Arc<AtomicBool>,
}

impl<B: ChatBackend> Clone for SendCoordinator<B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            sending: Arc::clone(&self.sending),
        }
    }
}

struct SendingGuard<'a>(&'a AtomicBool);

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<B: ChatBackend + 'static> SendCoordinator<B> {
    /// Creates a coordinator over the given store handle.
    pub fn new(store: SessionStore<B>) -> Self {
        Self {
            store,
            sending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a send is currently in flight.
    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::SeqCst)
    }

    /// Sends a message in the named session.
    ///
    /// Blank input (empty or whitespace-only after trimming) and
    /// requests arriving while another send is in flight return
    /// [`SendOutcome::Ignored`] without touching any state. A remote
    /// failure rolls the transcript back and returns
    /// [`SendError::Undelivered`] carrying the original text.
    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<SendOutcome, SendError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Ignored);
        }
        if self
            .sending
            .compare_exchange(
                false,
                true,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            debug!("send already in flight, ignoring request");
            return Ok(SendOutcome::Ignored);
        }
        let _guard = SendingGuard(&self.sending);

        let snapshot = self.store.snapshot(session_id)?;
        self.store
            .append_message(session_id, Message::user(text))?;

        let request = ChatRequest {
            session_id: session_id.to_owned(),
            message: text.to_owned(),
        };
        match self.store.backend().send_chat(&request).await {
            Ok(reply) => {
                self.store
                    .append_message(session_id, Message::assistant(reply.answer))?;
                // Pick up the server-side view of the thread we just
                // touched; a stale listing is not worth failing a
                // delivered send over.
                if let Err(err) = self.store.refresh_sessions().await {
                    warn!("post-send refresh failed: {err}");
                }
                Ok(SendOutcome::Delivered)
            }
            Err(err) => {
                error!("chat send failed: {err}");
                self.store.restore(snapshot);
                Err(SendError::Undelivered {
                    text: text.to_owned(),
                    reason: err.to_string(),
                })
            }
        }
    }
}
