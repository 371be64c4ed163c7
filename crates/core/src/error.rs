use std::fmt::Display;

use thiserror::Error;

/// Errors surfaced by the session store.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The remote service could not be reached or returned an
    /// unusable response. The prior local state is left untouched.
    #[error("remote service unavailable: {0}")]
    RemoteUnavailable(String),
    /// The named session does not exist in the store.
    #[error("session not found: {0}")]
    SessionNotFound(String),
}

impl StoreError {
    pub(crate) fn remote(err: impl Display) -> Self {
        Self::RemoteUnavailable(err.to_string())
    }
}
