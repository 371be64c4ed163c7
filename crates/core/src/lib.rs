//! Core session state management: the session store, the optimistic
//! send coordinator, and title derivation.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod send;
pub mod session;
mod store;
pub mod title;

pub use error::StoreError;
pub use send::{SendCoordinator, SendError, SendOutcome};
pub use session::{Message, Role, Session, SessionSummary};
pub use store::{SessionStore, SessionStoreBuilder, TranscriptSnapshot};
