//! An abstraction layer for the remote conversation service.
//!
//! This crate establishes an unified protocol for the session core to
//! talk to whatever holds the actual conversations, so that the core
//! can run against a real HTTP service or an in-memory fake without
//! modification.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod backend;
mod error;
mod types;

pub use backend::*;
pub use error::*;
pub use types::*;
