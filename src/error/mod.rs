//! Error types for the graph engine.
//!
//! Every failure is an [`Error`] carrying an [`ErrorKind`] category.
//!
//! ## Key Invariant
//!
//! A denied check is not an error: `check()` returns
//! [`Membership::NotMember`](crate::dispatch::Membership::NotMember).
//! Errors mean the engine could not produce a complete answer; no partial
//! result is ever returned alongside one.

#[allow(clippy::module_inception)]
mod error;
mod kind;

pub use error::Error;
pub use kind::ErrorKind;

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
