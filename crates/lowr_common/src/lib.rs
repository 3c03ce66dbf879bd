//! Shared foundational types used across the lowr lowering middle-end.
//!
//! This crate provides interned identifiers, content fingerprints, and the
//! [`LowerError`] taxonomy every pass reports through.

#![warn(missing_docs)]

pub mod hash;
pub mod ident;
pub mod result;

pub use hash::ContentHash;
pub use ident::{Ident, Interner};
pub use result::{LowerError, LowerResult};
