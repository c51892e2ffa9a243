//! Core types and trait definitions for the plainwire fact ledger.
//!
//! This crate is deliberately free of HTTP, filesystem, and model-provider
//! dependencies. Every other crate depends on it.
//!
//! The ledger and oracle traits spell out `impl Future + Send` return types so
//! implementors can write plain `async fn` while callers keep `Send` futures.

pub mod candidate;
pub mod correction;
pub mod error;
pub mod ledger;
pub mod oracle;
pub mod region;
pub mod source;
pub mod story;
pub mod text;

pub use error::{Error, Result, ValidationError};
