//! JSON-file backend for the plainwire story ledger.
//!
//! Stories live in `stories.json` and the correction log in
//! `corrections.json`. Every mutation rewrites the affected file through a
//! temporary file and a rename, so readers never observe a torn write.

mod document;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::JsonLedger;

#[cfg(test)]
mod tests;
