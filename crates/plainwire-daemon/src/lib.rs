//! Wiring for the `plainwire` binary: configuration, the HTTP oracle client,
//! and the inbox headline feed. The binary itself lives in `main.rs`.

pub mod config;
pub mod inbox;
pub mod oracle;

pub use config::DaemonConfig;
pub use inbox::InboxFeed;
pub use oracle::HttpOracle;
