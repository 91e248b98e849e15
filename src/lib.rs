//! msg-transfer - chat message delivery and read-receipt fan-out.
//!
//! Persists inbound chat messages and pushes them to their recipients, and
//! turns mark-read events into per-message read state that is pushed back to
//! the conversation, merging group receipts per conversation.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing dispatchers and their services.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "msg-transfer";
