//! Shared test utilities for helpedge integration tests.
//!
//! This module provides:
//! - `FakeTransport`, a scripted in-memory mailbox with failure injection
//! - `MessageBuilder` for raw RFC 5322 messages
//! - `TestHarness` with a file-backed database in a temp directory

pub mod builders;
pub mod fake_transport;
pub mod harness;

pub use builders::*;
pub use fake_transport::FakeTransport;
pub use harness::TestHarness;
