//! Shared test utilities for smeta integration tests.
//!
//! - `TestHarness`: temp directories, an in-memory record store and a
//!   pipeline wired to a scripted generation client
//! - `ScriptedGenerator`: fake generation client with queued responses

pub mod generator;
pub mod harness;

pub use generator::ScriptedGenerator;
pub use harness::TestHarness;
