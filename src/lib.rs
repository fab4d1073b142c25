//! vflowctl - control client for the vFlow core engine
//!
//! The engine exposes device capabilities over a newline-delimited JSON
//! protocol on a local TCP port. This library provides the session that
//! talks to it, a catalog of the capabilities it routes, and a tiered test
//! plan executor that exercises them.

pub mod catalog;
pub mod cli;
pub mod commands;
pub mod common;
pub mod control;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use control::{Outcome, Session, SessionOptions, SessionState};
