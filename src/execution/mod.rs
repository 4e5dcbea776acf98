//! Phase execution.
//!
//! This module provides phase implementations beyond plain closures,
//! currently external command execution.

mod command;

pub use command::{CommandPhase, CommandPhaseBuilder};
