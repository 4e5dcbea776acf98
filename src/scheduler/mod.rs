//! Cycle scheduler.
//!
//! This module provides the driver loop that alternates the forward and
//! backward phases, along with the status snapshot it reports.

mod engine;
mod types;

pub use engine::CycleScheduler;
pub use types::CycleStatus;
