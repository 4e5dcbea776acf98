//! Scheduler type definitions.
//!
//! This module contains the status snapshot reported by the scheduler.

use serde::Serialize;

use crate::core::types::{Direction, RunId};

/// A point-in-time snapshot of a scheduler's run state.
///
/// Reading a snapshot has no side effects; two consecutive reads with no
/// scheduling activity in between are identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleStatus {
    /// The run this snapshot belongs to.
    pub run_id: RunId,
    /// Completed cycles so far. Never exceeds `total_cycles`.
    pub cycle: u32,
    /// The effective cycle total the run will execute.
    pub total_cycles: u32,
    /// The phase currently running or most recently run.
    pub direction: Direction,
    /// Whether a stop has been requested.
    pub stopped: bool,
    /// Whether the scheduler is currently waiting out the inter-phase delay.
    pub timer_pending: bool,
}

impl CycleStatus {
    /// Whether the run finished all of its cycles without being stopped.
    pub fn is_complete(&self) -> bool {
        !self.stopped && self.cycle >= self.total_cycles
    }
}
