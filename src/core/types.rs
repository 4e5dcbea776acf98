//! Core vocabulary types for the cycle scheduler.
//!
//! These types describe phase direction, cycle counts, and run identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Upper bound on the number of cycles a single run may execute.
///
/// Unbounded schedules resolve to this many cycles, and finite requests
/// above it are clamped down to it at construction time.
pub const MAX_CYCLES: u32 = 5000;

/// The direction of the phase currently being (or about to be) executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The forward phase of a cycle. Every run begins here.
    Forward,
    /// The backward phase of a cycle. Completing it completes the cycle.
    Backward,
}

impl Direction {
    /// The direction that follows this one in the alternation.
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Backward => write!(f, "backward"),
        }
    }
}

/// How many cycles a schedule should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleCount {
    /// Run exactly this many cycles. Zero is valid and completes immediately.
    Finite(u32),
    /// Run until stopped, capped at [`MAX_CYCLES`].
    Unbounded,
}

impl CycleCount {
    /// Resolve to the concrete cycle total the scheduler will honor.
    ///
    /// `Unbounded` maps to [`MAX_CYCLES`]; finite counts above the cap are
    /// clamped to it. This is the single enforcement point for the cap.
    pub fn effective(&self) -> u32 {
        match self {
            CycleCount::Finite(n) => (*n).min(MAX_CYCLES),
            CycleCount::Unbounded => MAX_CYCLES,
        }
    }

    /// Whether this count was requested as unbounded.
    pub fn is_unbounded(&self) -> bool {
        matches!(self, CycleCount::Unbounded)
    }
}

impl From<u32> for CycleCount {
    fn from(n: u32) -> Self {
        CycleCount::Finite(n)
    }
}

impl fmt::Display for CycleCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleCount::Finite(n) => write!(f, "{}", n),
            CycleCount::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Unique identifier for one run of a schedule.
///
/// A fresh `RunId` is issued every time the scheduler is started, so log
/// lines and events from superseded runs remain distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Generate a new random RunId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a RunId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
