//! Core types for the cycle scheduler.
//!
//! This module provides the phase trait, phase errors, and the vocabulary
//! types shared across the crate.

pub mod phase;
pub mod types;

pub use phase::{phase_fn, Phase, PhaseError};
pub use types::{CycleCount, Direction, RunId, MAX_CYCLES};
