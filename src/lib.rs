//! Cooperative two-phase cycle scheduling.
//!
//! Alternates a forward and a backward phase for a configured number of
//! cycles, with an interruptible delay between phases and failure isolation
//! around each phase.

pub mod config;
pub mod core;
pub mod events;
pub mod execution;
pub mod scheduler;
pub mod testing;

pub use config::{ConfigError, CyclesConfig, PhaseConfig, ScheduleBuilder, ScheduleConfig, YamlLoader};
pub use core::phase::{phase_fn, Phase, PhaseError};
pub use core::types::{CycleCount, Direction, RunId, MAX_CYCLES};
pub use events::{Event, EventBus, EventHandler};
pub use execution::{CommandPhase, CommandPhaseBuilder};
pub use scheduler::{CycleScheduler, CycleStatus};
