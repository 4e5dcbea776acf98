//! Scheduler builder from YAML configuration.
//!
//! This module converts ScheduleConfig into a runnable CycleScheduler.

use std::sync::Arc;
use std::time::Duration;

use crate::core::phase::Phase;
use crate::core::types::Direction;
use crate::execution::CommandPhase;
use crate::scheduler::CycleScheduler;

use super::yaml::{ConfigError, PhaseConfig, ScheduleConfig};

/// Builder for creating schedulers from YAML configuration.
pub struct ScheduleBuilder;

impl ScheduleBuilder {
    /// Build a CycleScheduler from a ScheduleConfig.
    pub fn build(config: ScheduleConfig) -> Result<CycleScheduler, ConfigError> {
        let cycles = config.cycles.resolve()?;
        let forward = Self::build_phase(&config.forward, Direction::Forward);
        let backward = Self::build_phase(&config.backward, Direction::Backward);

        Ok(CycleScheduler::new(forward, backward)
            .with_cycles(cycles)
            .with_delay(config.delay()))
    }

    /// Build a command phase from PhaseConfig.
    fn build_phase(config: &PhaseConfig, direction: Direction) -> Arc<dyn Phase> {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| direction.to_string());

        let mut builder = CommandPhase::builder(&config.command)
            .name(name)
            .envs(&config.environment);

        for arg in &config.args {
            builder = builder.arg(arg);
        }

        // Set working directory
        if let Some(dir) = &config.working_dir {
            builder = builder.working_dir(dir);
        }

        // Set timeout
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Arc::new(builder.build())
    }
}
