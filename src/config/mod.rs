//! Configuration loading and parsing.
//!
//! This module provides YAML-based configuration for cycle schedules.

mod builder;
mod yaml;

pub use builder::ScheduleBuilder;
pub use yaml::{ConfigError, CyclesConfig, PhaseConfig, ScheduleConfig, YamlLoader};
