//! pendulum - A cooperative two-phase cycle scheduler.
//!
//! Usage:
//!   pendulum run <schedule.yaml>       Run a schedule
//!   pendulum validate <schedule.yaml>  Validate a schedule without running
//!   pendulum show <schedule.yaml>      Show schedule details

use clap::{Parser, Subcommand};
use pendulum::{CycleCount, Event, EventBus, EventHandler, ScheduleBuilder, YamlLoader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// pendulum - A cooperative two-phase cycle scheduler
#[derive(Parser)]
#[command(name = "pendulum")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a schedule from a YAML file
    Run {
        /// Path to the schedule YAML file
        #[arg(value_name = "SCHEDULE")]
        schedule: PathBuf,

        /// Override the number of cycles (a number or "unbounded")
        #[arg(short = 'c', long, value_parser = parse_cycles)]
        cycles: Option<CycleCount>,

        /// Override the delay between phases in milliseconds
        #[arg(short = 'd', long)]
        delay_ms: Option<u64>,
    },

    /// Validate a schedule without running it
    Validate {
        /// Path to the schedule YAML file
        #[arg(value_name = "SCHEDULE")]
        schedule: PathBuf,
    },

    /// Show schedule details
    Show {
        /// Path to the schedule YAML file
        #[arg(value_name = "SCHEDULE")]
        schedule: PathBuf,
    },
}

/// Parse a cycles override from the command line.
fn parse_cycles(s: &str) -> Result<CycleCount, String> {
    if s == "unbounded" {
        return Ok(CycleCount::Unbounded);
    }
    s.parse::<u32>()
        .map(CycleCount::Finite)
        .map_err(|_| format!("expected a number or \"unbounded\", got '{}'", s))
}

/// Simple logging event handler that prints schedule events.
struct LoggingHandler;

#[async_trait::async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &Event) {
        match event {
            Event::RunStarted {
                run_id,
                total_cycles,
                ..
            } => {
                info!("Run {} started: {} cycle(s)", run_id, total_cycles);
            }
            Event::PhaseStarted {
                direction, cycle, ..
            } => {
                info!("  Cycle {}: {} phase started", cycle + 1, direction);
            }
            Event::PhaseCompleted {
                direction,
                cycle,
                duration,
                ..
            } => {
                info!(
                    "  Cycle {}: {} phase completed in {:?}",
                    cycle + 1,
                    direction,
                    duration
                );
            }
            Event::PhaseFailed {
                direction,
                cycle,
                error,
                ..
            } => {
                warn!("  Cycle {}: {} phase failed: {}", cycle + 1, direction, error);
            }
            Event::CycleCompleted { cycle, .. } => {
                info!("  Cycle {} complete", cycle);
            }
            Event::RunStopped {
                cycles_completed, ..
            } => {
                info!("Run stopped after {} cycle(s)", cycles_completed);
            }
            Event::RunCompleted {
                cycles_completed, ..
            } => {
                info!("Run completed: {} cycle(s)", cycles_completed);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            schedule,
            cycles,
            delay_ms,
        } => {
            run_schedule(schedule, cycles, delay_ms).await?;
        }
        Commands::Validate { schedule } => {
            validate_schedule(schedule)?;
        }
        Commands::Show { schedule } => {
            show_schedule(schedule)?;
        }
    }

    Ok(())
}

/// Run a schedule loaded from a YAML file.
async fn run_schedule(
    file: PathBuf,
    cycles: Option<CycleCount>,
    delay_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Loading schedule from: {}", file.display());

    let config = YamlLoader::load_schedule(&file)?;
    let name = config.name.clone();

    // Create event bus with logging handler
    let event_bus = EventBus::new();
    event_bus.register(Arc::new(LoggingHandler)).await;

    let mut scheduler = ScheduleBuilder::build(config)?.with_event_bus(event_bus);

    // Apply command-line overrides
    if let Some(cycles) = cycles {
        scheduler = scheduler.with_cycles(cycles);
    }
    if let Some(ms) = delay_ms {
        scheduler = scheduler.with_delay(Duration::from_millis(ms));
    }

    info!(
        "Starting schedule '{}': {} cycle(s), {}ms between phases",
        name,
        scheduler.cycles(),
        scheduler.delay().as_millis()
    );
    info!("Press Ctrl+C to stop");

    let mut run = scheduler.start().await;

    // Wait for natural completion or Ctrl+C
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Stopping...");
            scheduler.stop().await;
            run.await?;
        }
        result = &mut run => {
            result?;
        }
    }

    let status = scheduler.status().await;
    if status.stopped {
        info!(
            "Schedule '{}' stopped after {} of {} cycle(s)",
            name, status.cycle, status.total_cycles
        );
    } else {
        info!("Schedule '{}' finished: {} cycle(s)", name, status.cycle);
    }

    Ok(())
}

/// Validate a schedule configuration without running it.
fn validate_schedule(file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating: {}", file.display());

    let config = YamlLoader::load_schedule(&file).and_then(|config| {
        let name = config.name.clone();
        ScheduleBuilder::build(config).map(|scheduler| (name, scheduler))
    });

    match config {
        Ok((name, scheduler)) => {
            info!(
                "Schedule '{}' is valid: {} cycle(s), {}ms between phases",
                name,
                scheduler.cycles(),
                scheduler.delay().as_millis()
            );
            Ok(())
        }
        Err(e) => {
            error!("Validation failed: {}", e);
            Err(e.into())
        }
    }
}

/// Show the details of a schedule.
fn show_schedule(file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = YamlLoader::load_schedule(&file)?;

    println!("Schedule: {}", config.name);
    if let Some(desc) = &config.description {
        println!("  Description: {}", desc);
    }
    println!("  Cycles: {}", config.cycles.resolve()?);
    println!("  Delay: {}ms", config.delay_ms);
    println!();

    for (label, phase) in [("Forward", &config.forward), ("Backward", &config.backward)] {
        let command_line = std::iter::once(phase.command.clone())
            .chain(phase.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");

        println!("{} phase: {}", label, phase.name.as_deref().unwrap_or(&label.to_lowercase()));
        println!("  Command: {}", command_line);
        if let Some(dir) = &phase.working_dir {
            println!("  Working dir: {}", dir);
        }
        if let Some(secs) = phase.timeout_secs {
            println!("  Timeout: {}s", secs);
        }
        if !phase.environment.is_empty() {
            println!("  Environment: {} var(s)", phase.environment.len());
        }
        println!();
    }

    Ok(())
}
