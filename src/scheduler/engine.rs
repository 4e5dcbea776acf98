//! Scheduler engine implementation.
//!
//! The scheduler is responsible for:
//! - Alternating the forward and backward phases, one cycle at a time
//! - Waiting out the configured delay between phases without blocking
//! - Containing phase failures so the schedule always keeps going
//! - Graceful stop and restart
//! - Event emission

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;

use crate::core::phase::Phase;
use crate::core::types::{CycleCount, Direction, RunId, MAX_CYCLES};
use crate::events::{Event, EventBus};

use super::types::CycleStatus;

/// Mutable state of the current run, shared between the scheduler and its
/// driver task.
struct RunState {
    /// Incremented on every start. A driver whose epoch no longer matches
    /// has been superseded and must not touch state or emit events.
    epoch: u64,
    run_id: RunId,
    cycle: u32,
    direction: Direction,
    stopped: bool,
    timer_pending: bool,
    /// Wakes a pending inter-phase sleep on stop or restart.
    interrupt: Arc<Notify>,
}

impl RunState {
    fn idle() -> Self {
        Self {
            epoch: 0,
            run_id: RunId::new(),
            cycle: 0,
            direction: Direction::Forward,
            stopped: false,
            timer_pending: false,
            interrupt: Arc::new(Notify::new()),
        }
    }
}

/// A cooperative scheduler that alternates two phases for a fixed number of
/// cycles.
///
/// One cycle is one forward phase followed by one backward phase. Between
/// phases the scheduler waits out a configurable delay. Phase failures are
/// contained: they are logged and reported on the event bus, and the
/// schedule continues as if the phase had succeeded.
///
/// The scheduler is cheap to clone; clones share the same run state, so a
/// clone can stop or inspect a run started elsewhere.
///
/// # Example
///
/// ```ignore
/// use pendulum::{phase_fn, CycleScheduler};
/// use std::time::Duration;
///
/// let scheduler = CycleScheduler::new(
///     phase_fn("expand", || async { Ok(()) }),
///     phase_fn("collapse", || async { Ok(()) }),
/// )
/// .with_cycles(4)
/// .with_delay(Duration::from_millis(250));
///
/// let run = scheduler.start().await;
/// run.await?;
/// assert!(scheduler.status().await.is_complete());
/// ```
#[derive(Clone)]
pub struct CycleScheduler {
    /// Phase run at the start of every cycle.
    forward: Arc<dyn Phase>,
    /// Phase run to finish every cycle.
    backward: Arc<dyn Phase>,
    /// The cycle count as requested by the caller.
    requested: CycleCount,
    /// The resolved cycle total, clamped to [`MAX_CYCLES`].
    total_cycles: u32,
    /// Delay between phases. Zero means "yield, then continue".
    delay: Duration,
    /// Event bus for emitting lifecycle events.
    event_bus: Arc<EventBus>,
    /// Shared run state.
    state: Arc<RwLock<RunState>>,
}

impl CycleScheduler {
    /// Create a scheduler for the given phase pair.
    ///
    /// Defaults to one cycle and no inter-phase delay.
    pub fn new(forward: Arc<dyn Phase>, backward: Arc<dyn Phase>) -> Self {
        let requested = CycleCount::Finite(1);
        Self {
            forward,
            backward,
            requested,
            total_cycles: requested.effective(),
            delay: Duration::ZERO,
            event_bus: Arc::new(EventBus::new()),
            state: Arc::new(RwLock::new(RunState::idle())),
        }
    }

    /// Set the number of cycles to run.
    ///
    /// Unbounded requests and finite requests above [`MAX_CYCLES`] resolve
    /// to the cap here; nothing else re-checks it later.
    pub fn with_cycles(mut self, cycles: impl Into<CycleCount>) -> Self {
        self.requested = cycles.into();
        self.total_cycles = self.requested.effective();
        self
    }

    /// Set the delay between phases. Zero is valid and keeps the schedule
    /// fully cooperative.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the event bus.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Arc::new(event_bus);
        self
    }

    /// Get the forward phase.
    pub fn forward(&self) -> &Arc<dyn Phase> {
        &self.forward
    }

    /// Get the backward phase.
    pub fn backward(&self) -> &Arc<dyn Phase> {
        &self.backward
    }

    /// Get the cycle count as requested (possibly unbounded).
    pub fn cycles(&self) -> CycleCount {
        self.requested
    }

    /// Get the resolved cycle total for a run.
    pub fn total_cycles(&self) -> u32 {
        self.total_cycles
    }

    /// Get the inter-phase delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Get the event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Start a run, restarting from scratch if one is already underway.
    ///
    /// The previous run is superseded: its pending sleep is woken and its
    /// driver winds down without emitting further events. A phase of the
    /// old run that is already in flight finishes its work, but nothing is
    /// scheduled after it.
    ///
    /// Returns the driver's join handle so callers can await natural
    /// completion.
    pub async fn start(&self) -> JoinHandle<()> {
        let (epoch, run_id, superseded) = {
            let mut state = self.state.write().await;
            let superseded = Arc::clone(&state.interrupt);
            state.epoch += 1;
            state.run_id = RunId::new();
            state.cycle = 0;
            state.direction = Direction::Forward;
            state.stopped = false;
            state.timer_pending = false;
            state.interrupt = Arc::new(Notify::new());
            (state.epoch, state.run_id.clone(), superseded)
        };

        // Wake the previous run's pending sleep so its driver exits promptly.
        // notify_one stores a permit if the driver has not reached its sleep
        // yet, so the wakeup cannot be lost.
        superseded.notify_one();

        tracing::info!(
            run_id = %run_id,
            cycles = %self.requested,
            total_cycles = self.total_cycles,
            delay_ms = self.delay.as_millis() as u64,
            "Starting cycle schedule"
        );
        self.event_bus
            .emit(Event::run_started(run_id, self.total_cycles))
            .await;

        let driver = self.clone();
        tokio::spawn(async move {
            driver.drive(epoch).await;
        })
    }

    /// Request a graceful stop.
    ///
    /// Takes effect immediately with respect to scheduling: the pending
    /// inter-phase timer is cancelled and no further phase starts. A phase
    /// already in flight runs to completion. Idempotent, and harmless to
    /// call before the first start.
    pub async fn stop(&self) {
        let (run_id, interrupt) = {
            let mut state = self.state.write().await;
            state.stopped = true;
            state.timer_pending = false;
            (state.run_id.clone(), Arc::clone(&state.interrupt))
        };

        // notify_one stores a permit if the driver has not parked on its
        // sleep yet, so a stop landing between phase completion and the
        // sleep registration still wakes it. A stale permit is harmless:
        // wait_delay checks stopped before waiting, and start() installs a
        // fresh Notify.
        interrupt.notify_one();
        tracing::info!(run_id = %run_id, "Stop requested");
    }

    /// Get a snapshot of the current run state.
    ///
    /// Pure read: safe to call at any time, from any clone, without
    /// affecting the schedule.
    pub async fn status(&self) -> CycleStatus {
        let state = self.state.read().await;
        CycleStatus {
            run_id: state.run_id.clone(),
            cycle: state.cycle,
            total_cycles: self.total_cycles,
            direction: state.direction,
            stopped: state.stopped,
            timer_pending: state.timer_pending,
        }
    }

    /// Main driver loop for one run.
    async fn drive(self, epoch: u64) {
        loop {
            let Some((run_id, cycle, direction)) = self.checkpoint(epoch).await else {
                return;
            };

            self.run_phase(&run_id, cycle, direction).await;
            self.wait_delay(epoch).await;
            self.advance(epoch).await;
        }
    }

    /// Decide whether the run continues.
    ///
    /// Checks, in order: superseded, stopped, all cycles done, safety cap.
    /// Returns the step context while the run is live, `None` once it is
    /// over (emitting the terminal event where one applies).
    ///
    /// Terminal events are emitted while the read lock is still held, so a
    /// concurrent start() cannot slot its RunStarted ahead of this run's
    /// terminal event.
    async fn checkpoint(&self, epoch: u64) -> Option<(RunId, u32, Direction)> {
        let state = self.state.read().await;
        if state.epoch != epoch {
            // Superseded by a later start; a new driver owns the state.
            return None;
        }
        let run_id = state.run_id.clone();
        let cycle = state.cycle;
        let direction = state.direction;

        if state.stopped {
            tracing::info!(run_id = %run_id, cycles_completed = cycle, "Cycle schedule stopped");
            self.event_bus
                .emit(Event::run_stopped(run_id, cycle))
                .await;
            return None;
        }

        if cycle >= self.total_cycles {
            tracing::info!(run_id = %run_id, cycles_completed = cycle, "Cycle schedule completed");
            self.event_bus
                .emit(Event::run_completed(run_id, cycle))
                .await;
            return None;
        }

        if cycle >= MAX_CYCLES {
            // total_cycles is clamped at construction, so this cannot fire
            // today; it re-checks the cap on the loop itself.
            tracing::warn!(run_id = %run_id, cycle, "Cycle safety cap reached, halting run");
            self.event_bus
                .emit(Event::run_stopped(run_id, cycle))
                .await;
            return None;
        }

        Some((run_id, cycle, direction))
    }

    /// Run the phase for the current direction and report the outcome.
    ///
    /// A phase error never escapes: it is logged, emitted as a
    /// `PhaseFailed` event, and the schedule moves on.
    async fn run_phase(&self, run_id: &RunId, cycle: u32, direction: Direction) {
        let phase = match direction {
            Direction::Forward => &self.forward,
            Direction::Backward => &self.backward,
        };

        tracing::debug!(
            run_id = %run_id,
            cycle,
            direction = %direction,
            phase = phase.name(),
            "Phase starting"
        );
        self.event_bus
            .emit(Event::phase_started(run_id.clone(), direction, cycle))
            .await;

        let start = Instant::now();
        match phase.run().await {
            Ok(()) => {
                let duration = start.elapsed();
                tracing::debug!(
                    run_id = %run_id,
                    cycle,
                    direction = %direction,
                    duration_ms = duration.as_millis() as u64,
                    "Phase completed"
                );
                self.event_bus
                    .emit(Event::phase_completed(
                        run_id.clone(),
                        direction,
                        cycle,
                        duration,
                    ))
                    .await;
            }
            Err(e) => {
                tracing::warn!(
                    run_id = %run_id,
                    cycle,
                    direction = %direction,
                    phase = phase.name(),
                    error = %e,
                    "Phase failed"
                );
                self.event_bus
                    .emit(Event::phase_failed(
                        run_id.clone(),
                        direction,
                        cycle,
                        e.to_string(),
                    ))
                    .await;
            }
        }
    }

    /// Wait out the inter-phase delay.
    ///
    /// The sleep is interruptible: a stop or restart wakes it immediately
    /// instead of letting the timer run out. Skipped entirely if the run
    /// was stopped or superseded while the phase was executing.
    async fn wait_delay(&self, epoch: u64) {
        let interrupt = {
            let mut state = self.state.write().await;
            if state.epoch != epoch || state.stopped {
                return;
            }
            state.timer_pending = true;
            Arc::clone(&state.interrupt)
        };

        let notified = interrupt.notified();
        tokio::pin!(notified);

        tokio::select! {
            _ = &mut notified => {}
            _ = tokio::time::sleep(self.delay) => {}
        }

        let mut state = self.state.write().await;
        if state.epoch == epoch {
            state.timer_pending = false;
        }
    }

    /// Advance to the next phase once the delay has fired.
    ///
    /// Forward hands over to backward; backward hands over to forward and
    /// completes the cycle. Skipped when the run was stopped or superseded
    /// while waiting, so a cancelled timer never advances state.
    async fn advance(&self, epoch: u64) {
        let mut state = self.state.write().await;
        if state.epoch != epoch || state.stopped {
            return;
        }
        match state.direction {
            Direction::Forward => {
                state.direction = Direction::Backward;
            }
            Direction::Backward => {
                state.direction = Direction::Forward;
                state.cycle += 1;
                let run_id = state.run_id.clone();
                let cycle = state.cycle;

                // Downgrade so status reads proceed, but keep the read side
                // so the event cannot land after a successor's RunStarted.
                let _state = state.downgrade();
                tracing::debug!(run_id = %run_id, cycle, "Cycle completed");
                self.event_bus
                    .emit(Event::cycle_completed(run_id, cycle))
                    .await;
            }
        }
    }
}
