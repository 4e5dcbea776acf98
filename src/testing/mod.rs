//! Testing utilities for users of the Pendulum library.
//!
//! This module provides helpers for testing cycle schedules:
//!
//! - [`CountingPhase`]: A phase that succeeds and counts its invocations
//! - [`FailingPhase`]: A phase helper that fails N times (or always)
//! - [`PhaseRecorder`]: Records the exact order in which phases ran
//! - [`RecordingHandler`]: An event handler that captures emitted events

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::phase::{Phase, PhaseError};
use crate::events::{Event, EventHandler};

/// A phase that always succeeds and counts how often it ran.
///
/// # Example
///
/// ```ignore
/// use pendulum::testing::CountingPhase;
///
/// let phase = CountingPhase::new("tick");
/// // ... run a schedule with it ...
/// assert_eq!(phase.count(), 3);
/// ```
pub struct CountingPhase {
    name: String,
    count: AtomicU32,
}

impl CountingPhase {
    /// Create a new counting phase.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            count: AtomicU32::new(0),
        })
    }

    /// Get the number of times this phase has run.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Phase for CountingPhase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), PhaseError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A phase that fails a configurable number of times before succeeding.
///
/// Useful for testing failure isolation: the scheduler must keep cycling
/// no matter how often a phase fails.
///
/// # Example
///
/// ```ignore
/// use pendulum::testing::FailingPhase;
///
/// // Fails 2 times, then succeeds from the 3rd run on
/// let flaky = FailingPhase::new("flaky", 2);
///
/// // Never succeeds
/// let broken = FailingPhase::always("broken");
/// ```
pub struct FailingPhase {
    name: String,
    /// Mutex protecting failure state so counting stays deterministic.
    state: Mutex<FailingPhaseState>,
    total_failures: u32,
    always: bool,
    error_message: String,
}

/// Internal state for FailingPhase, protected by a mutex.
struct FailingPhaseState {
    failures_remaining: u32,
    call_count: u32,
}

impl FailingPhase {
    /// Create a phase that fails `fail_count` times then succeeds.
    pub fn new(name: impl Into<String>, fail_count: u32) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(FailingPhaseState {
                failures_remaining: fail_count,
                call_count: 0,
            }),
            total_failures: fail_count,
            always: false,
            error_message: "intentional test failure".to_string(),
        })
    }

    /// Create a phase that fails on every run.
    pub fn always(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(FailingPhaseState {
                failures_remaining: 0,
                call_count: 0,
            }),
            total_failures: 0,
            always: true,
            error_message: "intentional test failure".to_string(),
        })
    }

    /// Create a phase that fails `fail_count` times with a custom message.
    pub fn with_error(
        name: impl Into<String>,
        fail_count: u32,
        message: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(FailingPhaseState {
                failures_remaining: fail_count,
                call_count: 0,
            }),
            total_failures: fail_count,
            always: false,
            error_message: message.into(),
        })
    }

    /// Get the number of failures remaining before success.
    ///
    /// Note: This is an async method because it acquires a lock.
    pub async fn failures_remaining(&self) -> u32 {
        self.state.lock().await.failures_remaining
    }

    /// Get the number of times this phase has been called.
    ///
    /// Note: This is an async method because it acquires a lock.
    pub async fn call_count(&self) -> u32 {
        self.state.lock().await.call_count
    }

    /// Reset the failure counter for reuse.
    ///
    /// Note: This is an async method because it acquires a lock.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.failures_remaining = self.total_failures;
        state.call_count = 0;
    }
}

#[async_trait]
impl Phase for FailingPhase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), PhaseError> {
        // Lock the state so check-and-decrement stays atomic
        let mut state = self.state.lock().await;

        state.call_count += 1;

        if self.always {
            return Err(PhaseError::ExecutionFailed(self.error_message.clone()));
        }

        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            Err(PhaseError::ExecutionFailed(self.error_message.clone()))
        } else {
            Ok(())
        }
    }
}

/// Records the order in which phases ran.
///
/// Hand out named phases with [`PhaseRecorder::phase`] and assert on the
/// sequence afterwards. This is the easiest way to verify strict
/// forward/backward alternation.
///
/// # Example
///
/// ```ignore
/// use pendulum::testing::PhaseRecorder;
///
/// let recorder = PhaseRecorder::new();
/// let forward = recorder.phase("forward");
/// let backward = recorder.phase("backward");
/// // ... run a 2-cycle schedule ...
/// assert_eq!(
///     recorder.names().await,
///     vec!["forward", "backward", "forward", "backward"]
/// );
/// ```
#[derive(Clone, Default)]
pub struct PhaseRecorder {
    log: Arc<Mutex<Vec<String>>>,
}

impl PhaseRecorder {
    /// Create a new empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a phase that appends `name` to the record each time it runs.
    pub fn phase(&self, name: impl Into<String>) -> Arc<dyn Phase> {
        Arc::new(RecordedPhase {
            name: name.into(),
            log: self.log.clone(),
        })
    }

    /// Get the names of all phase runs so far, in execution order.
    pub async fn names(&self) -> Vec<String> {
        self.log.lock().await.clone()
    }
}

/// A phase handed out by [`PhaseRecorder`].
struct RecordedPhase {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Phase for RecordedPhase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), PhaseError> {
        self.log.lock().await.push(self.name.clone());
        Ok(())
    }
}

/// An event handler that records received events.
pub struct RecordingHandler {
    events: Mutex<Vec<Event>>,
}

impl RecordingHandler {
    /// Create a new recording handler.
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Get all events received so far, in emission order.
    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }
}

impl Default for RecordingHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &Event) {
        self.events.lock().await.push(event.clone());
    }
}
