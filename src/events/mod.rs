//! Run and phase lifecycle events.
//!
//! The event bus is the side channel on which phase failures are surfaced:
//! the scheduler never propagates a phase error to its caller, it reports
//! the failure here and keeps going.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::core::types::{Direction, RunId};

/// Lifecycle events emitted during a scheduled run.
#[derive(Debug, Clone)]
pub enum Event {
    /// A run has started (the scheduler was started or restarted).
    RunStarted {
        run_id: RunId,
        total_cycles: u32,
        timestamp: Instant,
    },

    /// A phase has started execution.
    PhaseStarted {
        run_id: RunId,
        direction: Direction,
        /// The zero-based cycle the phase belongs to.
        cycle: u32,
        timestamp: Instant,
    },

    /// A phase completed successfully.
    PhaseCompleted {
        run_id: RunId,
        direction: Direction,
        cycle: u32,
        duration: Duration,
        timestamp: Instant,
    },

    /// A phase failed.
    ///
    /// Failure is contained: the schedule waits out the normal delay and
    /// moves on to the next phase as if the failed one had succeeded.
    PhaseFailed {
        run_id: RunId,
        direction: Direction,
        cycle: u32,
        error: String,
        timestamp: Instant,
    },

    /// A full forward/backward cycle finished.
    CycleCompleted {
        run_id: RunId,
        /// The number of cycles completed so far, counting this one.
        cycle: u32,
        timestamp: Instant,
    },

    /// The run was halted by a stop request.
    RunStopped {
        run_id: RunId,
        cycles_completed: u32,
        timestamp: Instant,
    },

    /// The run finished all of its cycles.
    RunCompleted {
        run_id: RunId,
        cycles_completed: u32,
        timestamp: Instant,
    },
}

impl Event {
    /// When the event was created.
    pub fn timestamp(&self) -> Instant {
        match self {
            Event::RunStarted { timestamp, .. } => *timestamp,
            Event::PhaseStarted { timestamp, .. } => *timestamp,
            Event::PhaseCompleted { timestamp, .. } => *timestamp,
            Event::PhaseFailed { timestamp, .. } => *timestamp,
            Event::CycleCompleted { timestamp, .. } => *timestamp,
            Event::RunStopped { timestamp, .. } => *timestamp,
            Event::RunCompleted { timestamp, .. } => *timestamp,
        }
    }

    /// Get the run this event belongs to.
    pub fn run_id(&self) -> &RunId {
        match self {
            Event::RunStarted { run_id, .. } => run_id,
            Event::PhaseStarted { run_id, .. } => run_id,
            Event::PhaseCompleted { run_id, .. } => run_id,
            Event::PhaseFailed { run_id, .. } => run_id,
            Event::CycleCompleted { run_id, .. } => run_id,
            Event::RunStopped { run_id, .. } => run_id,
            Event::RunCompleted { run_id, .. } => run_id,
        }
    }

    /// Create a RunStarted event.
    pub fn run_started(run_id: RunId, total_cycles: u32) -> Self {
        Event::RunStarted {
            run_id,
            total_cycles,
            timestamp: Instant::now(),
        }
    }

    /// Create a PhaseStarted event.
    pub fn phase_started(run_id: RunId, direction: Direction, cycle: u32) -> Self {
        Event::PhaseStarted {
            run_id,
            direction,
            cycle,
            timestamp: Instant::now(),
        }
    }

    /// Create a PhaseCompleted event.
    pub fn phase_completed(
        run_id: RunId,
        direction: Direction,
        cycle: u32,
        duration: Duration,
    ) -> Self {
        Event::PhaseCompleted {
            run_id,
            direction,
            cycle,
            duration,
            timestamp: Instant::now(),
        }
    }

    /// Create a PhaseFailed event.
    pub fn phase_failed(run_id: RunId, direction: Direction, cycle: u32, error: String) -> Self {
        Event::PhaseFailed {
            run_id,
            direction,
            cycle,
            error,
            timestamp: Instant::now(),
        }
    }

    /// Create a CycleCompleted event.
    pub fn cycle_completed(run_id: RunId, cycle: u32) -> Self {
        Event::CycleCompleted {
            run_id,
            cycle,
            timestamp: Instant::now(),
        }
    }

    /// Create a RunStopped event.
    pub fn run_stopped(run_id: RunId, cycles_completed: u32) -> Self {
        Event::RunStopped {
            run_id,
            cycles_completed,
            timestamp: Instant::now(),
        }
    }

    /// Create a RunCompleted event.
    pub fn run_completed(run_id: RunId, cycles_completed: u32) -> Self {
        Event::RunCompleted {
            run_id,
            cycles_completed,
            timestamp: Instant::now(),
        }
    }
}

/// Receives lifecycle events from an [`EventBus`].
///
/// Handlers run inline on the scheduler's driver task, in some cases while
/// the scheduler's state lock is held. A handler must not call back into
/// the scheduler that emitted the event; record what it needs and return.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Fans events out to registered handlers, in registration order.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Add a handler. Handlers see every event emitted after registration.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Deliver an event to every registered handler.
    pub async fn emit(&self, event: Event) {
        for handler in self.handlers.read().await.iter() {
            handler.handle(&event).await;
        }
    }

    /// Number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingHandler;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Test handler that only tallies deliveries.
    #[derive(Default)]
    struct TallyHandler {
        seen: AtomicU32,
    }

    impl TallyHandler {
        fn seen(&self) -> u32 {
            self.seen.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventHandler for TallyHandler {
        async fn handle(&self, _event: &Event) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_emit_run_started_event() {
        let handler = Arc::new(RecordingHandler::new());
        let bus = EventBus::new();
        bus.register(handler.clone()).await;

        let id = RunId::new();
        let expected_uuid = *id.as_uuid();
        bus.emit(Event::run_started(id, 4)).await;

        let events = handler.events().await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::RunStarted {
                run_id,
                total_cycles,
                ..
            } => {
                assert_eq!(*run_id.as_uuid(), expected_uuid);
                assert_eq!(*total_cycles, 4);
            }
            _ => panic!("Expected RunStarted event"),
        }
    }

    #[tokio::test]
    async fn test_emit_phase_completed_event_with_duration() {
        let handler = Arc::new(RecordingHandler::new());
        let bus = EventBus::new();
        bus.register(handler.clone()).await;

        let took = Duration::from_millis(80);
        bus.emit(Event::phase_completed(
            RunId::new(),
            Direction::Forward,
            0,
            took,
        ))
        .await;

        let events = handler.events().await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::PhaseCompleted {
                direction,
                cycle,
                duration,
                ..
            } => {
                assert_eq!(*direction, Direction::Forward);
                assert_eq!(*cycle, 0);
                assert_eq!(*duration, took);
            }
            _ => panic!("Expected PhaseCompleted event"),
        }
    }

    #[tokio::test]
    async fn test_emit_phase_failed_event_with_error() {
        let handler = Arc::new(RecordingHandler::new());
        let bus = EventBus::new();
        bus.register(handler.clone()).await;

        bus.emit(Event::phase_failed(
            RunId::new(),
            Direction::Backward,
            2,
            "archive unreachable".to_string(),
        ))
        .await;

        let events = handler.events().await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::PhaseFailed {
                direction,
                cycle,
                error,
                ..
            } => {
                assert_eq!(*direction, Direction::Backward);
                assert_eq!(*cycle, 2);
                assert_eq!(error, "archive unreachable");
            }
            _ => panic!("Expected PhaseFailed event"),
        }
    }

    #[tokio::test]
    async fn test_emit_cycle_completed_event() {
        let handler = Arc::new(RecordingHandler::new());
        let bus = EventBus::new();
        bus.register(handler.clone()).await;

        bus.emit(Event::cycle_completed(RunId::new(), 3)).await;

        let events = handler.events().await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::CycleCompleted { cycle, .. } => {
                assert_eq!(*cycle, 3);
            }
            _ => panic!("Expected CycleCompleted event"),
        }
    }

    #[tokio::test]
    async fn test_emit_run_stopped_and_completed_events() {
        let handler = Arc::new(RecordingHandler::new());
        let bus = EventBus::new();
        bus.register(handler.clone()).await;

        bus.emit(Event::run_stopped(RunId::new(), 1)).await;
        bus.emit(Event::run_completed(RunId::new(), 5)).await;

        let events = handler.events().await;
        assert_eq!(events.len(), 2);
        match &events[0] {
            Event::RunStopped {
                cycles_completed, ..
            } => assert_eq!(*cycles_completed, 1),
            _ => panic!("Expected RunStopped event"),
        }
        match &events[1] {
            Event::RunCompleted {
                cycles_completed, ..
            } => assert_eq!(*cycles_completed, 5),
            _ => panic!("Expected RunCompleted event"),
        }
    }

    #[tokio::test]
    async fn test_handler_count_tracks_registrations() {
        let bus = EventBus::new();
        assert_eq!(bus.handler_count().await, 0);

        bus.register(Arc::new(TallyHandler::default())).await;
        bus.register(Arc::new(TallyHandler::default())).await;
        assert_eq!(bus.handler_count().await, 2);
    }

    #[tokio::test]
    async fn test_every_handler_sees_every_event() {
        let first = Arc::new(TallyHandler::default());
        let second = Arc::new(TallyHandler::default());

        let bus = EventBus::new();
        bus.register(first.clone()).await;
        bus.register(second.clone()).await;

        bus.emit(Event::run_started(RunId::new(), 1)).await;
        bus.emit(Event::cycle_completed(RunId::new(), 1)).await;

        assert_eq!(first.seen(), 2);
        assert_eq!(second.seen(), 2);
    }

    #[tokio::test]
    async fn test_event_accessors() {
        let id = RunId::new();
        let before = Instant::now();
        let event = Event::phase_started(id.clone(), Direction::Forward, 0);
        let after = Instant::now();

        assert_eq!(event.run_id(), &id);
        assert!(event.timestamp() >= before);
        assert!(event.timestamp() <= after);
    }

    #[tokio::test]
    async fn test_multiple_events_in_sequence() {
        let handler = Arc::new(RecordingHandler::new());
        let bus = EventBus::new();
        bus.register(handler.clone()).await;

        let id = RunId::new();
        bus.emit(Event::run_started(id.clone(), 1)).await;
        bus.emit(Event::phase_started(id.clone(), Direction::Forward, 0))
            .await;
        bus.emit(Event::phase_completed(
            id.clone(),
            Direction::Forward,
            0,
            Duration::from_millis(40),
        ))
        .await;
        bus.emit(Event::phase_started(id.clone(), Direction::Backward, 0))
            .await;
        bus.emit(Event::phase_failed(
            id.clone(),
            Direction::Backward,
            0,
            "tape jam".to_string(),
        ))
        .await;

        let events = handler.events().await;
        assert_eq!(events.len(), 5);

        assert!(matches!(events[0], Event::RunStarted { .. }));
        assert!(matches!(events[1], Event::PhaseStarted { .. }));
        assert!(matches!(events[2], Event::PhaseCompleted { .. }));
        assert!(matches!(events[3], Event::PhaseStarted { .. }));
        assert!(matches!(events[4], Event::PhaseFailed { .. }));
    }

    #[tokio::test]
    async fn test_emit_with_no_handlers_is_a_no_op() {
        let bus = EventBus::new();
        bus.emit(Event::run_started(RunId::new(), 1)).await;
    }
}
