//! Phase trait and error types.
//!
//! The `Phase` trait is the unit of work the scheduler alternates between.
//! Implement it directly, or wrap an async closure with [`phase_fn`].

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while a phase is running.
#[derive(Debug, Error)]
pub enum PhaseError {
    /// Phase execution failed with a message.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Phase timed out.
    #[error("phase timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// External command failed with exit code.
    #[error("command exited with code {code}")]
    CommandFailed {
        /// Exit code of the process (-1 if terminated by signal).
        code: i32,
        /// Captured stderr output.
        stderr: String,
    },

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// The core trait for defining a schedulable phase.
///
/// The scheduler never lets a `PhaseError` escape: a failed phase is logged,
/// reported on the event bus, and the schedule moves on.
///
/// # Example
///
/// ```ignore
/// use pendulum::{Phase, PhaseError};
/// use async_trait::async_trait;
///
/// struct Expand;
///
/// #[async_trait]
/// impl Phase for Expand {
///     fn name(&self) -> &str {
///         "expand"
///     }
///
///     async fn run(&self) -> Result<(), PhaseError> {
///         // Do the forward half of the cycle
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Phase: Send + Sync {
    /// Returns the name of this phase, used in logs and events.
    fn name(&self) -> &str;

    /// Run the phase to completion.
    ///
    /// # Returns
    /// * `Ok(())` - Phase completed successfully
    /// * `Err(PhaseError)` - Phase failed; the schedule continues regardless
    async fn run(&self) -> Result<(), PhaseError>;

    /// Optional description for display/logging purposes.
    fn description(&self) -> Option<&str> {
        None
    }
}

/// Adapt an async closure into a [`Phase`].
///
/// # Example
///
/// ```ignore
/// use pendulum::phase_fn;
///
/// let tick = phase_fn("tick", || async {
///     println!("tick");
///     Ok(())
/// });
/// ```
pub fn phase_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn Phase>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), PhaseError>> + Send + 'static,
{
    Arc::new(FnPhase {
        name: name.into(),
        f,
    })
}

/// A phase backed by a closure. Built via [`phase_fn`].
struct FnPhase<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> Phase for FnPhase<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), PhaseError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), PhaseError> {
        (self.f)().await
    }
}
