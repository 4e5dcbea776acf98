//! Subprocess-backed phases.
//!
//! [`CommandPhase`] lets an external command drive one side of a cycle:
//! a non-zero exit maps to [`PhaseError::CommandFailed`] with the code and
//! captured stderr, a command that cannot be spawned maps to
//! [`PhaseError::ExecutionFailed`], and an optional deadline maps to
//! [`PhaseError::Timeout`]. None of these abort a running schedule; the
//! scheduler reports the error and moves on to the next phase.
//!
//! ```rust
//! use pendulum::CommandPhase;
//! use std::time::Duration;
//!
//! let push = CommandPhase::builder("rsync")
//!     .args(["-a", "src/", "dst/"])
//!     .timeout(Duration::from_secs(300))
//!     .build();
//! ```
//!
//! On timeout the subprocess is killed when its output future is dropped,
//! with no grace period. A command that needs orderly shutdown has to
//! handle signals itself.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::phase::{Phase, PhaseError};

/// A phase that executes an external command.
///
/// # Example
///
/// ```ignore
/// let phase = CommandPhase::builder("rsync")
///     .arg("-a")
///     .arg("src/")
///     .arg("dst/")
///     .env("RSYNC_RSH", "ssh")
///     .working_dir("/data")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct CommandPhase {
    /// Phase name (used for identification)
    name: String,
    /// Program to execute
    program: String,
    /// Command arguments
    args: Vec<String>,
    /// Environment variables
    env: HashMap<String, String>,
    /// Working directory
    working_dir: Option<PathBuf>,
    /// Execution timeout
    timeout: Option<Duration>,
    /// Rendered command line, reported as the phase description
    command_line: String,
}

impl CommandPhase {
    /// Create a new builder for a command phase.
    pub fn builder(program: impl Into<String>) -> CommandPhaseBuilder {
        CommandPhaseBuilder::new(program)
    }

    /// The program this phase executes.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The arguments passed to the program.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The working directory, if one was configured.
    pub fn working_dir(&self) -> Option<&PathBuf> {
        self.working_dir.as_ref()
    }

    /// The execution deadline, if one was configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Assemble the tokio command with output capture.
    ///
    /// kill_on_drop is what terminates a timed-out child: the timeout drops
    /// the output future, and the runtime kills and reaps the process.
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl Phase for CommandPhase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<(), PhaseError> {
        let mut cmd = self.command();

        let output = match self.timeout {
            Some(deadline) => timeout(deadline, cmd.output())
                .await
                .map_err(|_| PhaseError::Timeout(deadline))?
                .map_err(|e| PhaseError::ExecutionFailed(e.to_string()))?,
            None => cmd
                .output()
                .await
                .map_err(|e| PhaseError::ExecutionFailed(e.to_string()))?,
        };

        // Surface captured output in the logs; stderr additionally travels
        // with the error on failure
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(phase = %self.name, stdout = %stdout.trim_end(), "Command output");
        }
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !stderr.trim().is_empty() {
            tracing::debug!(phase = %self.name, stderr = %stderr.trim_end(), "Command stderr");
        }

        if output.status.success() {
            Ok(())
        } else {
            // -1 stands in for termination by signal
            let code = output.status.code().unwrap_or(-1);
            Err(PhaseError::CommandFailed { code, stderr })
        }
    }

    fn description(&self) -> Option<&str> {
        Some(&self.command_line)
    }
}

/// Builder for creating `CommandPhase` instances.
#[derive(Debug, Clone)]
pub struct CommandPhaseBuilder {
    name: Option<String>,
    program: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl CommandPhaseBuilder {
    /// Create a new builder with the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            name: None,
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
            timeout: None,
        }
    }

    /// Name the phase. Defaults to the program.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set one environment variable for the command.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set several environment variables for the command.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Run the command from this directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Fail the phase if the command outlives this deadline.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Build the `CommandPhase`.
    ///
    /// The name defaults to the program when not set explicitly.
    pub fn build(self) -> CommandPhase {
        let name = self.name.unwrap_or_else(|| self.program.clone());
        let command_line = std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        CommandPhase {
            name,
            program: self.program,
            args: self.args,
            env: self.env,
            working_dir: self.working_dir,
            timeout: self.timeout,
            command_line,
        }
    }
}
