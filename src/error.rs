//! Errors surfaced while deploying an environment.

use thiserror::Error;

use crate::target::InvalidTarget;

/// Errors surfaced while building or running an rsync deployment.
///
/// Every variant is terminal for the current invocation. Only
/// [`DeployError::ProcessExecution`] and [`DeployError::Output`] can occur
/// after some output has already been forwarded to the caller.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DeployError {
    /// Raised when the requested environment is absent from configuration.
    #[error("Environment not found: {name}")]
    EnvironmentNotFound {
        /// Environment name that was requested.
        name: String,
    },
    /// Raised when an environment's target descriptor cannot be parsed.
    #[error(transparent)]
    InvalidTarget(#[from] InvalidTarget),
    /// Raised when the effective ignore file does not exist on disk.
    #[error("Ignore file \"{path}\" not found")]
    IgnoreFileNotFound {
        /// Ignore file path as configured.
        path: String,
    },
    /// Raised when asked to run an empty command line.
    #[error("cannot run an empty command line")]
    EmptyCommand,
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when reading the command's output pipes fails.
    #[error("failed to read output of {program}: {message}")]
    Output {
        /// Command whose output could not be read.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a produced line cannot be forwarded to the caller's writer.
    #[error("failed to forward rsync output: {message}")]
    Forward {
        /// Operating system error string.
        message: String,
    },
    /// Raised when the command completes with a non-success exit status.
    #[error("Error during Rsync execution ({program} exited with status {status_text})")]
    ProcessExecution {
        /// Command name used for the attempted operation.
        program: String,
        /// Exit status as reported by the OS; `None` when killed by a signal.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
    },
}

impl DeployError {
    /// Builds a [`DeployError::ProcessExecution`] from a raw exit code.
    #[must_use]
    pub fn process_execution(program: &str, status: Option<i32>) -> Self {
        let status_text = status.map_or_else(|| String::from("unknown"), |code| code.to_string());
        Self::ProcessExecution {
            program: program.to_owned(),
            status,
            status_text,
        }
    }
}
