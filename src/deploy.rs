//! Deployment orchestration: environment lookup, command assembly, and
//! forwarding of rsync output.

use std::io::Write;

use camino::Utf8PathBuf;

use crate::command::{build_rsync_args, render_command_line};
use crate::config::{DeployConfig, Environment};
use crate::error::DeployError;
use crate::process::{CommandRunner, LineStream, ProcessRunner};

/// Deploys the project directory to configured environments.
#[derive(Clone, Debug)]
pub struct Deployer<R: CommandRunner> {
    config: DeployConfig,
    project_dir: Utf8PathBuf,
    runner: R,
}

impl Deployer<ProcessRunner> {
    /// Convenience constructor that wires the real process runner.
    #[must_use]
    pub const fn with_process_runner(config: DeployConfig, project_dir: Utf8PathBuf) -> Self {
        Self::new(config, project_dir, ProcessRunner)
    }
}

impl<R: CommandRunner> Deployer<R> {
    /// Creates a deployer over validated configuration.
    #[must_use]
    pub const fn new(config: DeployConfig, project_dir: Utf8PathBuf, runner: R) -> Self {
        Self {
            config,
            project_dir,
            runner,
        }
    }

    /// Looks up an environment by name.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::EnvironmentNotFound`] when `name` is not
    /// configured.
    pub fn environment(&self, name: &str) -> Result<&Environment, DeployError> {
        self.config
            .environment(name)
            .ok_or_else(|| DeployError::EnvironmentNotFound {
                name: name.to_owned(),
            })
    }

    /// Returns `true` when neither the environment nor the defaults name an
    /// ignore file, in which case the caller must confirm before deploying.
    #[must_use]
    pub fn requires_confirmation(&self, environment: &Environment) -> bool {
        environment
            .effective_ignore_file(&self.config.rsync)
            .is_none()
    }

    /// Builds the rsync argv for `environment`.
    ///
    /// # Errors
    ///
    /// Returns any error from [`build_rsync_args`].
    pub fn build_command(
        &self,
        environment: &Environment,
        dry_run: bool,
    ) -> Result<Vec<String>, DeployError> {
        build_rsync_args(&self.config.rsync, environment, &self.project_dir, dry_run)
    }

    /// Runs rsync for `environment`, writing each output line to `out`.
    ///
    /// Every line the process produces is forwarded before its exit status
    /// is checked, so a failing run still shows its full output.
    ///
    /// # Errors
    ///
    /// Returns errors from [`Deployer::build_command`] before anything is
    /// spawned, [`DeployError::Spawn`] when rsync cannot start,
    /// [`DeployError::Forward`] when `out` rejects a line, and
    /// [`DeployError::ProcessExecution`] when rsync exits unsuccessfully.
    pub async fn deploy<W: Write>(
        &self,
        environment: &Environment,
        dry_run: bool,
        out: &mut W,
    ) -> Result<(), DeployError> {
        let argv = self.build_command(environment, dry_run)?;
        tracing::debug!(command = %render_command_line(&argv), "running rsync");
        tracing::info!(environment = %environment.name, dry_run, "deploying");

        let mut lines = self.runner.start(&argv)?;
        while let Some(line) = lines.next_line().await? {
            writeln!(out, "{line}").map_err(|err| DeployError::Forward {
                message: err.to_string(),
            })?;
        }
        out.flush().map_err(|err| DeployError::Forward {
            message: err.to_string(),
        })?;

        lines.finish().await
    }

    /// Looks up `name` and deploys it; see [`Deployer::deploy`].
    ///
    /// Does not ask for confirmation, so callers that need the ignore-file
    /// prompt should use [`Deployer::environment`] and
    /// [`Deployer::requires_confirmation`] first.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::EnvironmentNotFound`] for an unknown name and
    /// any error from [`Deployer::deploy`].
    pub async fn deploy_named<W: Write>(
        &self,
        name: &str,
        dry_run: bool,
        out: &mut W,
    ) -> Result<(), DeployError> {
        let environment = self.environment(name)?;
        self.deploy(environment, dry_run, out).await
    }
}
