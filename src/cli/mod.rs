//! Command-line interface definitions for the `deploy-rsync` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{ArgAction, Parser};

/// Top-level CLI for the `deploy-rsync` binary.
#[derive(Debug, Parser)]
#[command(
    name = "deploy-rsync",
    about = "Deploy the project directory with rsync and SSH",
    version,
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Environment name, as configured under `[environments]`.
    #[arg(value_name = "ENVIRONMENT")]
    pub(crate) environment: String,
    /// Do the deployment. Without this flag rsync runs with `--dry-run`.
    #[arg(long)]
    pub(crate) go: bool,
    /// Configuration file to use instead of the discovered one.
    #[arg(long, value_name = "PATH")]
    pub(crate) config: Option<String>,
    /// Directory to deploy; defaults to the current working directory.
    #[arg(long, env = "DEPLOY_RSYNC_PROJECT_DIR", value_name = "DIR")]
    pub(crate) project_dir: Option<String>,
    /// Increase log verbosity (`-v` info, `-vv` debug, `-vvv` trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub(crate) verbose: u8,
}
