//! Core library for `deploy-rsync`.
//!
//! The crate deploys a project directory to named environments by building
//! an `rsync` command line from configuration, running it, and streaming its
//! output. Targets are either local directories (`file://`) or hosts reached
//! over SSH (`ssh://`), and every run is a dry run unless asked otherwise.

pub mod command;
pub mod config;
pub mod deploy;
pub mod error;
pub mod process;
pub mod target;
pub mod test_support;

pub use command::{build_rsync_args, normalize_dir_path};
pub use config::{ConfigError, ConfigLoader, DeployConfig, Environment, RsyncDefaults};
pub use deploy::Deployer;
pub use error::DeployError;
pub use process::{CommandRunner, LineStream, ProcessLines, ProcessRunner};
pub use target::{InvalidTarget, ResolvedTarget, resolve};
