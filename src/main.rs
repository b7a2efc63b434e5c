//! Binary entry point for the `deploy-rsync` CLI.

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use deploy_rsync::{ConfigError, ConfigLoader, DeployConfig, DeployError, Deployer};

mod cli;

use cli::Cli;

const CONFIRM_PROMPT: &str = "Continue without ignore file? [y/N]";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Deploy(#[from] DeployError),
    #[error("invalid project directory: {0}")]
    ProjectDir(String),
    #[error("failed to read confirmation: {0}")]
    Prompt(String),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;
    let project_dir = resolve_project_dir(cli.project_dir.as_deref())?;
    let deployer = Deployer::with_process_runner(config, project_dir);
    let environment = deployer.environment(&cli.environment)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if deployer.requires_confirmation(environment) && !confirm(&mut io::stdin().lock(), &mut out)? {
        tracing::info!(environment = %environment.name, "deployment cancelled");
        return Ok(());
    }

    deployer.deploy(environment, !cli.go, &mut out).await?;
    Ok(())
}

fn load_config(explicit: Option<&str>) -> Result<DeployConfig, ConfigError> {
    match explicit {
        Some(path) => DeployConfig::load_from_path(&Utf8PathBuf::from(path)),
        None => ConfigLoader::new().load(),
    }
}

fn resolve_project_dir(explicit: Option<&str>) -> Result<Utf8PathBuf, CliError> {
    if let Some(dir) = explicit {
        return Ok(Utf8PathBuf::from(dir));
    }

    let cwd = env::current_dir().map_err(|err| CliError::ProjectDir(err.to_string()))?;
    Utf8PathBuf::from_path_buf(cwd).map_err(|path| CliError::ProjectDir(path.display().to_string()))
}

/// Asks whether to continue without an ignore file; anything but an answer
/// starting with `y` declines.
fn confirm(input: &mut impl BufRead, output: &mut impl Write) -> Result<bool, CliError> {
    write!(output, "{CONFIRM_PROMPT}").map_err(prompt_error)?;
    output.flush().map_err(prompt_error)?;

    let mut answer = String::new();
    input.read_line(&mut answer).map_err(prompt_error)?;
    Ok(answer.trim_start().starts_with(['y', 'Y']))
}

fn prompt_error(err: io::Error) -> CliError {
    CliError::Prompt(err.to_string())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
