//! Deployment configuration loading and validation.
//!
//! Configuration lives in a TOML file with an `[rsync]` table of defaults and
//! one `[environments.<name>]` table per deployment destination. The file is
//! located with `ortho-config`'s discovery order unless an explicit path is
//! given, and is validated once at load time so later stages can trust it.

use std::collections::BTreeMap;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use ortho_config::ConfigDiscovery;
use ortho_config::toml;
use serde::Deserialize;
use thiserror::Error;

use crate::target;

const APP_NAME: &str = "deploy-rsync";
const CONFIG_ENV_VAR: &str = "DEPLOY_RSYNC_CONFIG_PATH";
const CONFIG_FILE_NAME: &str = "deploy-rsync.toml";
const DOTFILE_NAME: &str = ".deploy-rsync.toml";
const PROJECT_FILE_NAME: &str = "deploy-rsync.toml";

/// Default path to the `rsync` executable.
pub const DEFAULT_RSYNC_PATH: &str = "rsync";

/// Options passed to rsync when an environment does not override them.
pub const DEFAULT_RSYNC_OPTIONS: [&str; 4] = ["-azC", "--force", "--delete", "--progress"];

/// Process-wide rsync settings from the `[rsync]` table.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RsyncDefaults {
    /// Path to the `rsync` executable.
    pub rsync_path: String,
    /// Options used by environments that do not set their own.
    pub rsync_options: Vec<String>,
    /// Ignore file used by environments that do not set their own.
    pub ignore_file: Option<String>,
}

impl Default for RsyncDefaults {
    fn default() -> Self {
        Self {
            rsync_path: DEFAULT_RSYNC_PATH.to_owned(),
            rsync_options: DEFAULT_RSYNC_OPTIONS.map(str::to_owned).to_vec(),
            ignore_file: None,
        }
    }
}

/// A named deployment destination.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Environment {
    /// Key of the environment in the `[environments]` table.
    #[serde(skip)]
    pub name: String,
    /// Raw target descriptor, see [`crate::target::resolve`].
    pub target: String,
    /// Options replacing the defaults when non-empty.
    #[serde(default)]
    pub rsync_options: Vec<String>,
    /// Ignore file replacing the default one when set.
    #[serde(default)]
    pub ignore_file: Option<String>,
}

impl Environment {
    /// Returns the environment's options, or the defaults when it has none.
    ///
    /// The two lists are never merged.
    #[must_use]
    pub fn effective_options<'a>(&'a self, defaults: &'a RsyncDefaults) -> &'a [String] {
        if self.rsync_options.is_empty() {
            &defaults.rsync_options
        } else {
            &self.rsync_options
        }
    }

    /// Returns the environment's ignore file, falling back to the default.
    #[must_use]
    pub fn effective_ignore_file<'a>(&'a self, defaults: &'a RsyncDefaults) -> Option<&'a str> {
        self.ignore_file
            .as_deref()
            .or(defaults.ignore_file.as_deref())
    }
}

/// Complete, validated deployment configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// Global rsync defaults.
    #[serde(default)]
    pub rsync: RsyncDefaults,
    /// Environments keyed by name.
    #[serde(default)]
    pub environments: BTreeMap<String, Environment>,
}

/// Errors raised while locating, reading, or validating configuration.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Raised when no configuration file exists at any discovered location.
    #[error("no configuration file found; create {CONFIG_FILE_NAME} or set {CONFIG_ENV_VAR}")]
    NotFound,
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the TOML content cannot be parsed into the schema.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path that could not be parsed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when an environment fails validation.
    #[error("invalid environment {environment}: {message}")]
    Invalid {
        /// Environment that failed validation.
        environment: String,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when a required `[rsync]` value is blank.
    #[error("invalid rsync configuration: {field} must not be empty")]
    InvalidField {
        /// Configuration field that failed validation.
        field: String,
    },
}

impl DeployConfig {
    /// Parses and validates configuration from TOML text.
    ///
    /// `path` is only used to label errors.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys, and
    /// [`ConfigError::Invalid`] or [`ConfigError::InvalidField`] when
    /// validation fails.
    pub fn from_toml_str(path: &Utf8Path, contents: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(contents).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        for (name, environment) in &mut config.environments {
            environment.name.clone_from(name);
        }
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise
    /// any error from [`DeployConfig::from_toml_str`].
    pub fn load_from_path(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = read_config(path)?;
        Self::from_toml_str(path, &contents)
    }

    /// Checks that every environment target resolves and that required
    /// defaults are present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] for a blank `rsync_path` and
    /// [`ConfigError::Invalid`] for an environment with a bad target or a
    /// blank ignore file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rsync.rsync_path.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: String::from("rsync_path"),
            });
        }
        if self
            .rsync
            .ignore_file
            .as_deref()
            .is_some_and(|path| path.trim().is_empty())
        {
            return Err(ConfigError::InvalidField {
                field: String::from("ignore_file"),
            });
        }

        for (name, environment) in &self.environments {
            target::resolve(&environment.target).map_err(|err| ConfigError::Invalid {
                environment: name.clone(),
                message: err.to_string(),
            })?;
            if environment
                .ignore_file
                .as_deref()
                .is_some_and(|path| path.trim().is_empty())
            {
                return Err(ConfigError::Invalid {
                    environment: name.clone(),
                    message: String::from("ignore_file must not be empty"),
                });
            }
        }
        Ok(())
    }

    /// Looks up an environment by name.
    #[must_use]
    pub fn environment(&self, name: &str) -> Option<&Environment> {
        self.environments.get(name)
    }
}

/// Finds the configuration file using `ortho-config`'s discovery order.
#[derive(Clone, Debug)]
pub struct ConfigLoader {
    discovery: ConfigDiscovery,
}

impl ConfigLoader {
    /// Builds a loader using the standard discovery settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            discovery: ConfigDiscovery::builder(APP_NAME)
                .env_var(CONFIG_ENV_VAR)
                .config_file_name(CONFIG_FILE_NAME)
                .dotfile_name(DOTFILE_NAME)
                .project_file_name(PROJECT_FILE_NAME)
                .build(),
        }
    }

    /// Builds a loader using an explicit discovery configuration.
    #[must_use]
    pub const fn with_discovery(discovery: ConfigDiscovery) -> Self {
        Self { discovery }
    }

    /// Returns the first discovered configuration file that exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when no candidate exists, or
    /// [`ConfigError::Io`] when a candidate cannot be inspected.
    pub fn locate(&self) -> Result<Utf8PathBuf, ConfigError> {
        for candidate in self.discovery.utf8_candidates() {
            if path_exists(&candidate)? {
                return Ok(candidate);
            }
        }
        Err(ConfigError::NotFound)
    }

    /// Locates, reads, and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns any error from [`ConfigLoader::locate`] or
    /// [`DeployConfig::load_from_path`].
    pub fn load(&self) -> Result<DeployConfig, ConfigError> {
        let path = self.locate()?;
        tracing::debug!(path = %path, "loading configuration");
        DeployConfig::load_from_path(&path)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn split_file_name(path: &Utf8Path) -> Result<(&Utf8Path, &str), ConfigError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| ConfigError::Io {
        path: path.to_path_buf(),
        message: String::from("configuration file path is missing a filename"),
    })?;
    Ok((parent, file_name))
}

fn path_exists(path: &Utf8Path) -> Result<bool, ConfigError> {
    let (parent, file_name) = split_file_name(path)?;
    match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir.try_exists(file_name).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(ConfigError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

fn read_config(path: &Utf8Path) -> Result<String, ConfigError> {
    let (parent, file_name) = split_file_name(path)?;
    let dir =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| ConfigError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        })?;

    dir.read_to_string(file_name)
        .map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}
