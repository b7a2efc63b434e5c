//! Target descriptor parsing.
//!
//! Environments name their destination with a descriptor string, either
//! `file://<path>` for a local directory or
//! `ssh://<username>@<hostname>[:<port>]:<path>` for a host reached over SSH.
//! Parsing turns the raw string into a [`ResolvedTarget`] or rejects it.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// SSH port used when the descriptor omits one.
pub const DEFAULT_SSH_PORT: u16 = 22;

const FILE_SCHEME: &str = "file://";
const SSH_SCHEME: &str = "ssh://";

/// Destination derived from an environment's target descriptor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResolvedTarget {
    /// Directory on the local filesystem.
    Local {
        /// Destination directory, exactly as written in the descriptor.
        path: String,
    },
    /// Directory on a host reached over SSH.
    Remote {
        /// User used to authenticate via SSH.
        username: String,
        /// Hostname or address; never contains a colon.
        hostname: String,
        /// SSH port, [`DEFAULT_SSH_PORT`] when omitted.
        port: u16,
        /// Destination directory on the remote host.
        path: String,
    },
}

/// Raised when a descriptor matches neither supported syntax.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("Invalid target: {target}")]
pub struct InvalidTarget {
    /// Descriptor that failed to parse.
    pub target: String,
}

impl InvalidTarget {
    fn new(target: &str) -> Self {
        Self {
            target: target.to_owned(),
        }
    }
}

/// Parses a target descriptor.
///
/// The `file://` syntax is tried first, then `ssh://`. Within the SSH
/// syntax the right-most `@` that leaves a valid remainder separates the
/// username from the hostname, and a `:<digits>` segment after the hostname
/// is only read as the port when another `:` and a non-empty path follow it.
///
/// # Errors
///
/// Returns [`InvalidTarget`] when neither syntax matches, when the
/// descriptor spans several lines, or when the port does not fit in a `u16`.
///
/// # Examples
///
/// ```
/// use deploy_rsync::target::{resolve, ResolvedTarget};
///
/// let target = resolve("ssh://deploy@example.com:2222:/srv/app").expect("valid target");
/// assert_eq!(
///     target,
///     ResolvedTarget::Remote {
///         username: String::from("deploy"),
///         hostname: String::from("example.com"),
///         port: 2222,
///         path: String::from("/srv/app"),
///     }
/// );
/// ```
pub fn resolve(raw: &str) -> Result<ResolvedTarget, InvalidTarget> {
    if raw.contains('\n') {
        return Err(InvalidTarget::new(raw));
    }

    if let Some(path) = raw.strip_prefix(FILE_SCHEME)
        && !path.is_empty()
    {
        return Ok(ResolvedTarget::Local {
            path: path.to_owned(),
        });
    }

    let parts = raw
        .strip_prefix(SSH_SCHEME)
        .and_then(split_ssh)
        .ok_or_else(|| InvalidTarget::new(raw))?;
    let port = match parts.port {
        Some(digits) => digits.parse().map_err(|_| InvalidTarget::new(raw))?,
        None => DEFAULT_SSH_PORT,
    };

    Ok(ResolvedTarget::Remote {
        username: parts.username.to_owned(),
        hostname: parts.hostname.to_owned(),
        port,
        path: parts.path.to_owned(),
    })
}

impl FromStr for ResolvedTarget {
    type Err = InvalidTarget;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        resolve(raw)
    }
}

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { path } => write!(f, "{FILE_SCHEME}{path}"),
            Self::Remote {
                username,
                hostname,
                port,
                path,
            } => write!(f, "{SSH_SCHEME}{username}@{hostname}:{port}:{path}"),
        }
    }
}

#[derive(Debug)]
struct SshParts<'a> {
    username: &'a str,
    hostname: &'a str,
    port: Option<&'a str>,
    path: &'a str,
}

fn split_ssh(rest: &str) -> Option<SshParts<'_>> {
    rest.rmatch_indices('@').find_map(|(at, _)| {
        let (username, tail) = rest.split_at(at);
        if username.is_empty() {
            return None;
        }
        let (hostname, port, path) = split_host(tail.strip_prefix('@')?)?;
        Some(SshParts {
            username,
            hostname,
            port,
            path,
        })
    })
}

fn split_host(remainder: &str) -> Option<(&str, Option<&str>, &str)> {
    let (hostname, after_host) = remainder.split_once(':')?;
    if hostname.is_empty() {
        return None;
    }

    if let Some((port, path)) = after_host.split_once(':')
        && is_port(port)
        && !path.is_empty()
    {
        return Some((hostname, Some(port), path));
    }

    if after_host.is_empty() {
        return None;
    }
    Some((hostname, None, after_host))
}

fn is_port(candidate: &str) -> bool {
    !candidate.is_empty() && candidate.bytes().all(|byte| byte.is_ascii_digit())
}
