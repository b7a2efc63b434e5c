//! Assembly of the rsync command line for an environment.

use camino::Utf8Path;
use shell_escape::unix::escape;

use crate::config::{Environment, RsyncDefaults};
use crate::error::DeployError;
use crate::target::{self, ResolvedTarget};

/// Flag that turns the transfer into a dry run.
pub const DRY_RUN_FLAG: &str = "--dry-run";

/// Builds the argv used to deploy `environment`, program name first.
///
/// The arguments are, in order: the rsync executable, `--dry-run` when
/// `dry_run` is set, the effective options, `--exclude-from=<file>` when an
/// ignore file applies, then the source and destination. Remote targets add
/// `-e "ssh -p<port>"` before the source. Directories always end with `/` so
/// rsync copies their contents rather than the directory itself.
///
/// No prompting happens here: when no ignore file applies, the caller must
/// already have confirmed that deploying without one is acceptable.
///
/// # Errors
///
/// Returns [`DeployError::IgnoreFileNotFound`] when the effective ignore file
/// does not exist, and [`DeployError::InvalidTarget`] when the environment's
/// target cannot be parsed.
pub fn build_rsync_args(
    defaults: &RsyncDefaults,
    environment: &Environment,
    project_dir: &Utf8Path,
    dry_run: bool,
) -> Result<Vec<String>, DeployError> {
    let mut args = vec![defaults.rsync_path.clone()];
    if dry_run {
        args.push(DRY_RUN_FLAG.to_owned());
    }
    args.extend(environment.effective_options(defaults).iter().cloned());

    if let Some(ignore_file) = environment.effective_ignore_file(defaults) {
        if !Utf8Path::new(ignore_file).exists() {
            return Err(DeployError::IgnoreFileNotFound {
                path: ignore_file.to_owned(),
            });
        }
        args.push(format!("--exclude-from={ignore_file}"));
    }

    let destination = target::resolve(&environment.target)?;
    tracing::debug!(environment = %environment.name, target = %destination, "resolved target");

    let source = normalize_dir_path(project_dir.as_str());
    match destination {
        ResolvedTarget::Local { path } => {
            args.push(source);
            args.push(normalize_dir_path(&path));
        }
        ResolvedTarget::Remote {
            username,
            hostname,
            port,
            path,
        } => {
            args.push(String::from("-e"));
            args.push(format!("ssh -p{port}"));
            args.push(source);
            args.push(format!(
                "{username}@{hostname}:{}",
                normalize_dir_path(&path)
            ));
        }
    }

    Ok(args)
}

/// Appends a trailing `/` unless `path` already ends with one.
///
/// ```
/// use deploy_rsync::command::normalize_dir_path;
///
/// assert_eq!(normalize_dir_path("dir"), "dir/");
/// assert_eq!(normalize_dir_path("dir/"), "dir/");
/// ```
#[must_use]
pub fn normalize_dir_path(path: &str) -> String {
    if path.ends_with('/') {
        path.to_owned()
    } else {
        format!("{path}/")
    }
}

/// Renders an argv as a shell-quoted command line for logs.
#[must_use]
pub fn render_command_line(args: &[String]) -> String {
    args.iter()
        .map(|arg| escape(arg.as_str().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::fs;
    use tempfile::TempDir;

    struct IgnoreFixture {
        _tmp: TempDir,
        path: String,
    }

    #[fixture]
    fn ignore_file() -> IgnoreFixture {
        let tmp = TempDir::new().expect("temp dir");
        let file = tmp.path().join("ignore_file.txt");
        fs::write(&file, ".git\n").expect("write ignore file");
        let path = file.to_str().expect("utf8 temp path").to_owned();
        IgnoreFixture { _tmp: tmp, path }
    }

    fn defaults(ignore_file: Option<&str>) -> RsyncDefaults {
        RsyncDefaults {
            rsync_path: String::from("rsync"),
            rsync_options: vec![String::from("-azC")],
            ignore_file: ignore_file.map(str::to_owned),
        }
    }

    fn environment(target: &str) -> Environment {
        Environment {
            name: String::from("env"),
            target: target.to_owned(),
            rsync_options: Vec::new(),
            ignore_file: None,
        }
    }

    #[rstest]
    fn remote_dry_run_matches_expected_argv(ignore_file: IgnoreFixture) {
        let args = build_rsync_args(
            &defaults(Some(&ignore_file.path)),
            &environment("ssh://u@h:22:/p"),
            Utf8Path::new("/local"),
            true,
        )
        .expect("args should build");

        assert_eq!(
            args,
            vec![
                String::from("rsync"),
                String::from("--dry-run"),
                String::from("-azC"),
                format!("--exclude-from={}", ignore_file.path),
                String::from("-e"),
                String::from("ssh -p22"),
                String::from("/local/"),
                String::from("u@h:/p/"),
            ]
        );
    }

    #[rstest]
    fn go_mode_only_omits_dry_run(ignore_file: IgnoreFixture) {
        let rsync_defaults = defaults(Some(&ignore_file.path));
        let env = environment("ssh://u@h:22:/p");
        let project = Utf8Path::new("/local");

        let mut dry = build_rsync_args(&rsync_defaults, &env, project, true).expect("dry run");
        let go = build_rsync_args(&rsync_defaults, &env, project, false).expect("go");

        dry.retain(|arg| arg != DRY_RUN_FLAG);
        assert_eq!(dry, go);
    }

    #[test]
    fn local_target_normalises_both_directories() {
        let args = build_rsync_args(
            &defaults(None),
            &environment("file:///path3/subdir3"),
            Utf8Path::new("/local/path/"),
            false,
        )
        .expect("args should build");

        assert_eq!(args, vec!["rsync", "-azC", "/local/path/", "/path3/subdir3/"]);
    }

    #[test]
    fn remote_target_uses_explicit_port() {
        let args = build_rsync_args(
            &defaults(None),
            &environment("ssh://username2@host2:23:/path2"),
            Utf8Path::new("/local/path"),
            false,
        )
        .expect("args should build");

        assert_eq!(
            args,
            vec![
                "rsync",
                "-azC",
                "-e",
                "ssh -p23",
                "/local/path/",
                "username2@host2:/path2/"
            ]
        );
    }

    #[test]
    fn environment_options_replace_defaults() {
        let env = Environment {
            rsync_options: vec![String::from("-rl"), String::from("--checksum")],
            ..environment("file:///dst")
        };
        let args = build_rsync_args(&defaults(None), &env, Utf8Path::new("/src"), false)
            .expect("args should build");

        assert_eq!(args, vec!["rsync", "-rl", "--checksum", "/src/", "/dst/"]);
    }

    #[rstest]
    fn environment_ignore_file_overrides_default(ignore_file: IgnoreFixture) {
        let env = Environment {
            ignore_file: Some(ignore_file.path.clone()),
            ..environment("file:///dst")
        };
        let args = build_rsync_args(
            &defaults(Some("/does/not/exist")),
            &env,
            Utf8Path::new("/src"),
            false,
        )
        .expect("environment ignore file should win");

        assert!(args.contains(&format!("--exclude-from={}", ignore_file.path)));
    }

    #[test]
    fn missing_ignore_file_fails_before_target_resolution() {
        let err = build_rsync_args(
            &defaults(Some("/definitely/missing/ignore.txt")),
            &environment("not a target"),
            Utf8Path::new("/src"),
            true,
        )
        .expect_err("missing ignore file should fail");

        assert_eq!(
            err,
            DeployError::IgnoreFileNotFound {
                path: String::from("/definitely/missing/ignore.txt")
            }
        );
        assert_eq!(
            err.to_string(),
            "Ignore file \"/definitely/missing/ignore.txt\" not found"
        );
    }

    #[test]
    fn invalid_target_is_reported() {
        let err = build_rsync_args(
            &defaults(None),
            &environment("ftp://nowhere"),
            Utf8Path::new("/src"),
            true,
        )
        .expect_err("invalid target should fail");

        assert!(matches!(err, DeployError::InvalidTarget(_)), "got {err:?}");
    }

    #[rstest]
    #[case("dir", "dir/")]
    #[case("dir/", "dir/")]
    #[case("/a/b", "/a/b/")]
    #[case("/", "/")]
    fn normalize_dir_path_appends_single_slash(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_dir_path(input), expected);
    }

    #[test]
    fn render_command_line_quotes_arguments() {
        let args = vec![
            String::from("rsync"),
            String::from("-e"),
            String::from("ssh -p22"),
        ];
        assert_eq!(render_command_line(&args), "rsync -e 'ssh -p22'");
    }
}
