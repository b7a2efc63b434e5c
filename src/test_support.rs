//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::{Future, ready};
use std::rc::Rc;

use crate::error::DeployError;
use crate::process::{CommandRunner, LineStream};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<ScriptedResponse>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

#[derive(Clone, Debug)]
struct ScriptedResponse {
    lines: Vec<String>,
    code: Option<i32>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Full argv, program first.
    pub args: Vec<String>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        self.args.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Pushes a run producing `lines` and exiting with `code`.
    pub fn push_lines(&self, lines: &[&str], code: i32) {
        self.responses.borrow_mut().push_back(ScriptedResponse {
            lines: lines.iter().map(|line| (*line).to_owned()).collect(),
            code: Some(code),
        });
    }

    /// Pushes a run that ends without an exit code, as when killed by a
    /// signal.
    pub fn push_missing_exit_code(&self, lines: &[&str]) {
        self.responses.borrow_mut().push_back(ScriptedResponse {
            lines: lines.iter().map(|line| (*line).to_owned()).collect(),
            code: None,
        });
    }
}

impl CommandRunner for ScriptedRunner {
    type Lines = ScriptedLines;

    fn start(&self, argv: &[String]) -> Result<ScriptedLines, DeployError> {
        let program = argv.first().ok_or(DeployError::EmptyCommand)?;
        self.invocations.borrow_mut().push(CommandInvocation {
            args: argv.to_vec(),
        });
        let response =
            self.responses
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| DeployError::Spawn {
                    program: program.clone(),
                    message: String::from("no scripted response available"),
                })?;

        Ok(ScriptedLines {
            program: program.clone(),
            lines: response.lines.into(),
            code: response.code,
        })
    }
}

/// Line stream replaying a scripted response.
#[derive(Clone, Debug)]
pub struct ScriptedLines {
    program: String,
    lines: VecDeque<String>,
    code: Option<i32>,
}

impl LineStream for ScriptedLines {
    fn next_line(&mut self) -> impl Future<Output = Result<Option<String>, DeployError>> {
        ready(Ok(self.lines.pop_front()))
    }

    fn finish(self) -> impl Future<Output = Result<(), DeployError>> {
        let result = if self.code == Some(0) {
            Ok(())
        } else {
            Err(DeployError::process_execution(&self.program, self.code))
        };
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_lines_then_exit_code() {
        let runner = ScriptedRunner::new();
        runner.push_lines(&["a", "b"], 3);

        let mut lines = runner
            .start(&[String::from("rsync"), String::from("-a")])
            .expect("scripted start");
        assert_eq!(lines.next_line().await, Ok(Some(String::from("a"))));
        assert_eq!(lines.next_line().await, Ok(Some(String::from("b"))));
        assert_eq!(lines.next_line().await, Ok(None));
        assert_eq!(
            lines.finish().await,
            Err(DeployError::process_execution("rsync", Some(3)))
        );
        assert_eq!(
            runner.invocations(),
            vec![CommandInvocation {
                args: vec![String::from("rsync"), String::from("-a")]
            }]
        );
    }

    #[tokio::test]
    async fn missing_exit_code_counts_as_failure() {
        let runner = ScriptedRunner::new();
        runner.push_missing_exit_code(&[]);

        let lines = runner.start(&[String::from("rsync")]).expect("scripted start");
        let err = lines.finish().await.expect_err("no exit code should fail");
        assert!(err.to_string().contains("status unknown"));
    }

    #[test]
    fn start_without_script_reports_spawn_error() {
        let runner = ScriptedRunner::new();
        let result = runner.start(&[String::from("rsync")]);
        assert!(matches!(result, Err(DeployError::Spawn { .. })));
    }
}
