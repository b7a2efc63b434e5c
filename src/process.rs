//! Streaming execution of external commands.
//!
//! A started command hands back a [`LineStream`]: lines from stdout and
//! stderr arrive in the order the reader tasks see them, and the exit status
//! is only inspected by [`LineStream::finish`] once every line has been
//! drained. Reading the status any earlier could leave the child blocked on a
//! full pipe.

use std::future::Future;
use std::io;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::error::DeployError;

/// Number of lines buffered between the pipe readers and the consumer.
const LINE_BUFFER: usize = 64;

/// Output of a started command, consumed one line at a time.
pub trait LineStream {
    /// Returns the next line without its terminator, or `None` once both
    /// output streams are closed.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Output`] when reading the pipes fails.
    fn next_line(&mut self) -> impl Future<Output = Result<Option<String>, DeployError>>;

    /// Drains any unread output, then reads the exit status exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::ProcessExecution`] when the command did not
    /// exit successfully.
    fn finish(self) -> impl Future<Output = Result<(), DeployError>>;
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Stream type produced by [`CommandRunner::start`].
    type Lines: LineStream;

    /// Starts `argv[0]` with the remaining elements as arguments.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::EmptyCommand`] for an empty argv and
    /// [`DeployError::Spawn`] if the command cannot be started.
    fn start(&self, argv: &[String]) -> Result<Self::Lines, DeployError>;
}

/// Real command runner that spawns OS processes on the tokio runtime.
///
/// Must be used from within a tokio runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    type Lines = ProcessLines;

    fn start(&self, argv: &[String]) -> Result<ProcessLines, DeployError> {
        let (program, args) = argv.split_first().ok_or(DeployError::EmptyCommand)?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| DeployError::Spawn {
                program: program.clone(),
                message: err.to_string(),
            })?;
        tracing::info!(program = %program, pid = child.id(), "started process");

        let (sender, receiver) = mpsc::channel(LINE_BUFFER);
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, sender.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, sender);
        }

        Ok(ProcessLines {
            program: program.clone(),
            child,
            receiver,
        })
    }
}

/// Line stream backed by a running child process.
#[derive(Debug)]
pub struct ProcessLines {
    program: String,
    child: Child,
    receiver: mpsc::Receiver<io::Result<String>>,
}

impl LineStream for ProcessLines {
    fn next_line(&mut self) -> impl Future<Output = Result<Option<String>, DeployError>> {
        async move {
            match self.receiver.recv().await {
                Some(Ok(line)) => Ok(Some(line)),
                Some(Err(err)) => Err(DeployError::Output {
                    program: self.program.clone(),
                    message: err.to_string(),
                }),
                None => Ok(None),
            }
        }
    }

    fn finish(mut self) -> impl Future<Output = Result<(), DeployError>> {
        async move {
            let mut discarded = 0_usize;
            while self.receiver.recv().await.is_some() {
                discarded += 1;
            }
            if discarded > 0 {
                tracing::debug!(program = %self.program, discarded, "discarded unread output");
            }

            let status = self.child.wait().await.map_err(|err| DeployError::Output {
                program: self.program.clone(),
                message: err.to_string(),
            })?;
            if status.success() {
                tracing::info!(program = %self.program, "process finished");
                return Ok(());
            }

            tracing::warn!(program = %self.program, status = ?status.code(), "process failed");
            Err(DeployError::process_execution(&self.program, status.code()))
        }
    }
}

fn forward_lines<R>(reader: R, sender: mpsc::Sender<io::Result<String>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            let message = match reader.read_until(b'\n', &mut buffer).await {
                Ok(0) => break,
                Ok(_) => Ok(decode_line(&buffer)),
                Err(err) => Err(err),
            };
            let failed = message.is_err();
            if sender.send(message).await.is_err() || failed {
                break;
            }
        }
    });
}

fn decode_line(raw: &[u8]) -> String {
    let trimmed = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = trimmed.strip_suffix(b"\r").unwrap_or(trimmed);
    String::from_utf8_lossy(line).into_owned()
}
