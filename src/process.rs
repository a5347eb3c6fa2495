//! Line-oriented reader over an external process
//!
//! Spawns a miner executable and yields what it prints on stdout and stderr,
//! one line at a time. The child is killed and reaped when the cancellation
//! token fires, and `kill_on_drop` covers readers abandoned mid-stream.

use crate::{Error, Result};
use futures::stream::{self, Stream};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Buffered line splitter that keeps partial lines across cancelled reads
#[derive(Debug)]
struct LineSource<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineSource<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator, `None` at end of stream
    ///
    /// Invalid UTF-8 is replaced rather than treated as an error.
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Ok(Some(line))
    }
}

async fn read_from<R: AsyncRead + Unpin>(
    source: &mut Option<LineSource<R>>,
) -> std::io::Result<Option<String>> {
    match source {
        Some(source) => source.next_line().await,
        None => std::future::pending().await,
    }
}

enum ReadEvent {
    Cancelled,
    Stdout(std::io::Result<Option<String>>),
    Stderr(std::io::Result<Option<String>>),
}

/// Split an argument string into words using shell quoting rules
pub fn split_args(args: &str) -> Result<Vec<String>> {
    shlex::split(args)
        .ok_or_else(|| Error::invalid_argument(format!("Unbalanced quoting in arguments: {}", args)))
}

/// External process exposed as a finite sequence of output lines
#[derive(Debug)]
pub struct ProcessLineReader {
    program: PathBuf,
    child: Child,
    stdout: Option<LineSource<tokio::process::ChildStdout>>,
    stderr: Option<LineSource<tokio::process::ChildStderr>>,
    cancel: CancellationToken,
    exit_status: Option<ExitStatus>,
    finished: bool,
}

impl ProcessLineReader {
    /// Start `program` with the given argument string
    ///
    /// The child is tied to `cancel`: once the token fires, the next read
    /// kills and reaps it and reports `Error::Cancelled`.
    pub fn spawn(program: impl AsRef<Path>, args: &str, cancel: CancellationToken) -> Result<Self> {
        let program = program.as_ref().to_path_buf();
        let argv = split_args(args)?;

        debug!("Spawning {} {:?}", program.display(), argv);

        let mut child = Command::new(&program)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::external_process(format!("Failed to spawn {}: {}", program.display(), e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::external_process("Failed to get stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::external_process("Failed to get stderr"))?;

        Ok(Self {
            program,
            child,
            stdout: Some(LineSource::new(stdout)),
            stderr: Some(LineSource::new(stderr)),
            cancel,
            exit_status: None,
            finished: false,
        })
    }

    /// OS process id, while the child has not been reaped
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Exit status, once the child has been reaped
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Read the next line from stdout or stderr
    ///
    /// Returns `Ok(None)` once both streams are closed and the child has
    /// exited. After `None` or an error every further call returns `Ok(None)`.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            if self.stdout.is_none() && self.stderr.is_none() {
                self.reap().await?;
                return Ok(None);
            }

            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => ReadEvent::Cancelled,
                line = read_from(&mut self.stdout), if self.stdout.is_some() => ReadEvent::Stdout(line),
                line = read_from(&mut self.stderr), if self.stderr.is_some() => ReadEvent::Stderr(line),
            };

            match event {
                ReadEvent::Cancelled => {
                    self.shutdown_inner().await;
                    return Err(Error::cancelled(format!(
                        "reading output of {}",
                        self.program.display()
                    )));
                }
                ReadEvent::Stdout(Ok(Some(line))) | ReadEvent::Stderr(Ok(Some(line))) => {
                    return Ok(Some(line));
                }
                ReadEvent::Stdout(Ok(None)) => self.stdout = None,
                ReadEvent::Stderr(Ok(None)) => self.stderr = None,
                ReadEvent::Stdout(Err(e)) | ReadEvent::Stderr(Err(e)) => {
                    self.shutdown_inner().await;
                    return Err(Error::external_process(format!(
                        "Failed to read output of {}: {}",
                        self.program.display(),
                        e
                    )));
                }
            }
        }
    }

    /// Kill the child if it is still running and wait for it
    pub async fn shutdown(mut self) {
        self.shutdown_inner().await;
    }

    /// Consume the reader as a stream of lines
    pub fn into_stream(self) -> impl Stream<Item = Result<String>> {
        stream::unfold(self, |mut reader| async move {
            match reader.next_line().await {
                Ok(Some(line)) => Some((Ok(line), reader)),
                Ok(None) => None,
                Err(e) => Some((Err(e), reader)),
            }
        })
    }

    /// Wait for a child whose pipes are closed
    ///
    /// A child may close or redirect its output and keep running, so the
    /// wait still gives way to cancellation.
    async fn reap(&mut self) -> Result<()> {
        let waited = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            status = self.child.wait() => Some(status),
        };

        match waited {
            None => {
                self.shutdown_inner().await;
                Err(Error::cancelled(format!(
                    "waiting for {}",
                    self.program.display()
                )))
            }
            Some(status) => {
                self.finished = true;
                let status = status.map_err(|e| {
                    Error::external_process(format!(
                        "Failed to wait for {}: {}",
                        self.program.display(),
                        e
                    ))
                })?;
                self.record_exit(status);
                Ok(())
            }
        }
    }

    async fn shutdown_inner(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.stdout = None;
        self.stderr = None;

        if let Err(e) = self.child.start_kill() {
            debug!("Kill request for {} failed: {}", self.program.display(), e);
        }
        match self.child.wait().await {
            Ok(status) => self.record_exit(status),
            Err(e) => warn!("Failed to reap {}: {}", self.program.display(), e),
        }
    }

    fn record_exit(&mut self, status: ExitStatus) {
        if status.success() {
            debug!("{} exited cleanly", self.program.display());
        } else {
            debug!("{} exited with {}", self.program.display(), status);
        }
        self.exit_status = Some(status);
    }
}
