pub mod output;

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{trace, warn};

use crate::cancel::CancelToken;
use crate::cli::output::BufferedOutput;
use crate::error::{BridgeError, Result};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Receives one formatted command line per tool invocation.
///
/// Implementations must be cheap and non-blocking; a slow sink would stall
/// every invocation that goes through the tool.
pub trait TraceSink: Send + Sync {
    fn trace(&self, line: &str);
}

/// Forwards invocation traces to the `tracing` facade.
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn trace(&self, line: &str) {
        trace!(command = %line, "tool invocation");
    }
}

/// One external executable plus the invocation plumbing shared by both mode
/// clients. Holds no process state between calls.
pub struct CommandTool {
    path: String,
    sink: Option<Arc<dyn TraceSink>>,
}

impl CommandTool {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sink: None,
        }
    }

    pub fn with_sink(path: impl Into<String>, sink: Arc<dyn TraceSink>) -> Self {
        Self {
            path: path.into(),
            sink: Some(sink),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Verifies the configured path points at something runnable.
    ///
    /// Bare program names resolve through `PATH` at spawn time and pass
    /// unchecked; configured paths report "not found" and "is a directory"
    /// distinctly.
    pub fn check(&self) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(BridgeError::unavailable(&self.path, "command is empty"));
        }
        if !self.path.contains('/') && !self.path.contains(std::path::MAIN_SEPARATOR) {
            return Ok(());
        }
        let path = Path::new(&self.path);
        if path.is_dir() {
            return Err(BridgeError::unavailable(
                &self.path,
                "path points to a directory, not an executable file",
            ));
        }
        if !path.exists() {
            return Err(BridgeError::unavailable(
                &self.path,
                "executable not found at the configured path",
            ));
        }
        Ok(())
    }

    /// Runs the tool to completion and returns its combined stdout/stderr
    /// text. Non-zero exit becomes `CommandFailed` carrying that same text.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        self.run_with_token(&CancelToken::unbounded(), args)
    }

    /// `run` that also watches a cancellation token: a fired token kills the
    /// child instead of leaking it and returns `Cancelled`.
    pub fn run_with_token(&self, token: &CancelToken, args: &[&str]) -> Result<String> {
        self.trace_invocation(args);

        let mut child = Command::new(&self.path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| BridgeError::Launch {
                program: self.path.clone(),
                source: err,
            })?;

        // Both pipes drain into one buffer so the text reads in arrival
        // order, and a chatty child never blocks on a full pipe.
        let combined: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let stdout_handle = child
            .stdout
            .take()
            .map(|stream| drain_into(stream, Arc::clone(&combined)));
        let stderr_handle = child
            .stderr
            .take()
            .map(|stream| drain_into(stream, Arc::clone(&combined)));

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if token.is_cancelled() {
                        let _ = child.kill();
                        let _ = child.wait();
                        join_drain(stdout_handle);
                        join_drain(stderr_handle);
                        return Err(BridgeError::Cancelled);
                    }
                    thread::sleep(WAIT_POLL_INTERVAL);
                }
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    join_drain(stdout_handle);
                    join_drain(stderr_handle);
                    return Err(BridgeError::Launch {
                        program: self.path.clone(),
                        source: err,
                    });
                }
            }
        };

        join_drain(stdout_handle);
        join_drain(stderr_handle);

        let output = match combined.lock() {
            Ok(guard) => String::from_utf8_lossy(guard.as_slice()).to_string(),
            Err(_) => String::new(),
        };

        if status.success() {
            Ok(output)
        } else {
            Err(BridgeError::CommandFailed {
                program: self.path.clone(),
                code: status.code(),
                output,
            })
        }
    }

    /// Starts the tool without waiting and streams its output into the
    /// returned handle. A spawn failure lands in the handle's error slot
    /// rather than a direct error return, so the caller always gets a handle
    /// to inspect.
    pub fn run_streamed(&self, token: &CancelToken, args: &[&str]) -> BufferedOutput {
        self.trace_invocation(args);

        match Command::new(&self.path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => BufferedOutput::capture(&self.path, child, token),
            Err(err) => {
                warn!(
                    program = %self.path,
                    error = %err,
                    "failed to start streamed invocation"
                );
                BufferedOutput::start_failure(
                    &self.path,
                    BridgeError::Launch {
                        program: self.path.clone(),
                        source: err,
                    },
                )
            }
        }
    }

    fn trace_invocation(&self, args: &[&str]) {
        if let Some(sink) = &self.sink {
            let name = Path::new(&self.path)
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| self.path.clone());
            sink.trace(&format!("{} {}", name, args.join(" ")));
        }
    }
}

fn drain_into<R>(mut reader: R, buffer: Arc<Mutex<Vec<u8>>>) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut temp = [0u8; 4096];
        loop {
            match reader.read(&mut temp) {
                Ok(0) => break,
                Ok(count) => {
                    if let Ok(mut guard) = buffer.lock() {
                        guard.extend_from_slice(&temp[..count]);
                    }
                }
                Err(_) => break,
            }
        }
    })
}

fn join_drain(handle: Option<thread::JoinHandle<()>>) {
    if let Some(handle) = handle {
        let _ = handle.join();
    }
}
