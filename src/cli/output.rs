use std::io::Read;
use std::process::Child;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::cancel::CancelToken;
use crate::error::BridgeError;

const WATCH_INTERVAL: Duration = Duration::from_millis(150);

/// Live output of an asynchronously started invocation. Reader threads
/// append each stream into its own accumulator; a watcher kills the child
/// once the caller's token fires. Output collected before a kill stays
/// readable.
pub struct BufferedOutput {
    program: String,
    stdout: Arc<Mutex<Vec<u8>>>,
    stderr: Arc<Mutex<Vec<u8>>>,
    child: Arc<Mutex<Option<Child>>>,
    stop_flag: Arc<AtomicBool>,
    start_error: Option<BridgeError>,
}

impl BufferedOutput {
    /// Handle for an invocation that never started.
    pub(crate) fn start_failure(program: &str, error: BridgeError) -> Self {
        Self {
            program: program.to_string(),
            stdout: Arc::new(Mutex::new(Vec::new())),
            stderr: Arc::new(Mutex::new(Vec::new())),
            child: Arc::new(Mutex::new(None)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            start_error: Some(error),
        }
    }

    /// Wires reader and watcher threads around an already-spawned child.
    pub(crate) fn capture(program: &str, mut child: Child, token: &CancelToken) -> Self {
        let stdout_buf: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let stop_flag = Arc::new(AtomicBool::new(false));

        if let Some(stream) = child.stdout.take() {
            spawn_reader(
                program,
                "stdout",
                stream,
                Arc::clone(&stdout_buf),
                Arc::clone(&stop_flag),
            );
        }
        if let Some(stream) = child.stderr.take() {
            spawn_reader(
                program,
                "stderr",
                stream,
                Arc::clone(&stderr_buf),
                Arc::clone(&stop_flag),
            );
        }

        let child_slot: Arc<Mutex<Option<Child>>> = Arc::new(Mutex::new(Some(child)));
        let watch_child = Arc::clone(&child_slot);
        let watch_stop = Arc::clone(&stop_flag);
        let watch_token = token.clone();
        let watch_program = program.to_string();
        thread::spawn(move || loop {
            {
                let mut guard = match watch_child.lock() {
                    Ok(guard) => guard,
                    Err(_) => break,
                };
                let Some(child) = guard.as_mut() else {
                    break;
                };
                match child.try_wait() {
                    Ok(Some(_)) => {
                        guard.take();
                        break;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(
                            program = %watch_program,
                            error = %err,
                            "failed to poll streamed process"
                        );
                        break;
                    }
                }
                if watch_stop.load(Ordering::Relaxed) || watch_token.is_cancelled() {
                    if let Some(mut child) = guard.take() {
                        let _ = child.kill();
                        let _ = child.wait();
                    }
                    break;
                }
            }
            thread::sleep(WATCH_INTERVAL);
        });

        Self {
            program: program.to_string(),
            stdout: stdout_buf,
            stderr: stderr_buf,
            child: child_slot,
            stop_flag,
            start_error: None,
        }
    }

    /// Error from process start, if the invocation never launched.
    pub fn start_error(&self) -> Option<&BridgeError> {
        self.start_error.as_ref()
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Snapshot of everything written to stdout so far.
    pub fn stdout_snapshot(&self) -> String {
        snapshot_text(&self.stdout)
    }

    /// Snapshot of everything written to stderr so far.
    pub fn stderr_snapshot(&self) -> String {
        snapshot_text(&self.stderr)
    }

    pub fn is_running(&self) -> bool {
        let mut guard = match self.child.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        match guard.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Kills the process if it is still running.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Ok(mut guard) = self.child.lock() {
            if let Some(mut child) = guard.take() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

impl Drop for BufferedOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_reader<R>(
    program: &str,
    stream: &'static str,
    mut reader: R,
    buffer: Arc<Mutex<Vec<u8>>>,
    stop_flag: Arc<AtomicBool>,
) where
    R: Read + Send + 'static,
{
    let program = program.to_string();
    thread::spawn(move || {
        let mut temp = [0u8; 4096];
        loop {
            if stop_flag.load(Ordering::Relaxed) {
                break;
            }
            match reader.read(&mut temp) {
                Ok(0) => break,
                Ok(count) => {
                    if let Ok(mut guard) = buffer.lock() {
                        guard.extend_from_slice(&temp[..count]);
                    }
                }
                Err(err) => {
                    warn!(
                        program = %program,
                        stream = %stream,
                        error = %err,
                        "failed to read streamed output"
                    );
                    break;
                }
            }
        }
    });
}

fn snapshot_text(buffer: &Mutex<Vec<u8>>) -> String {
    match buffer.lock() {
        Ok(guard) => String::from_utf8_lossy(guard.as_slice()).to_string(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};
    use std::time::Instant;

    fn spawn_streaming_child() -> Child {
        let (program, args) = if cfg!(windows) {
            (
                "cmd.exe",
                vec![
                    "/C".to_string(),
                    "echo started & ping -n 31 127.0.0.1 > nul".to_string(),
                ],
            )
        } else {
            (
                "sh",
                vec!["-c".to_string(), "echo started; sleep 30".to_string()],
            )
        };
        Command::new(program)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn streaming child")
    }

    #[test]
    fn cancellation_kills_child_and_keeps_partial_output() {
        let token = CancelToken::unbounded();
        let output = BufferedOutput::capture("test-stream", spawn_streaming_child(), &token);

        let start = Instant::now();
        while !output.stdout_snapshot().contains("started")
            && start.elapsed() < Duration::from_secs(5)
        {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(
            output.stdout_snapshot().contains("started"),
            "expected the first line before cancelling"
        );

        token.cancel();
        let start = Instant::now();
        while output.is_running() && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(50));
        }

        assert!(!output.is_running(), "expected the watcher to kill the child");
        assert!(output.stdout_snapshot().contains("started"));
    }

    #[test]
    fn stop_terminates_a_running_process() {
        let token = CancelToken::unbounded();
        let output = BufferedOutput::capture("test-stream", spawn_streaming_child(), &token);
        assert!(output.is_running());
        output.stop();
        assert!(!output.is_running());
    }

    #[test]
    fn start_failure_reports_error_and_stays_inert() {
        let output = BufferedOutput::start_failure(
            "missing-tool",
            BridgeError::unavailable("missing-tool", "executable not found"),
        );
        assert!(output.start_error().is_some());
        assert!(!output.is_running());
        assert!(output.stdout_snapshot().is_empty());
        output.stop();
    }
}
