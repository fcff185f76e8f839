//! Interpreter processes on a pseudo-terminal.

use crate::matcher::{OutputChunk, OutputStream, PromptMatch, PromptMatcher, WaitError};
use crate::{CloseWarning, ReplError, Result};
use portable_pty::{native_pty_system, Child as PtyChild, CommandBuilder, MasterPty, PtySize};
use replscribe_types::Timeout;
use std::collections::HashMap;
use std::future::Future;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

const PTY_ROWS: u16 = 24;
const PTY_COLS: u16 = 80;

/// How long `close` waits for the interpreter to exit after end-of-input.
const CLOSE_GRACE: Duration = Duration::from_secs(2);
const CLOSE_POLL: Duration = Duration::from_millis(50);
/// How long `close` waits for a killed process to be reaped.
const REAP_TIMEOUT: Duration = Duration::from_secs(1);

/// End-of-input (Ctrl-D) on a terminal in canonical mode.
const EOT: u8 = 0x04;

/// The narrow capability the driver needs from a running interpreter.
pub trait ReplChannel: Send {
    /// Wait until `matcher` matches the interpreter's output.
    fn read_until(
        &mut self,
        matcher: &PromptMatcher,
        timeout: Timeout,
    ) -> impl Future<Output = std::result::Result<PromptMatch, WaitError>> + Send;

    /// Write raw bytes to the interpreter's input.
    fn write_all(&mut self, data: &[u8]) -> impl Future<Output = std::io::Result<()>> + Send;

    /// Terminate the interpreter.
    ///
    /// Returns the exit code when the process exited on its own, `None` when
    /// it had to be killed.
    fn close(self) -> impl Future<Output = std::result::Result<Option<u32>, CloseWarning>> + Send
    where
        Self: Sized;
}

/// A child process attached to a PTY, read by a background thread.
pub struct PtyChannel {
    stream: OutputStream,
    writer: Option<Box<dyn Write + Send>>,
    master: Option<Box<dyn MasterPty + Send>>,
    child: Option<Box<dyn PtyChild + Send + Sync>>,
    reader: Option<std::thread::JoinHandle<()>>,
    pid: Option<u32>,
}

impl PtyChannel {
    /// Start `argv` in `cwd` with exactly the environment `env`.
    pub fn spawn(argv: &[&str], cwd: &Path, env: &HashMap<String, String>) -> Result<Self> {
        let command_line = argv.join(" ");
        let spawn_error = |message: String| {
            error!(target: "replscribe::process", "Failed to spawn '{}': {}", command_line, message);
            ReplError::Spawn {
                command: command_line.clone(),
                message,
            }
        };

        let (program, args) = argv
            .split_first()
            .ok_or_else(|| spawn_error("empty command".to_string()))?;

        if !cwd.is_dir() {
            return Err(spawn_error(format!(
                "working directory does not exist: {:?}",
                cwd
            )));
        }

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: PTY_ROWS,
                cols: PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| spawn_error(format!("failed to open PTY: {}", e)))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        cmd.env_clear();
        for (key, value) in env {
            cmd.env(key, value);
        }
        cmd.cwd(cwd);

        info!(target: "replscribe::process", "Spawning '{}' in {:?}", command_line, cwd);

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| spawn_error(e.to_string()))?;
        // Only the child may hold the slave side, or EOF never arrives.
        drop(pair.slave);

        let pid = child.process_id();

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| spawn_error(format!("failed to clone PTY reader: {}", e)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| spawn_error(format!("failed to take PTY writer: {}", e)))?;

        let (tx, stream) = OutputStream::channel();

        // PTY reading is blocking
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            debug!(target: "replscribe::process", "PTY reader thread started");
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        let _ = tx.send(OutputChunk::Eof);
                        break;
                    }
                    Ok(n) => {
                        trace!(target: "replscribe::process", "PTY read {} bytes", n);
                        if tx.send(OutputChunk::Data(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) if is_hangup(&e) => {
                        let _ = tx.send(OutputChunk::Eof);
                        break;
                    }
                    Err(e) => {
                        let _ = tx.send(OutputChunk::Fault(e.to_string()));
                        break;
                    }
                }
            }
            debug!(target: "replscribe::process", "PTY reader thread exiting");
        });

        info!(target: "replscribe::process", "Spawned '{}' (pid {:?})", command_line, pid);

        Ok(Self {
            stream,
            writer: Some(writer),
            master: Some(pair.master),
            child: Some(child),
            reader: Some(handle),
            pid,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Close the PTY and kill the process group.
    fn hang_up_and_kill(&mut self) {
        drop(self.writer.take());
        drop(self.master.take());

        #[cfg(unix)]
        {
            if let Some(pid) = self.pid {
                info!(target: "replscribe::process", "Sending SIGKILL to process group {}", pid);
                unsafe {
                    // Negative PID kills the entire process group
                    libc::kill(-(pid as i32), libc::SIGKILL);
                }
            }
        }
    }

    async fn join_reader(&mut self) {
        if let Some(handle) = self.reader.take() {
            let joined =
                tokio::time::timeout(REAP_TIMEOUT, tokio::task::spawn_blocking(move || handle.join()))
                    .await;
            match joined {
                Ok(Ok(Ok(()))) => {
                    debug!(target: "replscribe::process", "Reader thread joined")
                }
                Ok(Ok(Err(e))) => {
                    warn!(target: "replscribe::process", "Reader thread panicked: {:?}", e)
                }
                Ok(Err(e)) => {
                    warn!(target: "replscribe::process", "Failed to join reader thread: {:?}", e)
                }
                Err(_) => debug!(target: "replscribe::process", "Reader thread still blocked, detaching"),
            }
        }
    }

    async fn close_inner(&mut self) -> std::result::Result<Option<u32>, CloseWarning> {
        let Some(mut child) = self.child.take() else {
            return Err(CloseWarning::new(self.pid, "already closed"));
        };

        // 1. Ask the interpreter to leave on its own
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.write_all(&[EOT]);
            let _ = writer.flush();
        }

        // 2. Wait for it to exit
        let start = tokio::time::Instant::now();
        while start.elapsed() < CLOSE_GRACE {
            match child.try_wait() {
                Ok(Some(status)) => {
                    info!(
                        target: "replscribe::process",
                        "Process {:?} exited with code {}",
                        self.pid,
                        status.exit_code()
                    );
                    drop(self.writer.take());
                    drop(self.master.take());
                    self.join_reader().await;
                    return Ok(Some(status.exit_code()));
                }
                Ok(None) => tokio::time::sleep(CLOSE_POLL).await,
                Err(e) => {
                    self.hang_up_and_kill();
                    return Err(CloseWarning::new(self.pid, e.to_string()));
                }
            }
        }

        // 3. Force it
        info!(target: "replscribe::process", "Process {:?} still running, forcing exit", self.pid);
        self.hang_up_and_kill();

        let reaped =
            tokio::time::timeout(REAP_TIMEOUT, tokio::task::spawn_blocking(move || child.wait())).await;
        self.join_reader().await;

        match reaped {
            Ok(Ok(Ok(_))) => Ok(None),
            Ok(Ok(Err(e))) => Err(CloseWarning::new(self.pid, e.to_string())),
            Ok(Err(e)) => Err(CloseWarning::new(self.pid, e.to_string())),
            Err(_) => Err(CloseWarning::new(
                self.pid,
                "process did not terminate after SIGKILL",
            )),
        }
    }
}

impl ReplChannel for PtyChannel {
    async fn read_until(
        &mut self,
        matcher: &PromptMatcher,
        timeout: Timeout,
    ) -> std::result::Result<PromptMatch, WaitError> {
        self.stream.read_until(matcher, timeout).await
    }

    async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "PTY writer already closed")
        })?;
        writer.write_all(data)?;
        writer.flush()
    }

    async fn close(mut self) -> std::result::Result<Option<u32>, CloseWarning> {
        self.close_inner().await
    }
}

impl Drop for PtyChannel {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if matches!(child.try_wait(), Ok(None)) {
                debug!(target: "replscribe::process", "Killing abandoned process {:?}", self.pid);
                self.hang_up_and_kill();
                let _ = child.try_wait();
            }
        }
    }
}

/// Reading a PTY master whose slave side is gone fails with EIO on Linux.
fn is_hangup(e: &std::io::Error) -> bool {
    #[cfg(unix)]
    {
        e.raw_os_error() == Some(libc::EIO)
    }
    #[cfg(not(unix))]
    {
        e.kind() == std::io::ErrorKind::BrokenPipe
    }
}
