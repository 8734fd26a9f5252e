//! Worker subprocess spawning.
//!
//! Stdout and stderr of the worker share one pipe so diagnostics (tracebacks,
//! library warnings) arrive interleaved with protocol lines, in order.

use super::spec::WorkerSpec;
use conspect_shared::errors::{ConspectError, ConspectResult};
use std::os::fd::OwnedFd;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::unix::pipe;
use tokio::process::{Child, ChildStdin, Command};

/// Combined stdout/stderr line stream of a worker.
///
/// Lines are decoded lossily: native libraries writing to stderr may emit
/// bytes that are not UTF-8, and such lines must reach the protocol decoder
/// as malformed input instead of failing the read.
pub(crate) struct OutputLines {
    reader: BufReader<pipe::Receiver>,
    buf: Vec<u8>,
}

impl OutputLines {
    fn new(receiver: pipe::Receiver) -> Self {
        Self {
            reader: BufReader::new(receiver),
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator, `None` at end of stream.
    pub(crate) async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }
        let line = self.buf.strip_suffix(b"\n").unwrap_or(&self.buf[..]);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        Ok(Some(String::from_utf8_lossy(line).into_owned()))
    }
}

/// A freshly spawned worker with its pipes.
pub(crate) struct SpawnedWorker {
    pub child: Child,
    pub stdin: ChildStdin,
    pub output: OutputLines,
}

/// Spawn the worker described by `spec`.
///
/// The process is killed if the returned handles are dropped without a
/// graceful shutdown.
pub(crate) fn spawn_worker(spec: &WorkerSpec) -> ConspectResult<SpawnedWorker> {
    let (output_rx, output_tx) = output_pipe().map_err(|e| {
        ConspectError::Startup(format!("Failed to create output pipe: {}", e))
    })?;
    let stderr_tx = output_tx.try_clone().map_err(|e| {
        ConspectError::Startup(format!("Failed to duplicate output pipe: {}", e))
    })?;

    let mut child = {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::from(output_tx))
            .stderr(Stdio::from(stderr_tx))
            .kill_on_drop(true);

        // Pass RUST_LOG to workers written with conspect-shared
        if let Ok(rust_log) = std::env::var("RUST_LOG") {
            cmd.env("RUST_LOG", rust_log);
        }
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        // `cmd` owns the parent's copies of the write ends; they close when it
        // drops at the end of this block, so EOF reaches us once the worker exits.
        cmd.spawn().map_err(|e| {
            let err_msg = format!("Failed to spawn worker `{}`: {}", spec.command_line(), e);
            tracing::error!("{}", err_msg);
            ConspectError::Startup(err_msg)
        })?
    };

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| ConspectError::Internal("worker stdin was not piped".into()))?;
    let receiver = pipe::Receiver::from_owned_fd(output_rx).map_err(|e| {
        ConspectError::Startup(format!("Failed to watch worker output: {}", e))
    })?;

    tracing::debug!(
        command = %spec.command_line(),
        pid = ?child.id(),
        "Spawned worker"
    );

    Ok(SpawnedWorker {
        child,
        stdin,
        output: OutputLines::new(receiver),
    })
}

/// Anonymous pipe whose ends are not inherited by unrelated children.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn output_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn output_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    use nix::fcntl::{FcntlArg, FdFlag, fcntl};

    let (rx, tx) = nix::unistd::pipe()?;
    for fd in [&rx, &tx] {
        fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((rx, tx))
}
