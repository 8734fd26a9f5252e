//! Blocking request/response channel to one worker process.

use super::display::log_event;
use super::spawn::{OutputLines, SpawnedWorker, spawn_worker};
use super::spec::WorkerSpec;
use conspect_shared::errors::{ConspectError, ConspectResult};
use conspect_shared::protocol::{Inbound, Op, Request, ResultEvent, WorkerEvent, decode_line};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};

/// Outcome of a graceful shutdown.
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// Answer to the `ext` request.
    pub event: ResultEvent,
    /// Exit code, `None` if the worker was terminated by a signal.
    pub exit_code: Option<i32>,
}

/// Handles of a live worker.
struct WorkerProcess {
    child: Child,
    stdin: ChildStdin,
    output: OutputLines,
}

impl From<SpawnedWorker> for WorkerProcess {
    fn from(spawned: SpawnedWorker) -> Self {
        Self {
            child: spawned.child,
            stdin: spawned.stdin,
            output: spawned.output,
        }
    }
}

/// One external worker and its line protocol.
///
/// # Lifecycle
///
/// 1. `start` spawns the process and waits for the `started` handshake
/// 2. `request` sends one request and waits for its correlated `result`
/// 3. `stop` sends `ext`, waits for its `result`, then for process exit
///
/// After `stop` (or after the worker's output closes) the channel is inert:
/// every further request fails with [`ConspectError::Protocol`].
pub struct WorkerChannel {
    name: String,
    spec: WorkerSpec,
    process: Option<WorkerProcess>,
    handshake: Option<Value>,
    elided_keys: Vec<String>,
}

impl std::fmt::Debug for WorkerChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerChannel")
            .field("name", &self.name)
            .field("command", &self.spec.command_line())
            .field("open", &self.is_open())
            .finish()
    }
}

impl WorkerChannel {
    /// Launch the worker and wait for its handshake.
    ///
    /// Exactly one line is read. Anything other than `started` with
    /// `ok: true` (bad JSON, another event type, `ok: false`, EOF) is a
    /// [`ConspectError::Startup`]; the process is killed in that case.
    pub async fn start(name: impl Into<String>, spec: &WorkerSpec) -> ConspectResult<Self> {
        let name = name.into();
        let mut process = WorkerProcess::from(spawn_worker(spec)?);

        let line = process
            .output
            .next_line()
            .await
            .map_err(|e| ConspectError::Startup(format!("{} worker: {}", name, e)))?
            .ok_or_else(|| {
                ConspectError::Startup(format!("{} worker exited before its handshake", name))
            })?;

        let decoded = decode_line(line.trim());
        if let Inbound::Event(event) = &decoded {
            log_event(&name, event, &[]);
        }
        let handshake = match decoded {
            Inbound::Event(WorkerEvent::Started {
                ok: true, payload, ..
            }) => payload.unwrap_or(Value::Null),
            other => {
                let err_msg = format!("{} worker didn't start properly: {:?}", name, other);
                tracing::error!("{}", err_msg);
                return Err(ConspectError::Startup(err_msg));
            }
        };

        tracing::info!(
            worker = %name,
            pid = ?process.child.id(),
            handshake = %handshake,
            "Worker started"
        );

        Ok(Self {
            name,
            spec: spec.clone(),
            process: Some(process),
            handshake: Some(handshake),
            elided_keys: Vec::new(),
        })
    }

    /// Payload fields shortened when events are logged.
    pub fn with_elided_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.elided_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload of the `started` handshake.
    pub fn handshake(&self) -> Option<&Value> {
        self.handshake.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.process.is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.child.id())
    }

    /// Send one request and wait for the `result` carrying `id`.
    ///
    /// Unrelated events and diagnostic lines read in the meantime are logged
    /// and discarded. A closed output stream is fatal: the channel is closed
    /// and [`ConspectError::Protocol`] returned.
    pub async fn request(
        &mut self,
        id: u64,
        op: Op,
        payload: Option<Value>,
    ) -> ConspectResult<ResultEvent> {
        let request = Request {
            id: Some(id),
            op,
            payload,
        };

        let outcome = match self.process.as_mut() {
            Some(process) => exchange(process, &self.name, &self.elided_keys, &request).await,
            None => {
                return Err(ConspectError::Protocol(format!(
                    "{} worker channel is closed",
                    self.name
                )));
            }
        };

        if let Err(e) = &outcome {
            tracing::error!(worker = %self.name, id, error = %e, "Worker channel failed");
            self.process = None;
        }
        outcome
    }

    /// Graceful `ext` handshake, then wait for exit.
    ///
    /// On timeout the worker is killed and [`ConspectError::ShutdownTimeout`]
    /// returned. The channel is closed either way.
    pub async fn stop(&mut self, id: u64) -> ConspectResult<Shutdown> {
        let event = self.request(id, Op::Ext, None).await?;

        let WorkerProcess {
            mut child,
            stdin,
            output: _output,
        } = self.process.take().ok_or_else(|| {
            ConspectError::Protocol(format!("{} worker channel is closed", self.name))
        })?;
        drop(stdin);

        let timeout = self.spec.shutdown_timeout();
        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(worker = %self.name, exit_code = ?status.code(), "Worker exited");
                Ok(Shutdown {
                    event,
                    exit_code: status.code(),
                })
            }
            Ok(Err(e)) => Err(ConspectError::Protocol(format!(
                "Failed to wait for {} worker: {}",
                self.name, e
            ))),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(worker = %self.name, error = %e, "Failed to kill worker");
                }
                Err(ConspectError::ShutdownTimeout(format!(
                    "{} worker did not exit within {:?}",
                    self.name, timeout
                )))
            }
        }
    }
}

/// Write `request` and read until its result arrives.
async fn exchange(
    process: &mut WorkerProcess,
    name: &str,
    elided_keys: &[String],
    request: &Request,
) -> ConspectResult<ResultEvent> {
    let line = request.to_line()?;
    process
        .stdin
        .write_all(line.as_bytes())
        .await
        .map_err(|e| {
            ConspectError::Protocol(format!("Failed to write to {} worker: {}", name, e))
        })?;
    process.stdin.flush().await.map_err(|e| {
        ConspectError::Protocol(format!("Failed to flush {} worker stdin: {}", name, e))
    })?;

    loop {
        let line = process
            .output
            .next_line()
            .await
            .map_err(|e| {
                ConspectError::Protocol(format!("Failed to read from {} worker: {}", name, e))
            })?
            .ok_or_else(|| ConspectError::Protocol(format!("{} worker stdout closed", name)))?;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match decode_line(line) {
            Inbound::Event(event) => {
                log_event(name, &event, elided_keys);
                if let WorkerEvent::Result(result) = event
                    && result.id == request.id
                {
                    return Ok(result);
                }
                tracing::debug!(
                    worker = %name,
                    expected = ?request.id,
                    "Discarding uncorrelated event"
                );
            }
            Inbound::Unrecognized(value) => {
                tracing::warn!(
                    worker = %name,
                    line = %value,
                    "Ignoring non-protocol JSON from worker"
                );
            }
            Inbound::Malformed { line, .. } => {
                tracing::warn!(worker = %name, line = %line, "[bad json] from worker");
            }
        }
    }
}
