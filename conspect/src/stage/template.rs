//! Generic stage runner.

use super::Stage;
use super::policy::PolicyOutcome;
use crate::cache::ArtifactCache;
use crate::pipeline::StageStats;
use crate::worker::WorkerChannel;
use conspect_shared::errors::{ConspectError, ConspectResult};
use conspect_shared::protocol::Op;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic request ids for one pipeline run, starting at 1.
#[derive(Debug)]
pub struct RequestIds(AtomicU64);

impl RequestIds {
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn next_id(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// Id the next request will get.
    pub fn peek(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive one worker across `items`.
///
/// Items and their inputs are processed strictly in order. `ok:false`
/// results go through the stage's failure policy and processing continues;
/// startup, protocol and cache errors abort the stage. A worker that does
/// not exit after `ext` is killed and only logged.
pub async fn run_stage<S: Stage>(
    stage: &mut S,
    cache: &ArtifactCache,
    ids: &RequestIds,
    items: &[PathBuf],
) -> ConspectResult<StageStats> {
    let mut stats = StageStats::new(stage.name());
    let name = stage.name().to_string();

    let mut channel = WorkerChannel::start(name.as_str(), stage.worker_spec())
        .await?
        .with_elided_keys(stage.elided_keys().iter().copied());
    stage.on_start()?;

    tracing::info!(stage = %name, pid = ?channel.pid(), items = items.len(), "Stage started");

    for item in items {
        stats.items += 1;
        let item_dir = stage.item_dir(cache, item)?;
        let inputs = stage.inputs(cache, item, &item_dir)?;
        tracing::info!(
            stage = %name,
            item = %item.display(),
            inputs = inputs.len(),
            "Processing item"
        );

        stage.begin_item(&item_dir)?;
        for input in &inputs {
            let payload = stage.payload(cache, &item_dir, input)?;
            let id = ids.next_id();
            stats.requests += 1;

            let result = channel.request(id, Op::Do, Some(payload)).await?;
            match result.outcome() {
                Ok(payload) => {
                    stats.succeeded += 1;
                    stage.on_success(cache, &item_dir, input, payload)?;
                }
                Err(message) => {
                    stats.failed += 1;
                    let err = ConspectError::Worker(message.to_string());
                    tracing::warn!(
                        stage = %name,
                        id,
                        input = %input.display(),
                        error = %err,
                        policy = %stage.failure_policy(),
                        "Worker failed on input"
                    );

                    let failure_dir = stage.failure_dir(cache, &item_dir)?;
                    match stage
                        .failure_policy()
                        .apply(cache, input, &item_dir, &failure_dir)
                    {
                        PolicyOutcome::Purged => {
                            stats.purged += 1;
                            break;
                        }
                        PolicyOutcome::Preserved => stats.preserved += 1,
                        PolicyOutcome::Ignored | PolicyOutcome::Skipped => {}
                    }
                }
            }
        }
        stage.end_item()?;
    }

    stage.on_finish()?;

    match channel.stop(ids.next_id()).await {
        Ok(shutdown) => {
            if let Err(message) = shutdown.event.outcome() {
                tracing::warn!(stage = %name, error = %message, "Worker rejected shutdown");
            }
            stats.exit_code = shutdown.exit_code;
        }
        Err(ConspectError::ShutdownTimeout(message)) => {
            tracing::warn!(stage = %name, error = %message, "Worker killed after shutdown timeout");
            stats.shutdown_timed_out = true;
        }
        Err(e) => return Err(e),
    }

    tracing::info!(
        stage = %name,
        items = stats.items,
        requests = stats.requests,
        succeeded = stats.succeeded,
        failed = stats.failed,
        purged = stats.purged,
        preserved = stats.preserved,
        exit_code = ?stats.exit_code,
        "Stage finished"
    );
    Ok(stats)
}
