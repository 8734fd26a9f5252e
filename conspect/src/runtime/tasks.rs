//! Pipeline tasks of one run.
//!
//! ```text
//! cache_prepare → detection → region_cut → extraction → [cache_teardown]
//! ```
//!
//! Detection takes its queue from the input directory. Later stages take
//! theirs from the cache listing at the moment they start, so purged items
//! are gone by then.

use super::context::RunCtx;
use crate::pipeline::PipelineTask;
use crate::stage::{DetectionStage, ExtractionStage, RegionCutStage, run_stage};
use async_trait::async_trait;
use conspect_shared::errors::{ConspectError, ConspectResult};
use std::path::PathBuf;

fn task_start(ctx: &RunCtx, task_name: &str) {
    tracing::debug!(
        task = task_name,
        cache = %ctx.cache.root().display(),
        "Starting task"
    );
}

fn log_task_error(task_name: &str, error: &ConspectError) {
    tracing::error!(task = task_name, error = %error, "Task failed");
}

/// Items for the stages after detection.
fn cached_items(ctx: &RunCtx) -> ConspectResult<Vec<PathBuf>> {
    ctx.cache.list_dirs(None)
}

pub struct CachePrepareTask;

#[async_trait]
impl PipelineTask<RunCtx> for CachePrepareTask {
    async fn run(self: Box<Self>, ctx: RunCtx) -> ConspectResult<()> {
        let task_name = self.name();
        task_start(&ctx, task_name);

        let result = if ctx.options.clear_cache_before {
            ctx.cache.clear_root()
        } else {
            ctx.cache.ensure_root()
        };
        result.inspect_err(|e| log_task_error(task_name, e))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "cache_prepare"
    }
}

pub struct DetectionTask;

#[async_trait]
impl PipelineTask<RunCtx> for DetectionTask {
    async fn run(self: Box<Self>, ctx: RunCtx) -> ConspectResult<()> {
        let task_name = self.name();
        task_start(&ctx, task_name);

        let options = &ctx.options;
        let items = ctx
            .cache
            .list_images(&options.input_dir)
            .inspect_err(|e| log_task_error(task_name, e))?;
        if items.is_empty() {
            tracing::warn!(dir = %options.input_dir.display(), "No source images found");
        }

        let mut stage = DetectionStage::new(
            options.workers.detection.clone(),
            options.detection_policy,
            options.target_class,
            options.target_strategy,
        );
        let stats = run_stage(&mut stage, &ctx.cache, &ctx.ids, &items)
            .await
            .inspect_err(|e| log_task_error(task_name, e))?;
        ctx.record_stage(stats);
        Ok(())
    }

    fn name(&self) -> &str {
        "detection"
    }
}

pub struct RegionCutTask;

#[async_trait]
impl PipelineTask<RunCtx> for RegionCutTask {
    async fn run(self: Box<Self>, ctx: RunCtx) -> ConspectResult<()> {
        let task_name = self.name();
        task_start(&ctx, task_name);

        let items = cached_items(&ctx).inspect_err(|e| log_task_error(task_name, e))?;
        let mut stage = RegionCutStage::new(
            ctx.options.workers.region_cut.clone(),
            ctx.options.region_cut_policy,
        );
        let stats = run_stage(&mut stage, &ctx.cache, &ctx.ids, &items)
            .await
            .inspect_err(|e| log_task_error(task_name, e))?;
        ctx.record_stage(stats);
        Ok(())
    }

    fn name(&self) -> &str {
        "region_cut"
    }
}

pub struct ExtractionTask;

#[async_trait]
impl PipelineTask<RunCtx> for ExtractionTask {
    async fn run(self: Box<Self>, ctx: RunCtx) -> ConspectResult<()> {
        let task_name = self.name();
        task_start(&ctx, task_name);

        let items = cached_items(&ctx).inspect_err(|e| log_task_error(task_name, e))?;
        let mut stage = ExtractionStage::new(
            ctx.options.workers.extraction.clone(),
            ctx.options.mode,
            ctx.options.report_path(),
        );
        let stats = run_stage(&mut stage, &ctx.cache, &ctx.ids, &items)
            .await
            .inspect_err(|e| log_task_error(task_name, e))?;
        ctx.record_stage(stats);
        if let Some(path) = stage.report() {
            ctx.set_report(path.to_path_buf());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "extraction"
    }
}

pub struct CacheTeardownTask;

#[async_trait]
impl PipelineTask<RunCtx> for CacheTeardownTask {
    async fn run(self: Box<Self>, ctx: RunCtx) -> ConspectResult<()> {
        let task_name = self.name();
        task_start(&ctx, task_name);

        ctx.cache
            .clear_root()
            .inspect_err(|e| log_task_error(task_name, e))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "cache_teardown"
    }
}
