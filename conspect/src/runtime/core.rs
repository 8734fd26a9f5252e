//! Pipeline driver.

use super::context::{RunContext, RunCtx};
use super::options::ConspectOptions;
use super::tasks::{
    CachePrepareTask, CacheTeardownTask, DetectionTask, ExtractionTask, RegionCutTask,
};
use crate::pipeline::{BoxedTask, ExecutionPlan, PipelineExecutor, PipelineMetrics, StageStats};
use chrono::{DateTime, Utc};
use conspect_shared::errors::ConspectResult;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub metrics: PipelineMetrics,
    pub stages: Vec<StageStats>,
    pub report: Option<PathBuf>,
}

impl RunSummary {
    pub fn stage(&self, name: &str) -> Option<&StageStats> {
        self.stages.iter().find(|s| s.stage == name)
    }
}

/// Sequences detection, region cut and extraction over the artifact cache.
///
/// # Example
///
/// ```ignore
/// let runtime = ConspectRuntime::new(ConspectOptions::default())?;
/// let summary = runtime.run().await?;
/// println!("report: {:?}", summary.report);
/// ```
pub struct ConspectRuntime {
    options: ConspectOptions,
}

impl ConspectRuntime {
    /// Validates the options; nothing is touched on disk yet.
    pub fn new(options: ConspectOptions) -> ConspectResult<Self> {
        options.sanitize()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &ConspectOptions {
        &self.options
    }

    fn execution_plan(&self) -> ExecutionPlan<RunCtx> {
        let mut tasks: Vec<BoxedTask<RunCtx>> = vec![
            Box::new(CachePrepareTask),
            Box::new(DetectionTask),
            Box::new(RegionCutTask),
            Box::new(ExtractionTask),
        ];
        if self.options.clear_cache_after {
            tasks.push(Box::new(CacheTeardownTask));
        }
        ExecutionPlan::new(tasks)
    }

    /// Run the whole pipeline once.
    ///
    /// Stops at the first fatal error (startup, protocol, cache, report).
    /// Per-item worker failures are handled by the stage failure policies
    /// and show up in the stage stats instead.
    pub async fn run(&self) -> ConspectResult<RunSummary> {
        let started_at = Utc::now();
        self.options.log_summary();

        let plan = self.execution_plan();
        tracing::debug!(tasks = ?plan.task_names(), "Execution plan");

        let ctx: RunCtx = Arc::new(RunContext::new(self.options.clone()));
        let metrics = PipelineExecutor::execute(plan, Arc::clone(&ctx)).await?;

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            metrics,
            stages: ctx.stage_stats(),
            report: ctx.report(),
        };
        tracing::info!(
            duration_ms = summary.metrics.total_duration_ms,
            requests = ctx.ids.peek() - 1,
            report = ?summary.report,
            "Pipeline finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_follows_teardown_option() {
        let runtime = ConspectRuntime::new(ConspectOptions::default()).unwrap();
        assert_eq!(
            runtime.execution_plan().task_names(),
            vec!["cache_prepare", "detection", "region_cut", "extraction"]
        );

        let runtime = ConspectRuntime::new(ConspectOptions {
            clear_cache_after: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            runtime.execution_plan().task_names().last(),
            Some(&"cache_teardown")
        );
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = ConspectOptions {
            report_file: String::new(),
            ..Default::default()
        };
        assert!(ConspectRuntime::new(options).is_err());
    }
}
