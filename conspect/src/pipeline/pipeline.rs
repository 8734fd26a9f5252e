//! Sequential pipeline executor.

use super::metrics::{PipelineMetrics, TaskMetrics};
use super::task::BoxedTask;
use conspect_shared::errors::ConspectResult;
use std::time::Instant;

pub struct ExecutionPlan<Ctx> {
    tasks: Vec<BoxedTask<Ctx>>,
}

impl<Ctx> ExecutionPlan<Ctx> {
    pub fn new(tasks: Vec<BoxedTask<Ctx>>) -> Self {
        Self { tasks }
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|task| task.name()).collect()
    }

    pub fn tasks(self) -> Vec<BoxedTask<Ctx>> {
        self.tasks
    }
}

/// Pipeline executor framework.
///
/// Provides the generic loop; the work itself lives in task implementations.
pub struct PipelineExecutor;

impl PipelineExecutor {
    /// Execute a plan.
    ///
    /// Tasks run strictly one after another with a clone of `ctx`. The first
    /// failing task aborts the plan and its error is returned.
    ///
    /// Generic over:
    /// - `Ctx`: Shared pipeline context (use interior mutability for writes)
    pub async fn execute<Ctx>(plan: ExecutionPlan<Ctx>, ctx: Ctx) -> ConspectResult<PipelineMetrics>
    where
        Ctx: Clone,
    {
        let total_start = Instant::now();
        let mut task_metrics = Vec::new();

        for task in plan.tasks() {
            let name = task.name().to_string();
            let task_start = Instant::now();
            tracing::info!(task = %name, "--- STAGE: {} ---", name);

            task.run(ctx.clone()).await?;

            let duration_ms = task_start.elapsed().as_millis();
            tracing::info!(task = %name, duration_ms, "--- STAGE DONE: {} ---", name);
            task_metrics.push(TaskMetrics { name, duration_ms });
        }

        Ok(PipelineMetrics {
            total_duration_ms: total_start.elapsed().as_millis(),
            tasks: task_metrics,
        })
    }
}
