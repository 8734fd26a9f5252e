use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TaskMetrics {
    pub name: String,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineMetrics {
    pub total_duration_ms: u128,
    pub tasks: Vec<TaskMetrics>,
}

impl PipelineMetrics {
    pub fn task_duration_ms(&self, name: &str) -> Option<u128> {
        self.tasks
            .iter()
            .find(|task| task.name == name)
            .map(|task| task.duration_ms)
    }
}

/// Per-stage counters collected by the stage template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageStats {
    pub stage: String,
    /// Items taken from the queue.
    pub items: usize,
    /// `do` requests sent.
    pub requests: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items whose cache directory was deleted by the failure policy.
    pub purged: usize,
    /// Inputs copied as `FAILED_` placeholders by the failure policy.
    pub preserved: usize,
    /// Worker exit code after `ext`; `None` if killed or timed out.
    pub exit_code: Option<i32>,
    pub shutdown_timed_out: bool,
}

impl StageStats {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            ..Default::default()
        }
    }
}
