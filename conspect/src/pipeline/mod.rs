//! Sequential pipeline execution framework.
//!
//! ## Architecture
//!
//! ```text
//! ExecutionPlan → Tasks
//!
//! - ExecutionPlan: ordered list of named tasks
//! - Task: one unit of work sharing a context with the others
//! - PipelineExecutor: runs tasks one after another, stops at the first error
//! ```
//!
//! Tasks never overlap: a task only starts after the previous one has fully
//! finished, including any worker shutdown it performs.
//!
//! ## Example
//!
//! ```ignore
//! use pipeline::{ExecutionPlan, PipelineExecutor};
//! use std::sync::Arc;
//!
//! let plan = ExecutionPlan::new(vec![Box::new(TaskA), Box::new(TaskB)]);
//! let metrics = PipelineExecutor::execute(plan, Arc::new(Context)).await?;
//! println!("pipeline took {}ms", metrics.total_duration_ms);
//! ```

mod metrics;
#[allow(clippy::module_inception)]
mod pipeline;
mod task;

pub use metrics::{PipelineMetrics, StageStats, TaskMetrics};
pub use pipeline::{ExecutionPlan, PipelineExecutor};
pub use task::{BoxedTask, PipelineTask};
