//! Pipeline driver and its configuration.

mod context;
mod core;
mod options;
mod tasks;

pub use context::{RunContext, RunCtx};
pub use self::core::{ConspectRuntime, RunSummary};
pub use options::{ConspectOptions, WorkerSpecs};
