//! Pipeline orchestration engine.
//!
//! Turns a directory of photographed boards and screens into one text report
//! by routing every image through three external workers (detection, region
//! cut, text extraction). Stages talk to workers over newline-delimited JSON
//! and hand artifacts to each other through an on-disk cache.

pub mod cache;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod runtime;
pub mod stage;
pub mod worker;

pub use cache::ArtifactCache;
pub use conspect_shared::errors::{ConspectError, ConspectResult};
pub use logging::init_logging;
pub use report::{RecognitionMode, ReportWriter};
pub use runtime::{ConspectOptions, ConspectRuntime, RunSummary, WorkerSpecs};
pub use stage::{FailurePolicy, RegionTarget, SelectionStrategy};
pub use worker::{WorkerChannel, WorkerSpec};
