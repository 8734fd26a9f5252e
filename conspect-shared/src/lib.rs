//! Types shared between the conspect orchestrator and its workers.
//!
//! - [`errors`]: the error taxonomy used across the pipeline
//! - [`protocol`]: newline-delimited JSON requests and events
//! - [`service`]: worker-side serve loop for workers written in Rust

pub mod errors;
pub mod protocol;
pub mod service;

pub use errors::{ConspectError, ConspectResult};
pub use protocol::{Inbound, Op, Request, ResultEvent, WorkerEvent, decode_line};
pub use service::{WorkerService, serve};
