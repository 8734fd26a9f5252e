//! Worker process management.
//!
//! A worker is an external process speaking the newline-delimited JSON
//! protocol from `conspect_shared::protocol` over its stdin/stdout.
//!
//! ## Architecture
//!
//! - **WorkerSpec**: how to launch a worker (program, args, env, timeouts)
//! - **WorkerChannel**: one live worker; `start` / `request` / `stop`
//!
//! The channel is strictly one-in-flight: every `request` waits for the
//! `result` carrying its id before returning, so results are observed in
//! the order requests were issued.

mod channel;
mod display;
mod spawn;
mod spec;

pub use channel::{Shutdown, WorkerChannel};
pub use display::{ELIDE_MAX_LEN, elide_event};
pub use spec::WorkerSpec;
