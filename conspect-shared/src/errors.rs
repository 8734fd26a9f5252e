//! Error taxonomy for the conspect pipeline.

use thiserror::Error;

/// Result alias used across conspect crates.
pub type ConspectResult<T> = Result<T, ConspectError>;

/// Errors raised by the orchestrator.
///
/// Only [`ConspectError::Worker`] is recoverable: it carries an `ok:false`
/// result and is routed to the stage's failure policy. Everything else
/// terminates the current stage or the whole run.
#[derive(Debug, Error)]
pub enum ConspectError {
    /// Worker did not confirm readiness with a `started` event.
    #[error("worker startup failed: {0}")]
    Startup(String),

    /// Stream closed or channel misused mid-conversation.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Worker answered a request with `ok:false`.
    #[error("worker error: {0}")]
    Worker(String),

    /// Worker did not exit after the `ext` handshake.
    #[error("worker shutdown timed out: {0}")]
    ShutdownTimeout(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("report error: {0}")]
    Report(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}
