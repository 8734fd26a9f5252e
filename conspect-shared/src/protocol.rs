//! Worker wire protocol.
//!
//! Newline-delimited JSON over a worker's stdin/stdout:
//!
//! ```text
//! host   → worker   {"id": 7, "op": "do", "payload": {...}}
//! worker → host     {"type": "result", "id": 7, "ok": true, "payload": {...}}
//! worker → host     {"type": "result", "id": 7, "ok": false, "error": "..."}
//! host   → worker   {"id": 8, "op": "ext"}
//! ```
//!
//! Every worker emits exactly one `started` event as its first line.

use crate::errors::ConspectResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    /// Process one payload.
    Do,
    /// Graceful shutdown.
    Ext,
    /// Anything a worker does not understand.
    #[serde(other)]
    Unknown,
}

/// Outbound request sent to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Option<u64>,
    pub op: Op,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Request {
    pub fn work(id: u64, payload: Value) -> Self {
        Self {
            id: Some(id),
            op: Op::Do,
            payload: Some(payload),
        }
    }

    pub fn shutdown(id: u64) -> Self {
        Self {
            id: Some(id),
            op: Op::Ext,
            payload: None,
        }
    }

    /// Serialize as a single protocol line, newline included.
    pub fn to_line(&self) -> ConspectResult<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Inbound event emitted by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerEvent {
    /// Handshake, first line of every worker.
    Started {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Answer to one request.
    Result(ResultEvent),
}

impl WorkerEvent {
    pub fn started(payload: Value) -> Self {
        WorkerEvent::Started {
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn start_failed(error: impl Into<String>) -> Self {
        WorkerEvent::Started {
            ok: false,
            payload: None,
            error: Some(error.into()),
        }
    }

    /// Serialize as a single protocol line, newline included.
    pub fn to_line(&self) -> ConspectResult<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Body of a `result` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEvent {
    /// `null` when the worker could not read the request id.
    #[serde(default)]
    pub id: Option<u64>,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultEvent {
    pub fn success(id: Option<u64>, payload: Value) -> Self {
        Self {
            id,
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failure(id: Option<u64>, error: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            payload: None,
            error: Some(error.into()),
        }
    }

    /// Payload on success, error message on failure.
    pub fn outcome(&self) -> Result<&Value, &str> {
        if self.ok {
            Ok(self.payload.as_ref().unwrap_or(&Value::Null))
        } else {
            Err(self.error.as_deref().unwrap_or("worker reported failure without a message"))
        }
    }
}

/// Classification of one line read from a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A protocol-legal event.
    Event(WorkerEvent),
    /// Valid JSON that is not a protocol event (diagnostics).
    Unrecognized(Value),
    /// Not JSON at all, e.g. a stderr traceback line.
    Malformed { line: String, reason: String },
}

/// Decode one (already trimmed) line from a worker.
pub fn decode_line(line: &str) -> Inbound {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            return Inbound::Malformed {
                line: line.to_string(),
                reason: e.to_string(),
            };
        }
    };

    match WorkerEvent::deserialize(&value) {
        Ok(event) => Inbound::Event(event),
        Err(_) => Inbound::Unrecognized(value),
    }
}
