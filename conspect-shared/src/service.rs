//! Worker-side serve loop.
//!
//! Implement [`WorkerService`] and hand it to [`serve`] together with the
//! process stdin/stdout to get a protocol-conformant worker:
//!
//! ```ignore
//! let stdin = std::io::stdin();
//! serve(&mut MyWorker::default(), stdin.lock(), std::io::stdout())?;
//! ```

use crate::errors::ConspectResult;
use crate::protocol::{Op, Request, ResultEvent, WorkerEvent};
use serde_json::{Value, json};
use std::io::{BufRead, Write};

/// Behaviour of one worker process.
pub trait WorkerService {
    /// Load models etc. The returned value becomes the `started` payload.
    fn on_start(&mut self) -> ConspectResult<Value> {
        Ok(json!({}))
    }

    /// Process one `do` payload.
    fn handle(&mut self, payload: Value) -> ConspectResult<Value>;

    /// Payload of the `ext` answer.
    fn on_shutdown(&mut self) -> Value {
        json!({"bye": true})
    }
}

/// Run the request loop until `ext` or end of input.
///
/// A failing `on_start` is reported with `ok:false` and the loop returns
/// without reading any request.
pub fn serve<S, R, W>(service: &mut S, input: R, mut output: W) -> std::io::Result<()>
where
    S: WorkerService + ?Sized,
    R: BufRead,
    W: Write,
{
    match service.on_start() {
        Ok(payload) => send(&mut output, &WorkerEvent::started(payload))?,
        Err(e) => {
            send(&mut output, &WorkerEvent::start_failed(e.to_string()))?;
            return Ok(());
        }
    }

    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(_) => {
                send_result(&mut output, ResultEvent::failure(None, "bad_json"))?;
                continue;
            }
        };

        match request.op {
            Op::Ext => {
                let payload = service.on_shutdown();
                send_result(&mut output, ResultEvent::success(request.id, payload))?;
                return Ok(());
            }
            Op::Do => {
                let payload = request.payload.unwrap_or(Value::Null);
                let result = match service.handle(payload) {
                    Ok(out) => ResultEvent::success(request.id, out),
                    Err(e) => ResultEvent::failure(request.id, e.to_string()),
                };
                send_result(&mut output, result)?;
            }
            Op::Unknown => {
                send_result(&mut output, ResultEvent::failure(request.id, "unknown op"))?;
            }
        }
    }

    Ok(())
}

fn send_result<W: Write>(output: &mut W, result: ResultEvent) -> std::io::Result<()> {
    send(output, &WorkerEvent::Result(result))
}

fn send<W: Write>(output: &mut W, event: &WorkerEvent) -> std::io::Result<()> {
    let line = event.to_line().map_err(std::io::Error::other)?;
    output.write_all(line.as_bytes())?;
    output.flush()
}
