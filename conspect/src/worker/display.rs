//! Event rendering for logs.

use conspect_shared::protocol::WorkerEvent;
use serde_json::Value;

/// Length above which logged text fields are elided.
pub const ELIDE_MAX_LEN: usize = 30;

/// Copy of `event` with the named payload string fields shortened:
/// newlines flattened, cut at `max_len` characters, `…` appended.
pub fn elide_event(event: &WorkerEvent, keys: &[String], max_len: usize) -> WorkerEvent {
    let mut event = event.clone();
    let payload = match &mut event {
        WorkerEvent::Started { payload, .. } => payload.as_mut(),
        WorkerEvent::Result(result) => result.payload.as_mut(),
    };

    if let Some(Value::Object(map)) = payload {
        for key in keys {
            if let Some(Value::String(text)) = map.get_mut(key)
                && text.chars().count() > max_len
            {
                *text = elide_text(text, max_len);
            }
        }
    }

    event
}

fn elide_text(text: &str, max_len: usize) -> String {
    let mut short: String = text.replace('\n', " ").chars().take(max_len).collect();
    short.push('…');
    short
}

/// Surface one event read from a worker.
pub(crate) fn log_event(worker: &str, event: &WorkerEvent, keys: &[String]) {
    let shown = elide_event(event, keys, ELIDE_MAX_LEN);
    let rendered = serde_json::to_string(&shown).unwrap_or_else(|_| format!("{:?}", shown));
    tracing::debug!(worker = %worker, event = %rendered, "Worker event");
}

#[cfg(test)]
mod tests {
    use super::*;
    use conspect_shared::protocol::ResultEvent;
    use serde_json::json;

    #[test]
    fn test_long_fields_elided() {
        let event = WorkerEvent::Result(ResultEvent::success(
            Some(4),
            json!({
                "tesseract_text": "line one of a long recognized text\nline two",
                "easyocr_text": "short",
                "path": "cache/a/class_cutter/1_0.jpg/and/more/segments",
            }),
        ));
        let keys = vec!["tesseract_text".to_string(), "easyocr_text".to_string()];

        let shown = elide_event(&event, &keys, ELIDE_MAX_LEN);
        let WorkerEvent::Result(result) = shown else {
            panic!("expected result");
        };
        let payload = result.payload.unwrap();

        assert_eq!(payload["tesseract_text"], json!("line one of a long recognized …"));
        assert_eq!(payload["easyocr_text"], json!("short"));
        assert_eq!(
            payload["path"],
            json!("cache/a/class_cutter/1_0.jpg/and/more/segments")
        );
    }

    #[test]
    fn test_original_event_untouched() {
        let event = WorkerEvent::started(json!({"name": "x".repeat(100)}));
        let keys = vec!["name".to_string()];
        let shown = elide_event(&event, &keys, 10);
        assert_ne!(shown, event);
        assert_eq!(event, WorkerEvent::started(json!({"name": "x".repeat(100)})));
    }
}
