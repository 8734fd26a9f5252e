//! `conspect-sim-worker` - protocol-conformant stand-in for the model workers.
//!
//! Produces deterministic artifacts without any model, for dry runs and
//! integration tests. Extra flags inject failures and protocol noise.

use clap::{Parser, ValueEnum};
use conspect_shared::errors::{ConspectError, ConspectResult};
use conspect_shared::{WorkerService, serve};
use serde_json::{Value, json};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Role {
    Detection,
    RegionCut,
    Extraction,
    Echo,
}

#[derive(Debug, Parser)]
#[command(name = "conspect-sim-worker")]
struct Args {
    #[arg(long, value_enum)]
    role: Role,

    /// Region classes emitted by the region-cut role, in rank order.
    #[arg(long, value_delimiter = ',', default_value = "0,1")]
    classes: Vec<u32>,

    /// Extension of region-cut crops.
    #[arg(long, default_value = "png")]
    crop_ext: String,

    /// Fail every request whose image_path contains this substring.
    #[arg(long)]
    fail_on: Option<String>,

    /// Emit a stderr diagnostic and a stale result before each answer.
    #[arg(long)]
    noise: bool,

    /// Answer the handshake with ok:false.
    #[arg(long)]
    fail_start: bool,

    /// Exit without answering once this many requests were answered.
    #[arg(long)]
    die_after: Option<usize>,

    /// Stay alive this long after answering ext.
    #[arg(long, default_value_t = 0)]
    linger_ms: u64,
}

struct SimWorker {
    args: Args,
    handled: usize,
}

impl SimWorker {
    fn emit_noise(&self) {
        eprintln!("sim-worker: processing request {}", self.handled + 1);
        let _ = std::io::stderr().write_all(b"sim-worker: \xff\xfe native warning\n");
        println!("{}", json!({"type": "result", "id": 0, "ok": true, "payload": {"stale": true}}));
        println!("{}", json!({"type": "progress", "done": self.handled}));
    }

    fn detect(&self, payload: &Value) -> ConspectResult<Value> {
        let image = path_field(payload, "image_path")?;
        let out = path_field(payload, "out_path")?;
        let target = payload
            .get("target_class")
            .and_then(Value::as_u64)
            .ok_or_else(|| ConspectError::Worker("missing target_class".into()))?;
        fs::copy(&image, &out)?;
        Ok(json!({"warp_path": out.display().to_string(), "target_class": target}))
    }

    fn cut(&self, payload: &Value) -> ConspectResult<Value> {
        let image = path_field(payload, "image_path")?;
        let out_dir = path_field(payload, "out_dir")?;
        fs::create_dir_all(&out_dir)?;

        let mut paths = Vec::new();
        for (index, class) in self.args.classes.iter().enumerate() {
            let crop = out_dir.join(format!("{}_{}.{}", index + 1, class, self.args.crop_ext));
            fs::copy(&image, &crop)?;
            paths.push(crop.display().to_string());
        }
        if paths.is_empty() {
            return Err(ConspectError::Worker("no regions detected".into()));
        }
        Ok(json!({"img_paths": paths}))
    }

    fn extract(&self, payload: &Value) -> ConspectResult<Value> {
        let image = path_field(payload, "image_path")?;
        let mode = payload.get("mode").and_then(Value::as_u64).unwrap_or(0);
        let stem = image
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConspectError::Worker(format!("bad crop path {}", image.display())))?;

        let (rank, marker) = if stem.starts_with("FAILED_") {
            ("-", "FAILED")
        } else {
            let mut parts = stem.split('_');
            (parts.next().unwrap_or_default(), parts.next().unwrap_or_default())
        };
        if !matches!(marker, "0" | "1" | "FAILED") {
            return Err(ConspectError::Worker(format!(
                "unsupported class marker {marker:?} in {stem}"
            )));
        }

        let classical = format!("text {rank} class {marker}");
        let neural = format!("neural text {rank} class {marker}");
        match mode {
            0 => Ok(json!({"tesseract_text": classical, "easyocr_text": null})),
            1 => Ok(json!({"tesseract_text": null, "easyocr_text": neural})),
            2 => Ok(json!({"tesseract_text": classical, "easyocr_text": neural})),
            other => Err(ConspectError::Worker(format!("unsupported mode {other}"))),
        }
    }
}

impl WorkerService for SimWorker {
    fn on_start(&mut self) -> ConspectResult<Value> {
        if self.args.fail_start {
            return Err(ConspectError::Worker("model weights not found".into()));
        }
        Ok(json!({"role": format!("{:?}", self.args.role), "pid": std::process::id()}))
    }

    fn handle(&mut self, payload: Value) -> ConspectResult<Value> {
        if let Some(limit) = self.args.die_after
            && self.handled >= limit
        {
            let _ = std::io::stdout().flush();
            std::process::exit(3);
        }
        if self.args.noise {
            self.emit_noise();
        }
        self.handled += 1;

        if let Some(pattern) = &self.args.fail_on
            && payload
                .get("image_path")
                .and_then(Value::as_str)
                .is_some_and(|p| p.contains(pattern.as_str()))
        {
            return Err(ConspectError::Worker(format!("simulated failure on {pattern}")));
        }

        match self.args.role {
            Role::Detection => self.detect(&payload),
            Role::RegionCut => self.cut(&payload),
            Role::Extraction => self.extract(&payload),
            Role::Echo => Ok(json!({"echo": payload})),
        }
    }
}

fn path_field(payload: &Value, key: &str) -> ConspectResult<PathBuf> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(PathBuf::from)
        .ok_or_else(|| ConspectError::Worker(format!("missing {key}")))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let linger = Duration::from_millis(args.linger_ms);
    let mut worker = SimWorker { args, handled: 0 };

    let stdin = std::io::stdin();
    serve(&mut worker, stdin.lock(), std::io::stdout())?;

    if !linger.is_zero() {
        std::thread::sleep(linger);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(extra: &[&str]) -> SimWorker {
        let argv = std::iter::once("conspect-sim-worker").chain(extra.iter().copied());
        SimWorker {
            args: Args::parse_from(argv),
            handled: 0,
        }
    }

    #[test]
    fn test_extraction_texts_by_mode() {
        let mut w = worker(&["--role", "extraction"]);
        let out = w.handle(json!({"image_path": "/c/2_1.png", "mode": 2})).unwrap();
        assert_eq!(out["tesseract_text"], "text 2 class 1");
        assert_eq!(out["easyocr_text"], "neural text 2 class 1");

        let out = w.handle(json!({"image_path": "/c/FAILED_x.png", "mode": 0})).unwrap();
        assert_eq!(out["tesseract_text"], "text - class FAILED");
        assert!(out["easyocr_text"].is_null());
    }

    #[test]
    fn test_extraction_rejects_bad_input() {
        let mut w = worker(&["--role", "extraction"]);
        assert!(w.handle(json!({"image_path": "/c/1_4.png", "mode": 0})).is_err());
        assert!(w.handle(json!({"image_path": "/c/1_0.png", "mode": 7})).is_err());
    }

    #[test]
    fn test_region_cut_writes_ranked_crops() {
        let tmp = tempfile::TempDir::new().unwrap();
        let image = tmp.path().join("warped_a.jpg");
        fs::write(&image, b"img").unwrap();
        let out_dir = tmp.path().join("class_cutter");

        let mut w = worker(&["--role", "region-cut"]);
        let payload = json!({
            "image_path": image.display().to_string(),
            "out_dir": out_dir.display().to_string(),
        });
        let out = w.handle(payload).unwrap();

        assert_eq!(out["img_paths"].as_array().unwrap().len(), 2);
        assert!(out_dir.join("1_0.png").is_file());
        assert!(out_dir.join("2_1.png").is_file());
    }

    #[test]
    fn test_fail_on_pattern() {
        let mut w = worker(&["--role", "echo", "--fail-on", "bad"]);
        assert!(w.handle(json!({"image_path": "/x/bad.jpg"})).is_err());
        assert!(w.handle(json!({"image_path": "/x/good.jpg"})).is_ok());
    }
}
