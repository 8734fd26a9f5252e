//! Worker launch configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default time a worker gets to exit after answering `ext`.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// How to launch one worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSpec {
    /// Executable to run, e.g. `python3` or a worker binary.
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Extra environment variables for the worker.
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub shutdown_timeout_secs: u64,
}

impl Default for WorkerSpec {
    fn default() -> Self {
        Self {
            program: PathBuf::from("python3"),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl WorkerSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// A Python worker script run with `python3`.
    pub fn python(script: impl Into<String>) -> Self {
        Self::new("python3").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn shutdown_timeout_secs(mut self, secs: u64) -> Self {
        self.shutdown_timeout_secs = secs;
        self
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Command line for log messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_command_line() {
        let spec = WorkerSpec::python("class_cutter_worker.py")
            .arg("--device")
            .arg("cuda")
            .env("CUDA_VISIBLE_DEVICES", "0")
            .shutdown_timeout_secs(3);

        assert_eq!(spec.command_line(), "python3 class_cutter_worker.py --device cuda");
        assert_eq!(spec.shutdown_timeout(), Duration::from_secs(3));
        assert_eq!(spec.env.get("CUDA_VISIBLE_DEVICES").map(String::as_str), Some("0"));
    }

    #[test]
    fn test_deserialize_partial() {
        let spec: WorkerSpec =
            serde_json::from_str(r#"{"program": "/opt/w", "args": ["-v"]}"#).unwrap();
        assert_eq!(spec.program, PathBuf::from("/opt/w"));
        assert_eq!(spec.shutdown_timeout_secs, DEFAULT_SHUTDOWN_TIMEOUT_SECS);
    }
}
