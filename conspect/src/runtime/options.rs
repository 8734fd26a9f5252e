//! Run configuration.

use crate::report::RecognitionMode;
use crate::stage::{FailurePolicy, RegionTarget, SelectionStrategy};
use crate::worker::WorkerSpec;
use conspect_shared::errors::{ConspectError, ConspectResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Launch specs of the three stage workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSpecs {
    pub detection: WorkerSpec,
    pub region_cut: WorkerSpec,
    pub extraction: WorkerSpec,
}

impl Default for WorkerSpecs {
    fn default() -> Self {
        Self {
            detection: WorkerSpec::python("workers/detection_worker.py"),
            region_cut: WorkerSpec::python("workers/region_cut_worker.py"),
            extraction: WorkerSpec::python("workers/extraction_worker.py"),
        }
    }
}

/// Immutable configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConspectOptions {
    /// Directory with the source images.
    pub input_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub report_dir: PathBuf,
    pub report_file: String,
    pub target_class: RegionTarget,
    pub target_strategy: SelectionStrategy,
    /// Reaction to detection failures: `purge` or `preserve-as-failed`.
    pub detection_policy: FailurePolicy,
    /// Reaction to region-cut failures: `ignore` or `preserve-as-failed`.
    pub region_cut_policy: FailurePolicy,
    pub mode: RecognitionMode,
    pub clear_cache_before: bool,
    pub clear_cache_after: bool,
    /// Also write logs to `<log_dir>/conspect.log`.
    pub log_dir: Option<PathBuf>,
    pub workers: WorkerSpecs,
}

impl Default for ConspectOptions {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("images"),
            cache_dir: PathBuf::from("cache"),
            report_dir: PathBuf::from("."),
            report_file: "result.txt".to_string(),
            target_class: RegionTarget::default(),
            target_strategy: SelectionStrategy::default(),
            detection_policy: FailurePolicy::PreserveAsFailed,
            region_cut_policy: FailurePolicy::Ignore,
            mode: RecognitionMode::default(),
            clear_cache_before: true,
            clear_cache_after: false,
            log_dir: None,
            workers: WorkerSpecs::default(),
        }
    }
}

impl ConspectOptions {
    /// Load options from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> ConspectResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConspectError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ConspectError::Config(format!("Invalid config {}: {}", path.display(), e))
        })
    }

    /// Reject option combinations the stages cannot honor.
    pub fn sanitize(&self) -> ConspectResult<()> {
        if self.detection_policy == FailurePolicy::Ignore {
            return Err(ConspectError::Config(
                "detection_policy must be purge or preserve-as-failed".into(),
            ));
        }
        if self.region_cut_policy == FailurePolicy::Purge {
            return Err(ConspectError::Config(
                "region_cut_policy must be ignore or preserve-as-failed".into(),
            ));
        }
        if self.report_file.trim().is_empty() {
            return Err(ConspectError::Config("report_file must not be empty".into()));
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConspectError::Config("cache_dir must not be empty".into()));
        }

        for (stage, spec) in [
            ("detection", &self.workers.detection),
            ("region_cut", &self.workers.region_cut),
            ("extraction", &self.workers.extraction),
        ] {
            if spec.program.as_os_str().is_empty() {
                return Err(ConspectError::Config(format!(
                    "{stage} worker program must not be empty"
                )));
            }
            if spec.shutdown_timeout_secs == 0 {
                return Err(ConspectError::Config(format!(
                    "{stage} worker shutdown timeout must be positive"
                )));
            }
        }
        Ok(())
    }

    pub fn report_path(&self) -> PathBuf {
        self.report_dir.join(&self.report_file)
    }

    /// Log the effective settings once at run start.
    pub fn log_summary(&self) {
        tracing::info!(
            input_dir = %self.input_dir.display(),
            cache_dir = %self.cache_dir.display(),
            report = %self.report_path().display(),
            target_class = ?self.target_class,
            target_strategy = self.target_strategy.as_wire(),
            detection_policy = %self.detection_policy,
            region_cut_policy = %self.region_cut_policy,
            mode = %self.mode,
            clear_cache_before = self.clear_cache_before,
            clear_cache_after = self.clear_cache_after,
            "Pipeline settings"
        );
        tracing::debug!(
            detection = %self.workers.detection.command_line(),
            region_cut = %self.workers.region_cut.command_line(),
            extraction = %self.workers.extraction.command_line(),
            "Worker commands"
        );
    }
}
