//! Detection stage: locate the target region in each source image.

use super::{FailurePolicy, Stage};
use crate::cache::{ArtifactCache, DETECTION_PREFIX, file_name, item_stem};
use crate::worker::WorkerSpec;
use conspect_shared::errors::ConspectResult;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

/// Region class the detection model should keep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RegionTarget {
    #[default]
    #[value(alias = "0")]
    Screen,
    #[value(alias = "1")]
    Whiteboard,
}

impl RegionTarget {
    pub fn class_id(self) -> u8 {
        match self {
            RegionTarget::Screen => 0,
            RegionTarget::Whiteboard => 1,
        }
    }
}

/// How the detection model picks among several candidate regions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum SelectionStrategy {
    /// Highest confidence.
    #[default]
    #[serde(rename = "conf")]
    #[value(name = "conf", alias = "by-confidence")]
    Confidence,
    /// Largest area.
    #[serde(rename = "size")]
    #[value(name = "size", alias = "by-size")]
    Size,
}

impl SelectionStrategy {
    pub fn as_wire(self) -> &'static str {
        match self {
            SelectionStrategy::Confidence => "conf",
            SelectionStrategy::Size => "size",
        }
    }
}

/// Detection over the original source images; one cache directory per item.
pub struct DetectionStage {
    spec: WorkerSpec,
    policy: FailurePolicy,
    target: RegionTarget,
    strategy: SelectionStrategy,
}

impl DetectionStage {
    pub fn new(
        spec: WorkerSpec,
        policy: FailurePolicy,
        target: RegionTarget,
        strategy: SelectionStrategy,
    ) -> Self {
        Self {
            spec,
            policy,
            target,
            strategy,
        }
    }
}

impl Stage for DetectionStage {
    fn name(&self) -> &str {
        "detection"
    }

    fn worker_spec(&self) -> &WorkerSpec {
        &self.spec
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    fn item_dir(&mut self, cache: &ArtifactCache, item: &Path) -> ConspectResult<PathBuf> {
        cache.make_dir(None, &item_stem(item)?)
    }

    fn inputs(
        &mut self,
        _cache: &ArtifactCache,
        item: &Path,
        _item_dir: &Path,
    ) -> ConspectResult<Vec<PathBuf>> {
        Ok(vec![item.to_path_buf()])
    }

    fn payload(
        &mut self,
        _cache: &ArtifactCache,
        item_dir: &Path,
        input: &Path,
    ) -> ConspectResult<Value> {
        let out_path = item_dir.join(format!("{DETECTION_PREFIX}{}", file_name(input)?));
        Ok(json!({
            "image_path": input.display().to_string(),
            "out_path": out_path.display().to_string(),
            "target_class": self.target.class_id(),
            "target_strategy": self.strategy.as_wire(),
        }))
    }
}
