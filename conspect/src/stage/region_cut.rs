//! Region-cut stage: split each detected region into classified crops.

use super::{FailurePolicy, Stage};
use crate::cache::{ArtifactCache, REGION_DIR};
use crate::worker::WorkerSpec;
use conspect_shared::errors::ConspectResult;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

/// Region cutting over item cache directories.
///
/// Submits the first image of each item directory, which is the detection
/// output (or its `FAILED_` placeholder). Crops land in `class_cutter/`.
pub struct RegionCutStage {
    spec: WorkerSpec,
    policy: FailurePolicy,
}

impl RegionCutStage {
    pub fn new(spec: WorkerSpec, policy: FailurePolicy) -> Self {
        Self { spec, policy }
    }
}

impl Stage for RegionCutStage {
    fn name(&self) -> &str {
        "region_cut"
    }

    fn worker_spec(&self) -> &WorkerSpec {
        &self.spec
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    fn item_dir(&mut self, _cache: &ArtifactCache, item: &Path) -> ConspectResult<PathBuf> {
        Ok(item.to_path_buf())
    }

    fn inputs(
        &mut self,
        cache: &ArtifactCache,
        _item: &Path,
        item_dir: &Path,
    ) -> ConspectResult<Vec<PathBuf>> {
        Ok(cache.list_images(item_dir)?.into_iter().take(1).collect())
    }

    fn payload(
        &mut self,
        cache: &ArtifactCache,
        item_dir: &Path,
        input: &Path,
    ) -> ConspectResult<Value> {
        let out_dir = cache.make_dir(Some(item_dir), REGION_DIR)?;
        Ok(json!({
            "image_path": input.display().to_string(),
            "out_dir": out_dir.display().to_string(),
        }))
    }

    fn failure_dir(&self, cache: &ArtifactCache, item_dir: &Path) -> ConspectResult<PathBuf> {
        cache.make_dir(Some(item_dir), REGION_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_first_image_and_output_dir() {
        let tmp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(tmp.path());
        let dir = cache.make_dir(None, "item").unwrap();
        fs::write(dir.join("warped_item.jpg"), b"a").unwrap();
        fs::write(dir.join("notes.txt"), b"b").unwrap();

        let mut stage = RegionCutStage::new(WorkerSpec::default(), FailurePolicy::Ignore);
        let inputs = stage.inputs(&cache, &dir, &dir).unwrap();
        assert_eq!(inputs, vec![dir.join("warped_item.jpg")]);

        let payload = stage.payload(&cache, &dir, &inputs[0]).unwrap();
        assert_eq!(payload["out_dir"], dir.join("class_cutter").display().to_string());
        assert!(dir.join("class_cutter").is_dir());
    }

    #[test]
    fn test_empty_item_has_no_inputs() {
        let tmp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(tmp.path());
        let dir = cache.make_dir(None, "empty").unwrap();

        let mut stage = RegionCutStage::new(WorkerSpec::default(), FailurePolicy::PreserveAsFailed);
        assert!(stage.inputs(&cache, &dir, &dir).unwrap().is_empty());
    }
}
