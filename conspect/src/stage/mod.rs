//! Stage template and its variants.
//!
//! ## Architecture
//!
//! ```text
//! run_stage(stage, items)
//!   start worker → on_start
//!   for item:
//!     item_dir → inputs → begin_item
//!     for input: payload → request(do) → on_success | failure policy
//!     end_item
//!   on_finish → stop worker (ext)
//! ```
//!
//! Every stage gets the same one-in-flight request discipline and the same
//! shutdown handshake. Variants only fill in the [`Stage`] hooks.

mod detection;
mod extraction;
mod policy;
mod region_cut;
mod template;

pub use detection::{DetectionStage, RegionTarget, SelectionStrategy};
pub use extraction::{CLASSICAL_TEXT_KEY, ExtractionStage, NEURAL_TEXT_KEY};
pub use policy::{FailurePolicy, PolicyOutcome};
pub use region_cut::RegionCutStage;
pub use template::{RequestIds, run_stage};

use crate::cache::ArtifactCache;
use crate::worker::WorkerSpec;
use conspect_shared::errors::ConspectResult;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Customization points of the stage template.
///
/// `item` is whatever the stage queue holds: a source image for detection,
/// an item cache directory for later stages.
pub trait Stage: Send {
    /// Stage name, also used as the worker name in logs.
    fn name(&self) -> &str;

    fn worker_spec(&self) -> &WorkerSpec;

    /// Result payload fields shortened in event logs.
    fn elided_keys(&self) -> &[&'static str] {
        &[]
    }

    fn failure_policy(&self) -> FailurePolicy;

    /// Runs once, after the worker confirmed readiness.
    fn on_start(&mut self) -> ConspectResult<()> {
        Ok(())
    }

    /// Resolve (or create) the cache directory of `item`.
    fn item_dir(&mut self, cache: &ArtifactCache, item: &Path) -> ConspectResult<PathBuf>;

    /// Images to submit for `item`, in submission order.
    fn inputs(
        &mut self,
        cache: &ArtifactCache,
        item: &Path,
        item_dir: &Path,
    ) -> ConspectResult<Vec<PathBuf>>;

    fn payload(
        &mut self,
        cache: &ArtifactCache,
        item_dir: &Path,
        input: &Path,
    ) -> ConspectResult<Value>;

    /// Directory receiving `FAILED_` copies under the preserve policy.
    fn failure_dir(&self, _cache: &ArtifactCache, item_dir: &Path) -> ConspectResult<PathBuf> {
        Ok(item_dir.to_path_buf())
    }

    fn on_success(
        &mut self,
        _cache: &ArtifactCache,
        _item_dir: &Path,
        _input: &Path,
        _payload: &Value,
    ) -> ConspectResult<()> {
        Ok(())
    }

    fn begin_item(&mut self, _item_dir: &Path) -> ConspectResult<()> {
        Ok(())
    }

    fn end_item(&mut self) -> ConspectResult<()> {
        Ok(())
    }

    /// Runs once, before the worker is asked to exit.
    fn on_finish(&mut self) -> ConspectResult<()> {
        Ok(())
    }
}
