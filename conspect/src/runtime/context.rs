//! State shared by the tasks of one run.

use super::options::ConspectOptions;
use crate::cache::ArtifactCache;
use crate::pipeline::StageStats;
use crate::stage::RequestIds;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

pub type RunCtx = Arc<RunContext>;

/// Run-wide context. Options and cache are immutable; stage outcomes are
/// appended as stages finish.
pub struct RunContext {
    pub options: ConspectOptions,
    pub cache: ArtifactCache,
    pub ids: RequestIds,
    stats: Mutex<Vec<StageStats>>,
    report: Mutex<Option<PathBuf>>,
}

impl RunContext {
    pub fn new(options: ConspectOptions) -> Self {
        let cache = ArtifactCache::new(&options.cache_dir);
        Self {
            options,
            cache,
            ids: RequestIds::new(),
            stats: Mutex::new(Vec::new()),
            report: Mutex::new(None),
        }
    }

    pub fn record_stage(&self, stats: StageStats) {
        self.stats.lock().push(stats);
    }

    pub fn stage_stats(&self) -> Vec<StageStats> {
        self.stats.lock().clone()
    }

    pub fn set_report(&self, path: PathBuf) {
        *self.report.lock() = Some(path);
    }

    pub fn report(&self) -> Option<PathBuf> {
        self.report.lock().clone()
    }
}
