//! Per-stage reaction to a worker failure.

use crate::cache::ArtifactCache;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// How a stage reacts when a worker answers `ok:false` for an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Leave the cache untouched; later stages find nothing new for the item.
    Ignore,
    /// Copy the input as `FAILED_<name>` so later stages get a placeholder.
    PreserveAsFailed,
    /// Delete the whole item directory, dropping the item from later stages.
    Purge,
}

/// What [`FailurePolicy::apply`] actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOutcome {
    Ignored,
    Preserved,
    Purged,
    /// The copy or delete itself failed; logged and otherwise ignored.
    Skipped,
}

impl FailurePolicy {
    /// Apply the policy for a failed `input` of the item at `item_dir`.
    ///
    /// `failure_dir` receives the `FAILED_` copy. Filesystem errors never
    /// propagate: a failure to preserve or purge must not abort the stage.
    pub fn apply(
        self,
        cache: &ArtifactCache,
        input: &Path,
        item_dir: &Path,
        failure_dir: &Path,
    ) -> PolicyOutcome {
        match self {
            FailurePolicy::Ignore => PolicyOutcome::Ignored,
            FailurePolicy::PreserveAsFailed => match cache.preserve_failed(input, failure_dir) {
                Ok(dest) => {
                    tracing::info!(path = %dest.display(), "Preserved failed input");
                    PolicyOutcome::Preserved
                }
                Err(e) => {
                    tracing::warn!(
                        input = %input.display(),
                        error = %e,
                        "Failed to preserve failed input"
                    );
                    PolicyOutcome::Skipped
                }
            },
            FailurePolicy::Purge => match cache.remove_dir(item_dir) {
                Ok(()) => {
                    tracing::info!(dir = %item_dir.display(), "Purged item directory");
                    PolicyOutcome::Purged
                }
                Err(e) => {
                    tracing::warn!(
                        dir = %item_dir.display(),
                        error = %e,
                        "Failed to purge item directory"
                    );
                    PolicyOutcome::Skipped
                }
            },
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailurePolicy::Ignore => "ignore",
            FailurePolicy::PreserveAsFailed => "preserve-as-failed",
            FailurePolicy::Purge => "purge",
        };
        f.write_str(name)
    }
}
