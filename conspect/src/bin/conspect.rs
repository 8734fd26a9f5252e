//! `conspect` - run the pipeline over a directory of images.

use anyhow::Context;
use clap::Parser;
use conspect::{
    ConspectOptions, ConspectRuntime, FailurePolicy, RecognitionMode, RegionTarget,
    SelectionStrategy, init_logging,
};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "conspect", version, about = "Turn board and screen photos into a text report")]
struct Cli {
    /// JSON options file; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory with the source images.
    #[arg(long)]
    input_dir: Option<PathBuf>,

    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[arg(long)]
    report_dir: Option<PathBuf>,

    #[arg(long)]
    report_file: Option<String>,

    #[arg(long, value_enum)]
    target_class: Option<RegionTarget>,

    #[arg(long, value_enum)]
    target_strategy: Option<SelectionStrategy>,

    /// Reaction to detection failures (purge or preserve-as-failed).
    #[arg(long, value_enum)]
    detection_policy: Option<FailurePolicy>,

    /// Reaction to region-cut failures (ignore or preserve-as-failed).
    #[arg(long, value_enum)]
    region_cut_policy: Option<FailurePolicy>,

    /// Recognition engines: classical (0), neural (1) or both (2).
    #[arg(long, value_enum)]
    mode: Option<RecognitionMode>,

    /// Keep the existing cache instead of clearing it first.
    #[arg(long)]
    no_clear_before: bool,

    /// Clear the cache after the report is written.
    #[arg(long)]
    clear_after: bool,

    /// Also write logs to <DIR>/conspect.log.
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Print the effective options as JSON and exit.
    #[arg(long)]
    print_settings: bool,
}

impl Cli {
    fn into_options(self) -> anyhow::Result<(ConspectOptions, bool)> {
        let mut options = match &self.config {
            Some(path) => ConspectOptions::from_json_file(path)?,
            None => ConspectOptions::default(),
        };

        if let Some(dir) = self.input_dir {
            options.input_dir = dir;
        }
        if let Some(dir) = self.cache_dir {
            options.cache_dir = dir;
        }
        if let Some(dir) = self.report_dir {
            options.report_dir = dir;
        }
        if let Some(file) = self.report_file {
            options.report_file = file;
        }
        if let Some(target) = self.target_class {
            options.target_class = target;
        }
        if let Some(strategy) = self.target_strategy {
            options.target_strategy = strategy;
        }
        if let Some(policy) = self.detection_policy {
            options.detection_policy = policy;
        }
        if let Some(policy) = self.region_cut_policy {
            options.region_cut_policy = policy;
        }
        if let Some(mode) = self.mode {
            options.mode = mode;
        }
        if self.no_clear_before {
            options.clear_cache_before = false;
        }
        if self.clear_after {
            options.clear_cache_after = true;
        }
        if self.log_dir.is_some() {
            options.log_dir = self.log_dir;
        }

        Ok((options, self.print_settings))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let (options, print_settings) = Cli::parse().into_options()?;

    if print_settings {
        println!("{}", serde_json::to_string_pretty(&options)?);
        return Ok(());
    }

    let _guard = init_logging(options.log_dir.as_deref())?;

    let runtime = ConspectRuntime::new(options).context("invalid options")?;
    let summary = runtime.run().await.context("pipeline failed")?;

    for stage in &summary.stages {
        tracing::info!(
            stage = %stage.stage,
            items = stage.items,
            succeeded = stage.succeeded,
            failed = stage.failed,
            "Stage summary"
        );
    }
    if let Some(report) = &summary.report {
        println!("{}", report.display());
    }
    Ok(())
}
