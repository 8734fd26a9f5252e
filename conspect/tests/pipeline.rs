//! End-to-end runs with simulated workers.

use conspect::report::{BANNER, DIVIDER};
use conspect::runtime::WorkerSpecs;
use conspect::stage::{DetectionStage, RequestIds, run_stage};
use conspect::{
    ArtifactCache, ConspectError, ConspectOptions, ConspectRuntime, FailurePolicy,
    RecognitionMode, RegionTarget, SelectionStrategy, WorkerSpec,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn sim(args: &[&str]) -> WorkerSpec {
    WorkerSpec::new(env!("CARGO_BIN_EXE_conspect-sim-worker")).args(args.iter().copied())
}

fn sim_workers() -> WorkerSpecs {
    WorkerSpecs {
        detection: sim(&["--role", "detection"]),
        region_cut: sim(&["--role", "region-cut"]),
        extraction: sim(&["--role", "extraction"]),
    }
}

fn options(tmp: &Path, images: &[&str]) -> ConspectOptions {
    let input_dir = tmp.join("images");
    fs::create_dir_all(&input_dir).unwrap();
    for name in images {
        fs::write(input_dir.join(name), b"fake image").unwrap();
    }
    ConspectOptions {
        input_dir,
        cache_dir: tmp.join("cache"),
        report_dir: tmp.join("out"),
        mode: RecognitionMode::Both,
        workers: sim_workers(),
        ..Default::default()
    }
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_single_item_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let options = options(tmp.path(), &["lecture.png"]);
    let cache = options.cache_dir.clone();

    let summary = ConspectRuntime::new(options).unwrap().run().await.unwrap();

    let item = cache.join("lecture");
    assert_eq!(file_names(&item), vec!["class_cutter", "ocr", "warped_lecture.png"]);
    assert_eq!(file_names(&item.join("class_cutter")), vec!["1_0.png", "2_1.png"]);
    assert_eq!(
        fs::read_to_string(item.join("ocr").join("2_1.txt")).unwrap(),
        "text 2 class 1\n\nneural text 2 class 1"
    );

    let report = fs::read_to_string(summary.report.as_ref().unwrap()).unwrap();
    let expected = format!(
        "{BANNER}\nlecture\n\n\
         {{{{tesseract}}}}\n\ntext 1 class 0\n\ntext 2 class 1\n\n\
         {DIVIDER}\n\n\
         {{{{easyocr}}}}\n\nneural text 1 class 0\n\nneural text 2 class 1\n\n\
         {BANNER}\n"
    );
    assert_eq!(report, expected);

    let extraction = summary.stage("extraction").unwrap();
    assert_eq!(extraction.requests, 2);
    assert_eq!(extraction.succeeded, 2);
    assert_eq!(extraction.exit_code, Some(0));
    for stage in ["cache_prepare", "detection", "region_cut", "extraction"] {
        assert!(summary.metrics.task_duration_ms(stage).is_some(), "{stage}");
    }
}

#[tokio::test]
async fn test_purged_item_skips_later_stages() {
    let tmp = TempDir::new().unwrap();
    let mut options = options(tmp.path(), &["alpha.jpg", "beta.jpg"]);
    options.detection_policy = FailurePolicy::Purge;
    options.workers.detection = sim(&["--role", "detection", "--fail-on", "alpha"]);
    let cache = options.cache_dir.clone();

    let summary = ConspectRuntime::new(options).unwrap().run().await.unwrap();

    assert!(!cache.join("alpha").exists());
    let detection = summary.stage("detection").unwrap();
    assert_eq!((detection.items, detection.failed, detection.purged), (2, 1, 1));
    assert_eq!(summary.stage("region_cut").unwrap().items, 1);

    let report = fs::read_to_string(summary.report.unwrap()).unwrap();
    assert!(report.contains("\nbeta\n"));
    assert!(!report.contains("alpha"));
}

#[tokio::test]
async fn test_preserved_detection_failure_leaves_placeholder() {
    let tmp = TempDir::new().unwrap();
    let options = options(tmp.path(), &["alpha.jpg"]);
    let cache = ArtifactCache::new(&options.cache_dir);
    cache.clear_root().unwrap();

    let mut stage = DetectionStage::new(
        sim(&["--role", "detection", "--fail-on", "alpha"]),
        FailurePolicy::PreserveAsFailed,
        RegionTarget::Whiteboard,
        SelectionStrategy::Confidence,
    );
    let items: Vec<PathBuf> = vec![options.input_dir.join("alpha.jpg")];
    let ids = RequestIds::new();

    let stats = run_stage(&mut stage, &cache, &ids, &items).await.unwrap();

    assert_eq!(file_names(&cache.root().join("alpha")), vec!["FAILED_alpha.jpg"]);
    assert_eq!(stats.preserved, 1);
    assert_eq!(stats.exit_code, Some(0));
    // one `do` plus the `ext`
    assert_eq!(ids.peek(), 3);
}

#[tokio::test]
async fn test_failed_placeholders_reach_the_report() {
    let tmp = TempDir::new().unwrap();
    let mut options = options(tmp.path(), &["alpha.jpg"]);
    options.mode = RecognitionMode::Classical;
    options.region_cut_policy = FailurePolicy::PreserveAsFailed;
    options.workers.detection = sim(&["--role", "detection", "--fail-on", "alpha"]);
    options.workers.region_cut = sim(&["--role", "region-cut", "--fail-on", "FAILED"]);
    let cache = options.cache_dir.clone();

    let summary = ConspectRuntime::new(options).unwrap().run().await.unwrap();

    assert_eq!(
        file_names(&cache.join("alpha").join("class_cutter")),
        vec!["FAILED_FAILED_alpha.jpg"]
    );
    let report = fs::read_to_string(summary.report.unwrap()).unwrap();
    assert_eq!(report, format!("{BANNER}\nalpha\n\ntext - class FAILED\n\n{BANNER}\n"));
}

#[tokio::test]
async fn test_extraction_failure_contributes_no_text() {
    let tmp = TempDir::new().unwrap();
    let mut options = options(tmp.path(), &["board.png"]);
    options.mode = RecognitionMode::Neural;
    options.workers.extraction = sim(&["--role", "extraction", "--fail-on", "1_0"]);

    let summary = ConspectRuntime::new(options).unwrap().run().await.unwrap();

    let extraction = summary.stage("extraction").unwrap();
    assert_eq!((extraction.succeeded, extraction.failed), (1, 1));
    let report = fs::read_to_string(summary.report.unwrap()).unwrap();
    assert_eq!(report, format!("{BANNER}\nboard\n\nneural text 2 class 1\n\n{BANNER}\n"));
}

#[tokio::test]
async fn test_cache_cleared_after_run() {
    let tmp = TempDir::new().unwrap();
    let mut options = options(tmp.path(), &["board.png"]);
    options.clear_cache_after = true;
    let cache = options.cache_dir.clone();

    let summary = ConspectRuntime::new(options).unwrap().run().await.unwrap();

    assert!(summary.metrics.task_duration_ms("cache_teardown").is_some());
    assert!(file_names(&cache).is_empty());
    assert!(summary.report.unwrap().is_file());
}

#[tokio::test]
async fn test_missing_input_dir_aborts() {
    let tmp = TempDir::new().unwrap();
    let mut options = options(tmp.path(), &[]);
    options.input_dir = tmp.path().join("nowhere");

    let err = ConspectRuntime::new(options).unwrap().run().await.unwrap_err();
    assert!(matches!(err, ConspectError::NotADirectory(_)), "{err}");
}

#[tokio::test]
async fn test_worker_startup_failure_aborts() {
    let tmp = TempDir::new().unwrap();
    let mut options = options(tmp.path(), &["board.png"]);
    options.workers.region_cut = sim(&["--role", "region-cut", "--fail-start"]);

    let err = ConspectRuntime::new(options).unwrap().run().await.unwrap_err();
    assert!(matches!(err, ConspectError::Startup(_)), "{err}");
}

#[tokio::test]
async fn test_shutdown_timeout_does_not_abort_run() {
    let tmp = TempDir::new().unwrap();
    let mut options = options(tmp.path(), &["board.png"]);
    options.workers.detection =
        sim(&["--role", "detection", "--linger-ms", "3000"]).shutdown_timeout_secs(1);

    let summary = ConspectRuntime::new(options).unwrap().run().await.unwrap();

    let detection = summary.stage("detection").unwrap();
    assert!(detection.shutdown_timed_out);
    assert_eq!(detection.exit_code, None);
    assert_eq!(detection.succeeded, 1);

    let region_cut = summary.stage("region_cut").unwrap();
    assert_eq!((region_cut.items, region_cut.succeeded), (1, 1));
    assert!(!region_cut.shutdown_timed_out);

    let extraction = summary.stage("extraction").unwrap();
    assert_eq!(extraction.succeeded, 2);
    let report = fs::read_to_string(summary.report.unwrap()).unwrap();
    assert!(report.contains("\nboard\n"));
}
