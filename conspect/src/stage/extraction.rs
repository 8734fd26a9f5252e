//! Extraction stage: recognize text in each classified crop.

use super::{FailurePolicy, Stage};
use crate::cache::{
    ArtifactCache, CropArtifact, REGION_DIR, TEXT_DIR, file_name, item_stem, order_crops,
};
use crate::report::{RecognitionMode, ReportWriter};
use crate::worker::WorkerSpec;
use conspect_shared::errors::{ConspectError, ConspectResult};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

/// Result payload key of the classical OCR engine.
pub const CLASSICAL_TEXT_KEY: &str = "tesseract_text";
/// Result payload key of the neural OCR engine.
pub const NEURAL_TEXT_KEY: &str = "easyocr_text";

/// Text extraction over the region crops of each item.
///
/// Crops are submitted in reading order with `FAILED_` placeholders last.
/// Texts of one item are grouped in a single report block and also written
/// to `ocr/<crop stem>.txt`. Failures contribute no text.
pub struct ExtractionStage {
    spec: WorkerSpec,
    mode: RecognitionMode,
    report_path: PathBuf,
    writer: Option<ReportWriter>,
    written: Option<PathBuf>,
}

impl ExtractionStage {
    pub fn new(spec: WorkerSpec, mode: RecognitionMode, report_path: impl Into<PathBuf>) -> Self {
        Self {
            spec,
            mode,
            report_path: report_path.into(),
            writer: None,
            written: None,
        }
    }

    /// Path of the finished report, once the stage is done.
    pub fn report(&self) -> Option<&Path> {
        self.written.as_deref()
    }

    fn writer(&mut self) -> ConspectResult<&mut ReportWriter> {
        self.writer
            .as_mut()
            .ok_or_else(|| ConspectError::Internal("report writer is not open".into()))
    }

    fn text_artifact(&self, classical: Option<&str>, neural: Option<&str>) -> String {
        let mut parts = Vec::new();
        if self.mode.uses_classical()
            && let Some(text) = classical
        {
            parts.push(text.trim());
        }
        if self.mode.uses_neural()
            && let Some(text) = neural
        {
            parts.push(text.trim());
        }
        parts.retain(|p| !p.is_empty());
        parts.join("\n\n")
    }
}

impl Stage for ExtractionStage {
    fn name(&self) -> &str {
        "extraction"
    }

    fn worker_spec(&self) -> &WorkerSpec {
        &self.spec
    }

    fn elided_keys(&self) -> &[&'static str] {
        &[CLASSICAL_TEXT_KEY, NEURAL_TEXT_KEY]
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Ignore
    }

    fn on_start(&mut self) -> ConspectResult<()> {
        self.writer = Some(ReportWriter::open(&self.report_path, self.mode)?);
        Ok(())
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
        let region_dir = item_dir.join(REGION_DIR);
        if !region_dir.is_dir() {
            tracing::debug!(dir = %item_dir.display(), "No region crops for item");
            return Ok(Vec::new());
        }
        Ok(order_crops(cache.list_images(&region_dir)?)
            .into_iter()
            .map(|crop| crop.path)
            .collect())
    }

    fn payload(
        &mut self,
        _cache: &ArtifactCache,
        _item_dir: &Path,
        input: &Path,
    ) -> ConspectResult<Value> {
        Ok(json!({
            "image_path": input.display().to_string(),
            "mode": u8::from(self.mode),
        }))
    }

    fn on_success(
        &mut self,
        cache: &ArtifactCache,
        item_dir: &Path,
        input: &Path,
        payload: &Value,
    ) -> ConspectResult<()> {
        let classical = payload.get(CLASSICAL_TEXT_KEY).and_then(Value::as_str);
        let neural = payload.get(NEURAL_TEXT_KEY).and_then(Value::as_str);

        self.writer()?.add(classical, neural);

        let stem = match CropArtifact::parse(input) {
            Some(crop) => crop.stem().to_string(),
            None => item_stem(input)?,
        };
        let text_dir = cache.make_dir(Some(item_dir), TEXT_DIR)?;
        cache.write_text(&text_dir, &stem, &self.text_artifact(classical, neural))?;
        Ok(())
    }

    fn begin_item(&mut self, item_dir: &Path) -> ConspectResult<()> {
        let title = file_name(item_dir)?.to_string();
        self.writer()?.start_block(&title)
    }

    fn end_item(&mut self) -> ConspectResult<()> {
        self.writer()?.flush_block()
    }

    fn on_finish(&mut self) -> ConspectResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.end()?;
            let path = writer.close()?;
            tracing::info!(path = %path.display(), "Report written");
            self.written = Some(path);
        }
        Ok(())
    }
}
