//! Aggregated text report.
//!
//! One block per item:
//!
//! ```text
//! ====================…
//! <item>
//!
//! {{tesseract}}
//!
//! <classical texts, blank-line separated>
//!
//! --------------------…
//!
//! {{easyocr}}
//!
//! <neural texts>
//!
//! ```
//!
//! In single-engine modes only the selected texts are written. The report
//! ends with one more `=` banner.

mod mode;

pub use mode::RecognitionMode;

use conspect_shared::errors::{ConspectError, ConspectResult};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub const BANNER: &str = "====================================================================================================";
pub const DIVIDER: &str = "----------------------------------------------------------------------------------------------------";

const CLASSICAL_LABEL: &str = "{{tesseract}}";
const NEURAL_LABEL: &str = "{{easyocr}}";

#[derive(Debug, Default)]
struct Block {
    classical: Vec<String>,
    neural: Vec<String>,
}

/// Streaming writer for the final report.
#[derive(Debug)]
pub struct ReportWriter {
    path: PathBuf,
    mode: RecognitionMode,
    out: BufWriter<File>,
    block: Option<Block>,
}

impl ReportWriter {
    /// Create (or truncate) the report file, creating its directory if needed.
    pub fn open(path: impl Into<PathBuf>, mode: RecognitionMode) -> ConspectResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                ConspectError::Report(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let file = File::create(&path).map_err(|e| {
            ConspectError::Report(format!("Failed to create {}: {}", path.display(), e))
        })?;
        tracing::info!(path = %path.display(), mode = %mode, "Report opened");

        Ok(Self {
            path,
            mode,
            out: BufWriter::new(file),
            block: None,
        })
    }

    /// Write the banner and title of a new block and reset its buffers.
    ///
    /// An unflushed previous block is discarded.
    pub fn start_block(&mut self, title: &str) -> ConspectResult<()> {
        self.write(&format!("{BANNER}\n{title}\n\n"))?;
        self.block = Some(Block::default());
        Ok(())
    }

    /// Buffer recognized text for the current block. Empty texts and texts
    /// of engines not selected by the mode are skipped.
    pub fn add(&mut self, classical: Option<&str>, neural: Option<&str>) {
        let Some(block) = self.block.as_mut() else {
            tracing::warn!(path = %self.path.display(), "Text added outside of a report block");
            return;
        };

        if self.mode.uses_classical()
            && let Some(text) = classical.filter(|t| !t.is_empty())
        {
            block.classical.push(text.to_string());
        }
        if self.mode.uses_neural()
            && let Some(text) = neural.filter(|t| !t.is_empty())
        {
            block.neural.push(text.to_string());
        }
    }

    /// Write the buffered texts of the current block.
    pub fn flush_block(&mut self) -> ConspectResult<()> {
        let Some(block) = self.block.take() else {
            return Ok(());
        };

        let rendered = match self.mode {
            RecognitionMode::Classical => format!("{}\n\n", join_texts(&block.classical)),
            RecognitionMode::Neural => format!("{}\n\n", join_texts(&block.neural)),
            RecognitionMode::Both => format!(
                "{CLASSICAL_LABEL}\n\n{}\n\n{DIVIDER}\n\n{NEURAL_LABEL}\n\n{}\n\n",
                join_texts(&block.classical),
                join_texts(&block.neural),
            ),
        };
        self.write(&rendered)
    }

    /// Write the closing banner, flushing a pending block first.
    pub fn end(&mut self) -> ConspectResult<()> {
        self.flush_block()?;
        self.write(&format!("{BANNER}\n"))
    }

    pub fn close(mut self) -> ConspectResult<PathBuf> {
        self.out.flush().map_err(|e| {
            ConspectError::Report(format!("Failed to flush {}: {}", self.path.display(), e))
        })?;
        Ok(self.path)
    }

    fn write(&mut self, text: &str) -> ConspectResult<()> {
        self.out.write_all(text.as_bytes()).map_err(|e| {
            ConspectError::Report(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

fn join_texts(texts: &[String]) -> String {
    texts.join("\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_report(mode: RecognitionMode, build: impl FnOnce(&mut ReportWriter)) -> String {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out").join("result.txt");
        let mut writer = ReportWriter::open(&path, mode).unwrap();
        build(&mut writer);
        writer.end().unwrap();
        let path = writer.close().unwrap();
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_both_engines_render_divided_sections() {
        let report = write_report(RecognitionMode::Both, |w| {
            w.start_block("board").unwrap();
            w.add(Some("alpha"), Some("ALPHA"));
            w.add(Some("beta"), Some("BETA"));
            w.flush_block().unwrap();
        });

        let expected = format!(
            "{BANNER}\nboard\n\n{{{{tesseract}}}}\n\nalpha\n\nbeta\n\n\
             {DIVIDER}\n\n{{{{easyocr}}}}\n\nALPHA\n\nBETA\n\n{BANNER}\n"
        );
        assert_eq!(report, expected);
    }

    #[test]
    fn test_single_engine_keeps_selected_text_only() {
        let report = write_report(RecognitionMode::Neural, |w| {
            w.start_block("a").unwrap();
            w.add(Some("classic"), Some("neural"));
            w.add(None, Some(""));
            w.flush_block().unwrap();
        });

        assert_eq!(report, format!("{BANNER}\na\n\nneural\n\n{BANNER}\n"));
    }

    #[test]
    fn test_empty_block_still_delimited() {
        let report = write_report(RecognitionMode::Both, |w| {
            w.start_block("empty").unwrap();
            w.flush_block().unwrap();
            w.start_block("next").unwrap();
            w.add(Some("x"), None);
        });

        let empty = format!("{BANNER}\nempty\n\n{{{{tesseract}}}}\n\n\n\n{DIVIDER}");
        assert!(report.starts_with(&empty));
        assert!(report.contains(&format!("{BANNER}\nnext\n\n{{{{tesseract}}}}\n\nx\n\n")));
        assert!(report.ends_with(&format!("\n\n{BANNER}\n")));
    }

    #[test]
    fn test_add_without_block_is_ignored() {
        let report = write_report(RecognitionMode::Classical, |w| {
            w.add(Some("lost"), None);
        });
        assert_eq!(report, format!("{BANNER}\n"));
    }
}
