use conspect_shared::errors::ConspectError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which recognition engines contribute to the report.
///
/// Serialized as the wire integer the extraction worker expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(try_from = "u8", into = "u8")]
pub enum RecognitionMode {
    /// Classical OCR (tesseract) only.
    #[default]
    #[value(alias = "0")]
    Classical,
    /// Neural OCR (easyocr) only.
    #[value(alias = "1")]
    Neural,
    /// Both engines, in separate report sections.
    #[value(alias = "2")]
    Both,
}

impl RecognitionMode {
    pub fn uses_classical(self) -> bool {
        matches!(self, RecognitionMode::Classical | RecognitionMode::Both)
    }

    pub fn uses_neural(self) -> bool {
        matches!(self, RecognitionMode::Neural | RecognitionMode::Both)
    }
}

impl TryFrom<u8> for RecognitionMode {
    type Error = ConspectError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RecognitionMode::Classical),
            1 => Ok(RecognitionMode::Neural),
            2 => Ok(RecognitionMode::Both),
            other => Err(ConspectError::Config(format!(
                "recognition mode must be 0, 1 or 2, got {other}"
            ))),
        }
    }
}

impl From<RecognitionMode> for u8 {
    fn from(mode: RecognitionMode) -> Self {
        match mode {
            RecognitionMode::Classical => 0,
            RecognitionMode::Neural => 1,
            RecognitionMode::Both => 2,
        }
    }
}

impl fmt::Display for RecognitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecognitionMode::Classical => "classical",
            RecognitionMode::Neural => "neural",
            RecognitionMode::Both => "both",
        };
        write!(f, "{name} ({})", u8::from(*self))
    }
}
