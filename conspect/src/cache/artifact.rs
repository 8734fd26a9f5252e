//! Artifact naming contract shared with external workers.
//!
//! Region crops are named `<rank>_<class>.<ext>`; placeholders for failed
//! inputs are named `FAILED_<original name>`. Names are parsed once into
//! [`CropArtifact`] right after listing.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Image extensions recognized by the cache (case-insensitive).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Extension of extraction text artifacts.
pub const TEXT_EXTENSION: &str = "txt";

/// Prefix of inputs preserved after a worker failure.
pub const FAILED_PREFIX: &str = "FAILED_";

const FAILED_MARKER: &str = "FAILED";

/// Prefix of the detection output image inside an item directory.
pub const DETECTION_PREFIX: &str = "warped_";

/// Region-cut output subdirectory.
pub const REGION_DIR: &str = "class_cutter";

/// Extraction text subdirectory.
pub const TEXT_DIR: &str = "ocr";

/// Region type assigned by the region-cut model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionClass {
    /// Printed body text (class 0).
    Text,
    /// Handwritten text (class 1).
    Handwritten,
    /// Formula, scheme, image, graph, table, ...
    Other(u32),
}

impl RegionClass {
    pub fn from_id(id: u32) -> Self {
        match id {
            0 => RegionClass::Text,
            1 => RegionClass::Handwritten,
            other => RegionClass::Other(other),
        }
    }

    pub fn id(self) -> u32 {
        match self {
            RegionClass::Text => 0,
            RegionClass::Handwritten => 1,
            RegionClass::Other(id) => id,
        }
    }
}

/// Second segment of a crop name: a region class or the failure marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CropMarker {
    Class(RegionClass),
    Failed,
}

impl CropMarker {
    pub fn parse(segment: &str) -> Option<Self> {
        if segment == FAILED_MARKER {
            return Some(CropMarker::Failed);
        }
        segment
            .parse::<u32>()
            .ok()
            .map(|id| CropMarker::Class(RegionClass::from_id(id)))
    }

    /// Wire form, as it appears in file names.
    pub fn as_wire(&self) -> String {
        match self {
            CropMarker::Class(class) => class.id().to_string(),
            CropMarker::Failed => FAILED_MARKER.to_string(),
        }
    }
}

/// A region crop on disk with its name decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropArtifact {
    pub path: PathBuf,
    /// 1-based reading-order rank; `None` for `FAILED_` placeholders.
    pub rank: Option<u32>,
    pub marker: CropMarker,
}

impl CropArtifact {
    /// Decode a crop file name. Returns `None` when the name follows neither
    /// `<rank>_<marker>` nor `FAILED_<name>`.
    pub fn parse(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;

        if stem == FAILED_MARKER || stem.starts_with(FAILED_PREFIX) {
            return Some(Self {
                path: path.to_path_buf(),
                rank: None,
                marker: CropMarker::Failed,
            });
        }

        let mut parts = stem.split('_');
        let rank = parts.next()?.parse::<u32>().ok()?;
        let marker = CropMarker::parse(parts.next()?)?;
        Some(Self {
            path: path.to_path_buf(),
            rank: Some(rank),
            marker,
        })
    }

    pub fn is_failed(&self) -> bool {
        self.marker == CropMarker::Failed
    }

    /// Whether extraction accepts this crop: text, handwriting, or a failed placeholder.
    pub fn is_recognizable(&self) -> bool {
        matches!(
            self.marker,
            CropMarker::Failed | CropMarker::Class(RegionClass::Text | RegionClass::Handwritten)
        )
    }

    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }

    fn reading_order(&self, other: &Self) -> Ordering {
        let rank_order = match (self.rank, other.rank) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        self.is_failed()
            .cmp(&other.is_failed())
            .then(rank_order)
            .then_with(|| self.path.cmp(&other.path))
    }
}

/// Decode, filter and order crops for extraction: ascending rank, `FAILED`
/// entries last. Unparseable names and non-text classes are dropped.
pub fn order_crops<I>(paths: I) -> Vec<CropArtifact>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut crops = paths
        .into_iter()
        .filter_map(|path| match CropArtifact::parse(&path) {
            Some(crop) if crop.is_recognizable() => Some(crop),
            Some(crop) => {
                tracing::debug!(
                    path = %path.display(),
                    marker = %crop.marker.as_wire(),
                    "Skipping non-text region"
                );
                None
            }
            None => {
                tracing::debug!(path = %path.display(), "Skipping crop with unrecognized name");
                None
            }
        })
        .collect::<Vec<_>>();
    crops.sort_by(|a, b| a.reading_order(b));
    crops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(crops: &[CropArtifact]) -> Vec<String> {
        crops
            .iter()
            .map(|c| c.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_numeric_order_with_failed_last() {
        let paths = ["2_0.jpg", "10_1.jpg", "FAILED_x.jpg", "1_0.jpg"]
            .into_iter()
            .map(PathBuf::from);
        let crops = order_crops(paths);
        assert_eq!(names(&crops), vec!["1_0.jpg", "2_0.jpg", "10_1.jpg", "FAILED_x.jpg"]);
    }

    #[test]
    fn test_non_text_classes_and_garbage_dropped() {
        let paths = ["3_4.png", "1_0.png", "notes.png", "x_1.png", "2_1.png", "5.png"]
            .into_iter()
            .map(PathBuf::from);
        let crops = order_crops(paths);
        assert_eq!(names(&crops), vec!["1_0.png", "2_1.png"]);
    }

    #[test]
    fn test_parse_crop() {
        let crop = CropArtifact::parse(Path::new("cache/a/class_cutter/7_1.jpg")).unwrap();
        assert_eq!(crop.rank, Some(7));
        assert_eq!(crop.marker, CropMarker::Class(RegionClass::Handwritten));
        assert_eq!(crop.stem(), "7_1");
        assert!(crop.is_recognizable());

        let failed = CropArtifact::parse(Path::new("FAILED_FAILED_board.jpg")).unwrap();
        assert!(failed.is_failed());
        assert_eq!(failed.rank, None);

        let ranked_failed = CropArtifact::parse(Path::new("3_FAILED.jpg")).unwrap();
        assert!(ranked_failed.is_failed());
        assert_eq!(ranked_failed.rank, Some(3));
    }

    #[test]
    fn test_marker_wire_form() {
        assert_eq!(CropMarker::parse("0"), Some(CropMarker::Class(RegionClass::Text)));
        assert_eq!(CropMarker::parse("FAILED").unwrap().as_wire(), "FAILED");
        assert_eq!(CropMarker::Class(RegionClass::Other(6)).as_wire(), "6");
        assert_eq!(CropMarker::parse("text"), None);
    }
}
