//! Filesystem-backed artifact cache.
//!
//! ## Layout
//!
//! ```text
//! cache/
//! └── <item-stem>/
//!     ├── warped_<source-name>        (detection output)
//!     ├── FAILED_<source-name>        (detection failure, preserved)
//!     ├── class_cutter/
//!     │   ├── 1_0.jpg                 (region crops, <rank>_<class>)
//!     │   └── FAILED_<name>           (region-cut failure, preserved)
//!     └── ocr/
//!         └── 1_0.txt                 (extraction text)
//! ```
//!
//! Components above the cache never touch the filesystem directly.

mod artifact;

pub use artifact::{
    CropArtifact, CropMarker, DETECTION_PREFIX, FAILED_PREFIX, IMAGE_EXTENSIONS, REGION_DIR,
    RegionClass, TEXT_DIR, TEXT_EXTENSION, order_crops,
};

use conspect_shared::errors::{ConspectError, ConspectResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Deterministic mapping from item identity to working directory.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
    image_exts: Vec<String>,
}

impl ArtifactCache {
    /// Cache rooted at `root`, recognizing the default image extensions.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_extensions(root, IMAGE_EXTENSIONS.iter().copied())
    }

    pub fn with_extensions<I, S>(root: impl Into<PathBuf>, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            root: root.into(),
            image_exts: exts
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the cache root if absent.
    pub fn ensure_root(&self) -> ConspectResult<&Path> {
        fs::create_dir_all(&self.root).map_err(|e| {
            ConspectError::Cache(format!(
                "Failed to create cache root {}: {}",
                self.root.display(),
                e
            ))
        })?;
        Ok(&self.root)
    }

    /// Destroy and recreate the cache root.
    pub fn clear_root(&self) -> ConspectResult<&Path> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root).map_err(|e| {
                ConspectError::Cache(format!(
                    "Failed to clear cache root {}: {}",
                    self.root.display(),
                    e
                ))
            })?;
        }
        tracing::debug!(root = %self.root.display(), "Cleared cache root");
        self.ensure_root()
    }

    /// Create `name` under `parent` (or the cache root). Idempotent.
    pub fn make_dir(&self, parent: Option<&Path>, name: &str) -> ConspectResult<PathBuf> {
        let dir = parent.unwrap_or(&self.root).join(name);
        fs::create_dir_all(&dir).map_err(|e| {
            ConspectError::Cache(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        Ok(dir)
    }

    /// Immediate subdirectories of `path` (or the cache root), sorted by name.
    pub fn list_dirs(&self, path: Option<&Path>) -> ConspectResult<Vec<PathBuf>> {
        let dir = path.unwrap_or(&self.root);
        let mut dirs = read_dir_entries(dir)?
            .into_iter()
            .filter(|p| p.is_dir())
            .collect::<Vec<_>>();
        dirs.sort();
        Ok(dirs)
    }

    /// Immediate image files of `path`, sorted by name.
    pub fn list_images(&self, path: &Path) -> ConspectResult<Vec<PathBuf>> {
        self.list_files(path, |ext| self.image_exts.iter().any(|known| known == ext))
    }

    /// Delete a whole item directory. Missing directories are not an error.
    pub fn remove_dir(&self, path: &Path) -> ConspectResult<()> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConspectError::Cache(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Copy `source` into `target_dir` as `FAILED_<file name>`.
    pub fn preserve_failed(&self, source: &Path, target_dir: &Path) -> ConspectResult<PathBuf> {
        let name = file_name(source)?;
        let dest = target_dir.join(format!("{FAILED_PREFIX}{name}"));
        fs::copy(source, &dest).map_err(|e| {
            ConspectError::Cache(format!(
                "Failed to preserve {} as {}: {}",
                source.display(),
                dest.display(),
                e
            ))
        })?;
        Ok(dest)
    }

    /// Write a text artifact next to the other outputs of an item.
    pub fn write_text(&self, dir: &Path, stem: &str, text: &str) -> ConspectResult<PathBuf> {
        let path = dir.join(format!("{stem}.{TEXT_EXTENSION}"));
        fs::write(&path, text).map_err(|e| {
            ConspectError::Cache(format!("Failed to write {}: {}", path.display(), e))
        })?;
        Ok(path)
    }

    fn list_files<F>(&self, path: &Path, accept: F) -> ConspectResult<Vec<PathBuf>>
    where
        F: Fn(&str) -> bool,
    {
        let mut files = read_dir_entries(path)?
            .into_iter()
            .filter(|p| p.is_file())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| accept(&e.to_ascii_lowercase()))
            })
            .collect::<Vec<_>>();
        files.sort();
        Ok(files)
    }
}

/// Item identity: the file stem of a source image or the name of a cache directory.
pub fn item_stem(path: &Path) -> ConspectResult<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| ConspectError::Cache(format!("No usable file stem: {}", path.display())))
}

pub(crate) fn file_name(path: &Path) -> ConspectResult<&str> {
    path.file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ConspectError::Cache(format!("No usable file name: {}", path.display())))
}

fn read_dir_entries(dir: &Path) -> ConspectResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ConspectError::NotADirectory(dir.display().to_string()));
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        paths.push(entry?.path());
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_make_dir_is_idempotent() {
        let tmp = tempdir().unwrap();
        let cache = ArtifactCache::new(tmp.path().join("cache"));
        cache.ensure_root().unwrap();

        let first = cache.make_dir(None, "board").unwrap();
        touch(&first.join("keep.png"));
        let second = cache.make_dir(None, "board").unwrap();

        assert_eq!(first, second);
        assert!(second.join("keep.png").is_file());
    }

    #[test]
    fn test_make_dir_under_parent() {
        let tmp = tempdir().unwrap();
        let cache = ArtifactCache::new(tmp.path());
        let item = cache.make_dir(None, "a").unwrap();
        let sub = cache.make_dir(Some(item.as_path()), REGION_DIR).unwrap();
        assert_eq!(sub, tmp.path().join("a").join(REGION_DIR));
        assert!(sub.is_dir());
    }

    #[test]
    fn test_list_images_filters_and_sorts() {
        let tmp = tempdir().unwrap();
        let cache = ArtifactCache::new(tmp.path());
        for name in ["b.PNG", "a.jpg", "c.jpeg", "notes.txt", "d.gif"] {
            touch(&tmp.path().join(name));
        }
        fs::create_dir(tmp.path().join("e.png")).unwrap();

        let names: Vec<_> = cache
            .list_images(tmp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.jpeg"]);

        let again = cache.list_images(tmp.path()).unwrap();
        assert_eq!(again, cache.list_images(tmp.path()).unwrap());
    }

    #[test]
    fn test_list_dirs_sorted() {
        let tmp = tempdir().unwrap();
        let cache = ArtifactCache::new(tmp.path());
        for name in ["zeta", "alpha", "mid"] {
            cache.make_dir(None, name).unwrap();
        }
        touch(&tmp.path().join("file.png"));

        let dirs = cache.list_dirs(None).unwrap();
        let names: Vec<_> = dirs
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_listing_missing_dir_fails() {
        let tmp = tempdir().unwrap();
        let cache = ArtifactCache::new(tmp.path());
        let missing = tmp.path().join("missing");

        assert!(matches!(
            cache.list_images(&missing),
            Err(ConspectError::NotADirectory(_))
        ));
        assert!(matches!(
            cache.list_dirs(Some(missing.as_path())),
            Err(ConspectError::NotADirectory(_))
        ));

        let file = tmp.path().join("plain.png");
        touch(&file);
        assert!(matches!(
            cache.list_images(&file),
            Err(ConspectError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_clear_root_recreates_empty() {
        let tmp = tempdir().unwrap();
        let cache = ArtifactCache::new(tmp.path().join("cache"));
        let item = cache.make_dir(None, "x").unwrap();
        touch(&item.join("a.png"));

        cache.clear_root().unwrap();

        assert!(cache.root().is_dir());
        assert!(cache.list_dirs(None).unwrap().is_empty());
    }

    #[test]
    fn test_preserve_failed_and_remove() {
        let tmp = tempdir().unwrap();
        let cache = ArtifactCache::new(tmp.path().join("cache"));
        let source = tmp.path().join("board.jpg");
        touch(&source);
        let item = cache.make_dir(None, "board").unwrap();

        let kept = cache.preserve_failed(&source, &item).unwrap();
        assert_eq!(kept, item.join("FAILED_board.jpg"));
        assert!(kept.is_file());

        cache.remove_dir(&item).unwrap();
        assert!(!item.exists());
        cache.remove_dir(&item).unwrap();
    }

    #[test]
    fn test_write_text_artifacts() {
        let tmp = tempdir().unwrap();
        let cache = ArtifactCache::new(tmp.path());
        let dir = cache.make_dir(None, TEXT_DIR).unwrap();
        cache.write_text(&dir, "2_1", "hello").unwrap();
        cache.write_text(&dir, "1_0", "world").unwrap();

        assert_eq!(fs::read_to_string(dir.join("2_1.txt")).unwrap(), "hello");
        assert_eq!(fs::read_to_string(dir.join("1_0.txt")).unwrap(), "world");
        assert!(cache.list_images(&dir).unwrap().is_empty());
    }

    #[test]
    fn test_item_stem() {
        assert_eq!(item_stem(Path::new("in/board.v2.jpg")).unwrap(), "board.v2");
        assert_eq!(item_stem(Path::new("cache/board")).unwrap(), "board");
    }
}
