use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::{PhotoError, Result};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "tiff", "png", "gif", "webp", "heic"];

/// Check if a file name carries one of the supported image extensions
pub fn is_image_file(name: &Path) -> bool {
    name.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Lazy, restartable listing of the image files below a root directory.
#[derive(Debug, Clone)]
pub struct PhotoWalker {
    root: PathBuf,
    recurse: bool,
    exclude: Option<PathBuf>,
}

impl PhotoWalker {
    pub fn new(root: &Path, recurse: bool) -> Result<Self> {
        if !root.is_dir() {
            return Err(PhotoError::NotADirectory(root.to_path_buf()));
        }
        debug!("Root dir [{}] recurse [{}]", root.display(), recurse);
        Ok(Self {
            root: root.to_path_buf(),
            recurse,
            exclude: None,
        })
    }

    /// Skip everything below `dir` (e.g. the destination of moved files).
    pub fn excluding(mut self, dir: &Path) -> Self {
        self.exclude = Some(dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()));
        self
    }

    /// A fresh traversal; each call starts over from the root.
    pub fn iter(&self) -> impl Iterator<Item = PathBuf> + '_ {
        let walker = WalkDir::new(&self.root)
            .max_depth(if self.recurse { usize::MAX } else { 1 })
            .sort_by_file_name();

        walker
            .into_iter()
            .filter_entry(move |entry| !self.is_excluded(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_image_file(entry.path()))
            .map(DirEntry::into_path)
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        let Some(exclude) = &self.exclude else {
            return false;
        };
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry.path().canonicalize().is_ok_and(|p| p == *exclude)
    }
}
