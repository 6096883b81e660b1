use std::path::{Path, PathBuf};

use tracing::info;

use crate::date::{self, fs_time, DateResult};
use crate::error::Result;
use crate::exif_store::ExifMetadata;

/// State of one photo for one pass of the pipeline.
#[derive(Debug)]
pub struct PhotoRecord {
    /// Path as first observed
    original_path: PathBuf,
    /// Where the file is now; updated by every step that moves it
    current_path: PathBuf,
    pub metadata: ExifMetadata,
    /// Resolved once when the record is opened
    resolved: DateResult,
}

impl PhotoRecord {
    /// Load metadata and resolve the date. Fails only if the file cannot
    /// be statted when the filesystem fallback is needed.
    pub fn open(path: &Path) -> Result<Self> {
        let metadata = ExifMetadata::load(path);
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let resolved = date::resolve_date(&metadata, &filename, || fs_time::birth_time(path))?;
        info!("Created date for file [{}] => [{}] ({:?})", path.display(), resolved.date, resolved.source);

        if let Some((lat, lon)) = metadata.gps() {
            info!("Latitude and longitude for file [{}]: {:.6}, {:.6}", path.display(), lat, lon);
        }

        Ok(Self {
            original_path: path.to_path_buf(),
            current_path: path.to_path_buf(),
            metadata,
            resolved,
        })
    }

    pub fn original_path(&self) -> &Path {
        &self.original_path
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    pub fn set_current_path(&mut self, path: PathBuf) {
        self.current_path = path;
    }

    pub fn directory(&self) -> &Path {
        self.current_path.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn base_name(&self) -> String {
        self.current_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn resolved(&self) -> &DateResult {
        &self.resolved
    }

    /// Decimal latitude/longitude, derived on demand and never stored.
    pub fn gps(&self) -> Option<(f64, f64)> {
        self.metadata.gps()
    }
}
