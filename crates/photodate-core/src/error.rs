use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("The directory provided [{0}] is not a valid directory")]
    NotADirectory(PathBuf),

    #[error("Invalid processing options: {0}")]
    InvalidOptions(String),

    #[error("Could not read metadata from [{path}]: {reason}")]
    MetadataUnreadable { path: PathBuf, reason: String },

    #[error("File [{0}] was not found")]
    FileMissingDuringRelocate(PathBuf),

    #[error("Cannot rename [{from}]: [{to}] already exists")]
    RenameCollision { from: PathBuf, to: PathBuf },

    #[error("Could not write metadata to [{path}]: {reason}")]
    MetadataWrite { path: PathBuf, reason: String },

    #[error("Caption backend [{backend}] failed: {reason}")]
    CaptionBackend { backend: String, reason: String },

    #[error("Could not update timestamps of [{path}]: {reason}")]
    Retime { path: PathBuf, reason: String },

    #[error("Could not load configuration [{path}]: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PhotoError {
    /// Errors that abort the whole run rather than a single file step.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PhotoError::NotADirectory(_) | PhotoError::InvalidOptions(_) | PhotoError::Config { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PhotoError>;
