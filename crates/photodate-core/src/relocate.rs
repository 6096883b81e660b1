use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PhotoError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferMode {
    Move,
    Copy,
}

/// `dest_root/YYYY` or `dest_root/YYYY/MM-MonthName`
pub fn destination_dir(dest_root: &Path, date: &NaiveDateTime, month_folder: bool) -> PathBuf {
    let year_dir = dest_root.join(date.format("%Y").to_string());
    if month_folder {
        year_dir.join(date.format("%m-%B").to_string())
    } else {
        year_dir
    }
}

/// Move or copy `path` into its year (and month) folder under `dest_root`.
/// Returns the new location of the file.
pub fn relocate(
    path: &Path,
    date: &NaiveDateTime,
    dest_root: &Path,
    month_folder: bool,
    mode: TransferMode,
) -> Result<PathBuf> {
    let sub_dir = destination_dir(dest_root, date, month_folder);
    fs::create_dir_all(&sub_dir)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| PhotoError::FileMissingDuringRelocate(path.to_path_buf()))?;
    let dest = sub_dir.join(file_name);

    if !path.is_file() {
        warn!("File [{}] was not found", path.display());
        return Err(PhotoError::FileMissingDuringRelocate(path.to_path_buf()));
    }
    if same_file(path, &dest) {
        info!("[{}] is already in place", path.display());
        return Ok(dest);
    }
    if mode == TransferMode::Move && dest.exists() {
        return Err(PhotoError::RenameCollision {
            from: path.to_path_buf(),
            to: dest,
        });
    }

    info!("{:?} [{}] -> [{}]", mode, path.display(), dest.display());
    let result = match mode {
        TransferMode::Move => move_file(path, &dest),
        TransferMode::Copy => copy_with_times(path, &dest),
    };
    match result {
        Ok(()) => Ok(dest),
        Err(e) if e.kind() == io::ErrorKind::NotFound && !path.exists() => {
            warn!("File [{}] disappeared during relocation", path.display());
            Err(PhotoError::FileMissingDuringRelocate(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!("[{}] is on another filesystem, copying instead", to.display());
            copy_with_times(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}

fn is_cross_device(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::CrossesDevices
}

/// Copy contents and permissions, then carry over access/modification times.
fn copy_with_times(from: &Path, to: &Path) -> io::Result<()> {
    let meta = fs::metadata(from)?;
    fs::copy(from, to)?;
    let atime = FileTime::from_last_access_time(&meta);
    let mtime = FileTime::from_last_modification_time(&meta);
    filetime::set_file_times(to, atime, mtime)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
