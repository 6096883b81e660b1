use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, TimeZone};
use filetime::FileTime;
use tracing::{debug, info};

use crate::error::{PhotoError, Result};

/// Sets the creation ("birth") time of a file where the platform allows it.
pub trait CreationTimeSetter: Send + Sync {
    /// Returns `Ok(false)` when the platform has no settable creation time.
    fn set_creation_time(&self, path: &Path, unix_secs: i64) -> io::Result<bool>;
}

/// Uses `FileTimes::set_created` on Windows and macOS, no-op elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformCreationTime;

impl CreationTimeSetter for PlatformCreationTime {
    #[cfg(any(windows, target_os = "macos"))]
    fn set_creation_time(&self, path: &Path, unix_secs: i64) -> io::Result<bool> {
        #[cfg(target_os = "macos")]
        use std::os::macos::fs::FileTimesExt;
        #[cfg(windows)]
        use std::os::windows::fs::FileTimesExt;

        let created = system_time(unix_secs)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "timestamp out of range"))?;
        let file = std::fs::OpenOptions::new().write(true).open(path)?;
        file.set_times(std::fs::FileTimes::new().set_created(created))?;
        Ok(true)
    }

    #[cfg(not(any(windows, target_os = "macos")))]
    fn set_creation_time(&self, _path: &Path, _unix_secs: i64) -> io::Result<bool> {
        Ok(false)
    }
}

/// Seconds relative to the epoch, in either direction.
#[cfg_attr(not(any(windows, target_os = "macos")), allow(dead_code))]
fn system_time(unix_secs: i64) -> Option<SystemTime> {
    let offset = Duration::from_secs(unix_secs.unsigned_abs());
    if unix_secs >= 0 {
        UNIX_EPOCH.checked_add(offset)
    } else {
        UNIX_EPOCH.checked_sub(offset)
    }
}

/// Instant of a wall-clock time in `tz`. Ambiguous times take the earlier
/// instant; times skipped by a forward transition land just after the gap.
fn resolve_in<Tz: TimeZone>(date: &NaiveDateTime, tz: &Tz) -> Option<DateTime<Tz>> {
    date.and_local_timezone(tz.clone())
        .earliest()
        .or_else(|| (*date + TimeDelta::hours(1)).and_local_timezone(tz.clone()).earliest())
}

/// Set access and modification time to `date` (local time), then the
/// creation time through `creation`.
pub fn retime(path: &Path, date: &NaiveDateTime, creation: &dyn CreationTimeSetter) -> Result<()> {
    let retime_failed = |reason: String| PhotoError::Retime {
        path: path.to_path_buf(),
        reason,
    };

    let local = resolve_in(date, &Local)
        .ok_or_else(|| retime_failed(format!("[{date}] does not exist in the local timezone")))?;
    let ft = FileTime::from_unix_time(local.timestamp(), local.timestamp_subsec_nanos());

    info!("Updating timestamps for file [{}] ({})", path.display(), local.timestamp());
    filetime::set_file_times(path, ft, ft).map_err(|e| retime_failed(e.to_string()))?;

    match creation.set_creation_time(path, local.timestamp()) {
        Ok(true) => info!("Creation time has been updated for [{}]", path.display()),
        Ok(false) => debug!("Creation time is not settable on this platform"),
        Err(e) => return Err(retime_failed(e.to_string())),
    }
    Ok(())
}
