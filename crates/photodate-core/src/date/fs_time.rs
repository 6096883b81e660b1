use std::fs::Metadata;
use std::io;
use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime};
use tracing::debug;

/// Best available "birth" timestamp of a file, as local naive time.
///
/// Windows reports a real creation time. Unix has no portable birth time,
/// so the inode change time (`st_ctime`) stands in for it: it moves on
/// rename, chmod and metadata writes, and is therefore only an
/// approximation. Other platforms fall back to the modification time.
pub fn birth_time(path: &Path) -> io::Result<NaiveDateTime> {
    let metadata = std::fs::metadata(path)?;
    let (secs, nanos) = platform_timestamp(&metadata)?;
    debug!("Creation timestamp for file [{}] is [{}]", path.display(), secs);

    let utc = DateTime::from_timestamp(secs, nanos).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, format!("timestamp {secs} out of range"))
    })?;
    Ok(utc.with_timezone(&Local).naive_local())
}

#[cfg(windows)]
fn platform_timestamp(metadata: &Metadata) -> io::Result<(i64, u32)> {
    system_time_parts(metadata.created()?)
}

#[cfg(unix)]
fn platform_timestamp(metadata: &Metadata) -> io::Result<(i64, u32)> {
    use std::os::unix::fs::MetadataExt;
    Ok((metadata.ctime(), metadata.ctime_nsec() as u32))
}

#[cfg(not(any(unix, windows)))]
fn platform_timestamp(metadata: &Metadata) -> io::Result<(i64, u32)> {
    system_time_parts(metadata.modified()?)
}

#[cfg(not(unix))]
fn system_time_parts(time: std::time::SystemTime) -> io::Result<(i64, u32)> {
    let d = time
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok((d.as_secs() as i64, d.subsec_nanos()))
}
