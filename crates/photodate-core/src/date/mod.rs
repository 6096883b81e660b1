pub mod exif;
pub mod filename;
pub mod fs_time;

use std::io;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::exif_store::ExifMetadata;

/// Where a resolved date came from, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateSource {
    Exif,
    Filename,
    Filesystem,
}

impl DateSource {
    /// 0 = best, higher = less accurate
    pub fn accuracy(self) -> u8 {
        match self {
            DateSource::Exif => 0,
            DateSource::Filename => 1,
            DateSource::Filesystem => 2,
        }
    }
}

/// Result of date resolution: date + where it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateResult {
    pub date: NaiveDateTime,
    pub source: DateSource,
}

/// Resolve the canonical date using all sources in priority order.
///
/// `fallback` is only invoked when neither EXIF nor the filename yield a
/// date; its error is the only way resolution can fail.
pub fn resolve_date<F>(metadata: &ExifMetadata, filename: &str, fallback: F) -> io::Result<DateResult>
where
    F: FnOnce() -> io::Result<NaiveDateTime>,
{
    // 1. EXIF original/digitized
    if let Some(date) = exif::extract_exif_date(&metadata.capture) {
        info!("EXIF date for [{}] => [{}]", filename, date);
        return Ok(DateResult { date, source: DateSource::Exif });
    }

    // 2. Leading date in the filename
    if let Some(date) = filename::date_from_filename(filename) {
        info!("Filename date for [{}] => [{}]", filename, date);
        return Ok(DateResult { date, source: DateSource::Filename });
    }

    // 3. Filesystem timestamp
    let date = fallback()?;
    info!("Filesystem date for [{}] => [{}]", filename, date);
    Ok(DateResult { date, source: DateSource::Filesystem })
}
