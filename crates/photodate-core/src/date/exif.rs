use chrono::NaiveDateTime;
use tracing::debug;

use crate::exif_store::CaptureInfo;

/// Accepted textual layouts for EXIF capture timestamps, tried in order.
const EXIF_DATE_FORMATS: &[&str] = &[
    "%Y:%m:%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Capture date from the EXIF block: "original" first, then "digitized".
/// EXIF datetimes have no timezone info - they are local time as-is.
pub fn extract_exif_date(capture: &CaptureInfo) -> Option<NaiveDateTime> {
    let raw = present(&capture.date_time_original).or(present(&capture.date_time_digitized))?;

    let parsed = parse_exif_datetime(raw);
    if parsed.is_none() {
        debug!("EXIF timestamp [{}] did not match any known format", raw);
    }
    parsed
}

fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .filter(|s| !s.trim_end_matches('\0').trim().is_empty())
}

pub fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let cleaned = s.trim_end_matches('\0').trim();

    EXIF_DATE_FORMATS.iter().find_map(|format| {
        debug!("Attempting to parse timestamp [{}] with format [{}]", cleaned, format);
        NaiveDateTime::parse_from_str(cleaned, format).ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!(parse_exif_datetime("2023:05:01 10:00:00"), Some(at(2023, 5, 1, 10, 0, 0)));
        assert_eq!(parse_exif_datetime("2023-05-01 10:00:00"), Some(at(2023, 5, 1, 10, 0, 0)));
        assert_eq!(
            parse_exif_datetime("2023-05-01 10:00:00.250000"),
            Some(at(2023, 5, 1, 10, 0, 0) + chrono::TimeDelta::milliseconds(250))
        );
        assert_eq!(parse_exif_datetime("2023:05:01 10:00:00\0"), Some(at(2023, 5, 1, 10, 0, 0)));
        assert!(parse_exif_datetime("0000:00:00 00:00:00").is_none());
        assert!(parse_exif_datetime("yesterday").is_none());
    }

    #[test]
    fn test_original_preferred_over_digitized() {
        let capture = CaptureInfo {
            date_time_original: Some("2020:01:02 03:04:05".to_string()),
            date_time_digitized: Some("2021:01:02 03:04:05".to_string()),
            user_comment: None,
        };
        assert_eq!(extract_exif_date(&capture), Some(at(2020, 1, 2, 3, 4, 5)));

        let capture = CaptureInfo {
            date_time_original: None,
            date_time_digitized: Some("2021:01:02 03:04:05".to_string()),
            user_comment: None,
        };
        assert_eq!(extract_exif_date(&capture), Some(at(2021, 1, 2, 3, 4, 5)));
    }

    #[test]
    fn test_unparsable_original_does_not_fall_back_to_digitized() {
        let capture = CaptureInfo {
            date_time_original: Some("garbage".to_string()),
            date_time_digitized: Some("2021:01:02 03:04:05".to_string()),
            user_comment: None,
        };
        assert!(extract_exif_date(&capture).is_none());
    }
}
