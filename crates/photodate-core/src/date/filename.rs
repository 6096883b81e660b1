use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

struct DatePattern {
    regex: &'static LazyLock<Regex>,
    label: &'static str,
}

static RE_0: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})_(\d{2})(\d{2})(\d{2})").unwrap());
static RE_1: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})_(\d{2})-(\d{2})-(\d{2})").unwrap());
static RE_2: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})_(\d{2})\.(\d{2})\.(\d{2})").unwrap());
static RE_3: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})").unwrap());
static RE_4: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").unwrap());

/// Most specific first. `RE_2` is the prefix written by the rename step.
static PATTERNS: &[DatePattern] = &[
    DatePattern { regex: &RE_0, label: "YYYYMMDD_HHMMSS" },
    DatePattern { regex: &RE_1, label: "YYYY-MM-DD_HH-MM-SS" },
    DatePattern { regex: &RE_2, label: "YYYY-MM-DD_HH.MM.SS" },
    DatePattern { regex: &RE_3, label: "YYYYMMDD" },
    DatePattern { regex: &RE_4, label: "YYYY-MM-DD" },
];

pub fn date_from_filename(filename: &str) -> Option<NaiveDateTime> {
    let basename = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    for pat in PATTERNS {
        debug!("Checking filename [{}] against [{}]", basename, pat.label);
        let Some(caps) = pat.regex.captures(basename) else {
            continue;
        };
        let groups: Vec<u32> = caps
            .iter()
            .skip(1)
            .filter_map(|g| g.and_then(|m| m.as_str().parse().ok()))
            .collect();

        let date = match groups.as_slice() {
            [y, mo, d, h, mi, s] => NaiveDate::from_ymd_opt(*y as i32, *mo, *d)
                .and_then(|date| date.and_hms_opt(*h, *mi, *s)),
            [y, mo, d] => NaiveDate::from_ymd_opt(*y as i32, *mo, *d)
                .and_then(|date| date.and_hms_opt(0, 0, 0)),
            _ => None,
        };

        match date {
            Some(dt) => return Some(dt),
            None => debug!("[{}] matched [{}] but is not a valid date", basename, pat.label),
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn test_filename_patterns() {
        assert_eq!(date_from_filename("20230501_100000_vacation.jpg"), Some(at(2023, 5, 1, 10, 0, 0)));
        assert_eq!(date_from_filename("2023-05-01_10-20-30.jpg"), Some(at(2023, 5, 1, 10, 20, 30)));
        assert_eq!(date_from_filename("2023-05-01_10.20.30_beach.jpg"), Some(at(2023, 5, 1, 10, 20, 30)));
        assert_eq!(date_from_filename("20230501 party.jpg"), Some(at(2023, 5, 1, 0, 0, 0)));
        assert_eq!(date_from_filename("2023-05-01 party.jpg"), Some(at(2023, 5, 1, 0, 0, 0)));
        assert_eq!(date_from_filename("/photos/2019/20190919_053857.jpg"), Some(at(2019, 9, 19, 5, 38, 57)));
    }

    #[test]
    fn test_unanchored_dates_ignored() {
        assert!(date_from_filename("IMG_20190509_154733.jpg").is_none());
        assert!(date_from_filename("random_photo.jpg").is_none());
    }

    #[test]
    fn test_invalid_datetime_falls_through_to_date_only() {
        // 25:61:00 is not a time, the date-only pattern still applies
        assert_eq!(date_from_filename("20230501_256100.jpg"), Some(at(2023, 5, 1, 0, 0, 0)));
        assert!(date_from_filename("20231345_x.jpg").is_none());
    }
}
