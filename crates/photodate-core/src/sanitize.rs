use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Layout of the date prefix written in front of renamed files.
pub const FILE_PREFIX_FORMAT: &str = "%Y-%m-%d_%H.%M.%S";

/// Leading date/time tokens, in alternation order:
/// flexible-separator datetime, separated date, YYYYMMDDHHMMSS, YYYYMMDD.
/// The trailing part eats one optional `-`/`_` and the spaces around it.
static DATE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(",
        r"\d{4}[-_. ]?\d{1,2}[-_. ]?\d{1,2}[-_. ]?\d{1,2}[-_.: ]?\d{1,2}[-_.: ]?\d{1,2}",
        r"|\d{4}[-_.]\d{1,2}[-_.]\d{1,2}",
        r"|\d{14}",
        r"|\d{8}",
        r")\s*[-_]?\s*",
    ))
    .unwrap()
});

/// Remove at most one leading date/time token from a filename.
pub fn strip_date_prefix(filename: &str) -> String {
    let cleaned = DATE_PREFIX_RE.replace(filename, "").into_owned();
    debug!("Cleaning file [{}] to [{}]", filename, cleaned);
    cleaned
}

/// `<date>_<filename without any previous date prefix>`
pub fn date_prefixed_name(date: &NaiveDateTime, filename: &str) -> String {
    format!("{}_{}", date.format(FILE_PREFIX_FORMAT), strip_date_prefix(filename))
}
