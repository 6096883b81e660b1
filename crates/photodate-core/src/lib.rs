pub mod cancel;
pub mod caption;
pub mod date;
pub mod error;
pub mod exif_store;
pub mod pipeline;
pub mod record;
pub mod relocate;
pub mod retime;
pub mod sanitize;
pub mod walker;
pub mod worker;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

// Re-export the types callers need for a run
pub use cancel::CancellationToken;
pub use caption::{CaptionRegistry, Captioner, CommandCaptioner, DetailLevel};
pub use error::{PhotoError, Result};
pub use pipeline::{Pipeline, Step, StepOutcome};
pub use relocate::TransferMode;
pub use retime::{CreationTimeSetter, PlatformCreationTime};
pub use walker::PhotoWalker;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessOptions {
    pub source: PathBuf,
    #[serde(default)]
    pub destination: Option<PathBuf>,
    /// Rename with the taken date and set file times to it
    #[serde(default = "default_true")]
    pub created_date: bool,
    #[serde(default = "default_true")]
    pub recurse: bool,
    #[serde(default)]
    pub move_files: bool,
    #[serde(default)]
    pub copy_files: bool,
    /// Add an `MM-MonthName` folder below the year (move/copy only)
    #[serde(default)]
    pub month_folder: bool,
    /// Write a generated description into the EXIF comment
    #[serde(default)]
    pub describe: bool,
    #[serde(default)]
    pub detail_level: DetailLevel,
}

impl ProcessOptions {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: None,
            created_date: true,
            recurse: true,
            move_files: false,
            copy_files: false,
            month_folder: false,
            describe: false,
            detail_level: DetailLevel::default(),
        }
    }

    /// Load options from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let config_error = |reason: String| PhotoError::Config {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|e| config_error(e.to_string()))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| config_error(e.to_string()))
    }

    pub fn transfer_mode(&self) -> Option<TransferMode> {
        if self.move_files {
            Some(TransferMode::Move)
        } else if self.copy_files {
            Some(TransferMode::Copy)
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.move_files && self.copy_files {
            return Err(PhotoError::InvalidOptions(
                "move and copy cannot both be enabled".to_string(),
            ));
        }
        if self.transfer_mode().is_some() && self.destination.is_none() {
            return Err(PhotoError::InvalidOptions(
                "moving or copying needs a destination directory".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Header,
    Error,
}

/// One user-facing line of the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Report(Report),
    /// Emitted after each file completes
    Progress(Progress),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub total_files: u64,
    pub processed: u64,
    /// Files whose record could not be opened at all
    pub failed_files: u64,
    pub failed_steps: u64,
    /// Files left untouched because the run was cancelled
    pub not_processed: u64,
    pub cancelled: bool,
}

/// Control options for process execution.
#[derive(Clone, Default)]
pub struct ProcessControl {
    /// Cancellation token, checked before each file.
    pub cancel_token: Option<CancellationToken>,
    /// Creation-time capability; the platform one when unset.
    pub creation_time: Option<std::sync::Arc<dyn CreationTimeSetter>>,
}

impl ProcessControl {
    /// Create a new ProcessControl with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create ProcessControl with a cancellation token.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    pub fn with_creation_time(mut self, setter: std::sync::Arc<dyn CreationTimeSetter>) -> Self {
        self.creation_time = Some(setter);
        self
    }
}

/// Type alias for the event callback. Borrowing closures are accepted.
pub type EventCallback<'a> = dyn Fn(Event) + Send + Sync + 'a;

/// Run the full processing pipeline over `options.source`.
pub fn process(
    options: &ProcessOptions,
    captioners: &CaptionRegistry,
    events: &EventCallback<'_>,
) -> Result<ProcessResult> {
    process_with_control(options, captioners, &ProcessControl::default(), events)
}

/// Run the full processing pipeline with cancellation support.
pub fn process_with_control(
    options: &ProcessOptions,
    captioners: &CaptionRegistry,
    control: &ProcessControl,
    events: &EventCallback<'_>,
) -> Result<ProcessResult> {
    options.validate()?;
    if options.month_folder && options.transfer_mode().is_none() {
        info!("Month folder option ignored: neither move nor copy is enabled");
    }

    let mut walker = PhotoWalker::new(&options.source, options.recurse)?;
    if let (Some(_), Some(dest)) = (options.transfer_mode(), &options.destination) {
        walker = walker.excluding(dest);
    }

    let report = |message: String, severity: Severity| {
        events(Event::Report(Report { message, severity }));
    };

    report("Starting background task...".to_string(), Severity::Info);
    let total = walker.count() as u64;
    report(format!("Total files = [{total}]"), Severity::Info);

    let platform = PlatformCreationTime;
    let creation: &dyn CreationTimeSetter = match &control.creation_time {
        Some(setter) => setter.as_ref(),
        None => &platform,
    };
    let pipeline = Pipeline::new(options, captioners, creation);
    let mut result = ProcessResult {
        total_files: total,
        ..Default::default()
    };

    for (index, path) in walker.iter().enumerate() {
        let index = index as u64;
        if control.cancel_token.as_ref().is_some_and(|t| t.is_cancelled()) {
            result.cancelled = true;
            result.not_processed = total.saturating_sub(index);
            report("User interrupted ...".to_string(), Severity::Error);
            break;
        }

        report(format!("Processing File [{}]", path.display()), Severity::Header);
        match pipeline.open(&path) {
            Ok(mut record) => {
                for outcome in pipeline.run(&mut record) {
                    if !outcome.success {
                        result.failed_steps += 1;
                    }
                    let (message, severity) = step_message(&path, &outcome);
                    report(message, severity);
                }
                result.processed += 1;
            }
            Err(e) => {
                result.failed_files += 1;
                report(format!("Could not process file [{}]: {}", path.display(), e), Severity::Error);
            }
        }

        events(Event::Progress(Progress {
            current: index + 1,
            total,
        }));
    }

    report("Background task finished.".to_string(), Severity::Info);
    info!(
        "Processed {} of {} files, {} failed steps",
        result.processed, result.total_files, result.failed_steps
    );
    Ok(result)
}

fn step_message(path: &Path, outcome: &StepOutcome) -> (String, Severity) {
    let label = outcome.step.label();
    let file = path.display();
    if outcome.success {
        let message = match outcome.step {
            Step::Relocate => format!("{label} -> Successfully moved/copied file [{file}] to [{}]", outcome.detail),
            Step::Caption => format!("{label} -> Successfully described image [{file}] with [{}]", outcome.detail),
            Step::CreatedDate => format!("{label} -> Successfully renamed file [{file}] to [{}]", outcome.detail),
        };
        (message, Severity::Info)
    } else {
        (format!("{label} -> Failed for [{file}]: {}", outcome.detail), Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn collect(
        options: &ProcessOptions,
        control: &ProcessControl,
    ) -> (Result<ProcessResult>, Vec<Event>) {
        let events = Mutex::new(Vec::new());
        let result = process_with_control(options, &CaptionRegistry::new(), control, &|e: Event| {
            events.lock().unwrap().push(e)
        });
        (result, events.into_inner().unwrap())
    }

    #[test]
    fn test_validate() {
        let mut opts = ProcessOptions::new("/photos");
        assert!(opts.validate().is_ok());
        opts.copy_files = true;
        assert!(matches!(opts.validate(), Err(PhotoError::InvalidOptions(_))));
        opts.destination = Some(PathBuf::from("/sorted"));
        assert!(opts.validate().is_ok());
        opts.move_files = true;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_load_options_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("options.json");
        fs::write(&path, r#"{"source": "/photos", "copy_files": true, "destination": "/out", "detail_level": 2}"#).unwrap();

        let opts = ProcessOptions::load(&path).unwrap();
        assert_eq!(opts.source, PathBuf::from("/photos"));
        assert!(opts.created_date);
        assert!(opts.recurse);
        assert_eq!(opts.transfer_mode(), Some(TransferMode::Copy));
        assert_eq!(opts.detail_level, DetailLevel::Full);

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ProcessOptions::load(&path), Err(PhotoError::Config { .. })));
    }

    #[test]
    fn test_not_a_directory_aborts_before_any_event() {
        let dir = tempdir().unwrap();
        let opts = ProcessOptions::new(dir.path().join("missing"));
        let (result, events) = collect(&opts, &ProcessControl::new());
        assert!(matches!(result, Err(PhotoError::NotADirectory(_))));
        assert!(events.is_empty());
    }

    #[test]
    fn test_run_reports_each_step_and_progress() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("20230501_100000_a.jpg"), b"x").unwrap();
        fs::write(dir.path().join("20230502_100000_b.jpg"), b"x").unwrap();
        fs::write(dir.path().join("readme.txt"), b"x").unwrap();

        let opts = ProcessOptions::new(dir.path());
        let (result, events) = collect(&opts, &ProcessControl::new());
        let result = result.unwrap();
        assert_eq!(result.total_files, 2);
        assert_eq!(result.processed, 2);
        assert_eq!(result.failed_steps, 0);
        assert!(dir.path().join("2023-05-01_10.00.00_a.jpg").exists());
        assert!(dir.path().join("2023-05-02_10.00.00_b.jpg").exists());

        let step_reports = events
            .iter()
            .filter(|e| matches!(e, Event::Report(r) if r.message.starts_with("Created Date")))
            .count();
        assert_eq!(step_reports, 2);
        let progress: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::Progress(p) => Some((p.current, p.total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn test_process_accepts_borrowing_callback() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("20230501_100000_a.jpg"), b"x").unwrap();

        let reports = std::sync::atomic::AtomicUsize::new(0);
        let callback = |e: Event| {
            if matches!(e, Event::Report(_)) {
                reports.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        };
        let result = process(&ProcessOptions::new(dir.path()), &CaptionRegistry::new(), &callback).unwrap();
        assert_eq!(result.processed, 1);
        // start, total, header, created date, finish
        assert_eq!(reports.into_inner(), 5);
    }

    #[test]
    fn test_cancelled_run_touches_nothing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("20230501_100000_a.jpg"), b"x").unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let opts = ProcessOptions::new(dir.path());
        let (result, _) = collect(&opts, &ProcessControl::new().with_cancel_token(token));
        let result = result.unwrap();
        assert!(result.cancelled);
        assert_eq!(result.processed, 0);
        assert_eq!(result.not_processed, 1);
        assert!(dir.path().join("20230501_100000_a.jpg").exists());
    }
}
