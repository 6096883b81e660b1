use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::caption::{compose_comment, CaptionRegistry};
use crate::error::{PhotoError, Result};
use crate::record::PhotoRecord;
use crate::relocate;
use crate::retime::{self, CreationTimeSetter};
use crate::sanitize;
use crate::ProcessOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    Relocate,
    Caption,
    CreatedDate,
}

impl Step {
    pub fn label(self) -> &'static str {
        match self {
            Step::Relocate => "Move/Copy File",
            Step::Caption => "Describe Image",
            Step::CreatedDate => "Created Date",
        }
    }
}

/// Result of one step for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: Step,
    pub success: bool,
    pub detail: String,
}

/// Runs the enabled mutation steps on one photo at a time.
pub struct Pipeline<'a> {
    options: &'a ProcessOptions,
    captioners: &'a CaptionRegistry,
    creation: &'a dyn CreationTimeSetter,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        options: &'a ProcessOptions,
        captioners: &'a CaptionRegistry,
        creation: &'a dyn CreationTimeSetter,
    ) -> Self {
        Self { options, captioners, creation }
    }

    pub fn open(&self, path: &Path) -> Result<PhotoRecord> {
        PhotoRecord::open(path)
    }

    /// Relocate, describe, then rename + retime. Each enabled step yields
    /// exactly one outcome; a failed step does not stop the next one.
    /// Writing the comment touches the file, so retiming comes last.
    pub fn run(&self, record: &mut PhotoRecord) -> Vec<StepOutcome> {
        let mut outcomes = Vec::new();

        if self.options.transfer_mode().is_some() {
            outcomes.push(outcome(Step::Relocate, self.relocate_step(record)));
        }
        if self.options.describe {
            outcomes.push(outcome(Step::Caption, self.caption_step(record)));
        }
        if self.options.created_date {
            outcomes.push(outcome(Step::CreatedDate, self.created_date_step(record)));
        }

        outcomes
    }

    pub fn relocate_step(&self, record: &mut PhotoRecord) -> Result<String> {
        let (Some(mode), Some(dest_root)) = (self.options.transfer_mode(), &self.options.destination) else {
            return Err(PhotoError::InvalidOptions(
                "moving or copying needs a destination directory".to_string(),
            ));
        };
        let new_path = relocate::relocate(
            record.current_path(),
            &record.resolved().date,
            dest_root,
            self.options.month_folder,
            mode,
        )?;
        record.set_current_path(new_path);
        Ok(record.current_path().display().to_string())
    }

    pub fn caption_step(&self, record: &mut PhotoRecord) -> Result<String> {
        let descriptions = self
            .captioners
            .describe(record.current_path(), self.options.detail_level);

        let existing = record.metadata.comment();
        let comment = compose_comment(&descriptions, existing.as_deref());
        info!("Comment for file [{}] is [{}]", record.current_path().display(), comment);

        record.metadata.set_comment(&comment);
        record.metadata.persist(record.current_path())?;
        Ok(comment)
    }

    /// sanitize -> new name -> rename on disk -> update path -> retime
    pub fn created_date_step(&self, record: &mut PhotoRecord) -> Result<String> {
        let date = record.resolved().date;
        let current_name = record.base_name();
        let new_name = sanitize::date_prefixed_name(&date, &current_name);

        if new_name != current_name {
            let from = record.current_path().to_path_buf();
            let to = record.directory().join(&new_name);
            if to.exists() {
                return Err(PhotoError::RenameCollision { from, to });
            }
            info!("Renaming file [{}] -> [{}]", from.display(), to.display());
            fs::rename(&from, &to)?;
            record.set_current_path(to);
        } else {
            info!("File [{}] already has its date prefix", current_name);
        }

        retime::retime(record.current_path(), &date, self.creation)?;
        Ok(record.current_path().display().to_string())
    }
}

fn outcome(step: Step, result: Result<String>) -> StepOutcome {
    match result {
        Ok(detail) => StepOutcome { step, success: true, detail },
        Err(e) => {
            warn!("{} failed: {}", step.label(), e);
            StepOutcome { step, success: false, detail: e.to_string() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption::{Captioner, DetailLevel};
    use crate::exif_store::ExifMetadata;
    use crate::retime::PlatformCreationTime;
    use chrono::{Local, NaiveDate};
    use filetime::FileTime;
    use std::path::PathBuf;
    use tempfile::tempdir;

    struct Fixed(Vec<&'static str>);

    impl Captioner for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn describe(&self, _image: &Path, _level: DetailLevel) -> anyhow::Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    struct Broken;

    impl Captioner for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn describe(&self, _image: &Path, _level: DetailLevel) -> anyhow::Result<Vec<String>> {
            anyhow::bail!("out of memory")
        }
    }

    fn options(source: &Path) -> ProcessOptions {
        ProcessOptions {
            source: source.to_path_buf(),
            destination: None,
            created_date: true,
            recurse: false,
            move_files: false,
            copy_files: false,
            month_folder: false,
            describe: false,
            detail_level: DetailLevel::Standard,
        }
    }

    fn jpeg_with_date(path: &Path, original: Option<&str>) {
        image::RgbImage::from_pixel(8, 8, image::Rgb([10, 20, 30])).save(path).unwrap();
        if let Some(original) = original {
            let mut metadata = ExifMetadata::load(path);
            metadata.capture.date_time_original = Some(original.to_string());
            metadata.persist(path).unwrap();
        }
    }

    fn run_once(opts: &ProcessOptions, registry: &CaptionRegistry, path: &Path) -> (PathBuf, Vec<StepOutcome>) {
        let pipeline = Pipeline::new(opts, registry, &PlatformCreationTime);
        let mut record = pipeline.open(path).unwrap();
        let outcomes = pipeline.run(&mut record);
        (record.current_path().to_path_buf(), outcomes)
    }

    #[test]
    fn test_rename_and_retime_from_exif() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vacation.jpg");
        jpeg_with_date(&path, Some("2023:05:01 10:00:00"));
        let opts = options(dir.path());
        let registry = CaptionRegistry::new();

        let (new_path, outcomes) = run_once(&opts, &registry, &path);
        assert_eq!(new_path, dir.path().join("2023-05-01_10.00.00_vacation.jpg"));
        assert!(new_path.exists());
        assert!(!path.exists());
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].success);

        let expected = NaiveDate::from_ymd_opt(2023, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            .and_local_timezone(Local)
            .earliest()
            .unwrap()
            .timestamp();
        let meta = fs::metadata(&new_path).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta).unix_seconds(), expected);
    }

    #[test]
    fn test_second_run_keeps_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beach.jpg");
        jpeg_with_date(&path, None);
        let opts = options(dir.path());
        let registry = CaptionRegistry::new();

        let (first, _) = run_once(&opts, &registry, &path);
        let (second, outcomes) = run_once(&opts, &registry, &first);
        assert_eq!(first, second);
        assert!(outcomes[0].success);
    }

    #[test]
    fn test_rename_collision_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("20230501_100000_vacation.jpg");
        fs::write(&path, b"x").unwrap();
        fs::write(dir.path().join("2023-05-01_10.00.00_vacation.jpg"), b"y").unwrap();
        let opts = options(dir.path());
        let registry = CaptionRegistry::new();

        let (current, outcomes) = run_once(&opts, &registry, &path);
        assert_eq!(current, path);
        assert!(!outcomes[0].success);
        assert!(outcomes[0].detail.contains("already exists"));
    }

    #[test]
    fn test_full_run_with_copy_and_caption() {
        let dir = tempdir().unwrap();
        let src_dir = dir.path().join("in");
        fs::create_dir_all(&src_dir).unwrap();
        let path = src_dir.join("vacation.jpg");
        jpeg_with_date(&path, Some("2023:05:01 10:00:00"));

        let mut opts = options(&src_dir);
        opts.copy_files = true;
        opts.month_folder = true;
        opts.describe = true;
        opts.destination = Some(dir.path().join("out"));
        let registry = CaptionRegistry::new()
            .with(Fixed(vec!["a dog on a beach"]))
            .with(Broken)
            .with(Fixed(vec!["sunset"]));

        let (current, outcomes) = run_once(&opts, &registry, &path);
        let steps: Vec<_> = outcomes.iter().map(|o| (o.step, o.success)).collect();
        assert_eq!(
            steps,
            vec![(Step::Relocate, true), (Step::Caption, true), (Step::CreatedDate, true)]
        );
        assert_eq!(
            current,
            dir.path().join("out/2023/05-May/2023-05-01_10.00.00_vacation.jpg")
        );
        assert!(path.exists(), "copy keeps the source");

        let metadata = ExifMetadata::load(&current);
        assert_eq!(metadata.comment().as_deref(), Some("a dog on a beach. sunset."));
        assert_eq!(metadata.capture.date_time_original.as_deref(), Some("2023:05:01 10:00:00"));
    }

    #[test]
    fn test_failed_relocate_does_not_stop_other_steps() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("20230501_100000_x.jpg");
        fs::write(&path, b"not really a jpeg").unwrap();

        let mut opts = options(dir.path());
        opts.move_files = true;
        opts.describe = true;
        opts.destination = Some(dir.path().join("out"));
        let registry = CaptionRegistry::new();
        let pipeline = Pipeline::new(&opts, &registry, &PlatformCreationTime);
        let mut record = pipeline.open(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let outcomes = pipeline.run(&mut record);
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(
            outcomes[0],
            StepOutcome { step: Step::Relocate, success: false, .. }
        ));
        assert_eq!(outcomes[1].step, Step::Caption);
        assert!(!outcomes[1].success);
        assert_eq!(outcomes[2].step, Step::CreatedDate);
        assert!(!outcomes[2].success);
    }

    #[test]
    fn test_empty_descriptions_still_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vacation.jpg");
        jpeg_with_date(&path, Some("2023:05:01 10:00:00"));
        let mut metadata = ExifMetadata::load(&path);
        metadata.set_comment("old note");
        metadata.persist(&path).unwrap();

        let mut opts = options(dir.path());
        opts.describe = true;
        let registry = CaptionRegistry::new();

        let (current, outcomes) = run_once(&opts, &registry, &path);
        let steps: Vec<_> = outcomes.iter().map(|o| (o.step, o.success)).collect();
        assert_eq!(steps, vec![(Step::Caption, true), (Step::CreatedDate, true)]);
        assert_eq!(outcomes[0].detail, ".");
        assert_eq!(ExifMetadata::load(&current).comment().as_deref(), Some("."));
    }

    #[test]
    fn test_unwritable_container_fails_only_caption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("20230501_100000_anim.gif");
        fs::write(&path, b"GIF89a not much of a picture").unwrap();

        let mut opts = options(dir.path());
        opts.describe = true;
        let registry = CaptionRegistry::new().with(Fixed(vec!["a cat"]));

        let (current, outcomes) = run_once(&opts, &registry, &path);
        let steps: Vec<_> = outcomes.iter().map(|o| (o.step, o.success)).collect();
        assert_eq!(steps, vec![(Step::Caption, false), (Step::CreatedDate, true)]);
        assert_eq!(current, dir.path().join("2023-05-01_10.00.00_anim.gif"));
        assert_eq!(fs::read(&current).unwrap(), b"GIF89a not much of a picture");
    }
}
