use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::PhotoError;

/// Caption verbosity, serialized as 0/1/2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DetailLevel {
    Brief,
    #[default]
    Standard,
    Full,
}

impl TryFrom<u8> for DetailLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DetailLevel::Brief),
            1 => Ok(DetailLevel::Standard),
            2 => Ok(DetailLevel::Full),
            other => Err(format!("detail level must be 0, 1 or 2, got {other}")),
        }
    }
}

impl From<DetailLevel> for u8 {
    fn from(level: DetailLevel) -> u8 {
        match level {
            DetailLevel::Brief => 0,
            DetailLevel::Standard => 1,
            DetailLevel::Full => 2,
        }
    }
}

/// One image-to-text backend.
pub trait Captioner: Send {
    fn name(&self) -> &str;

    fn describe(&self, image: &Path, level: DetailLevel) -> anyhow::Result<Vec<String>>;
}

/// The captioning backends of one run, called in registration order.
#[derive(Default)]
pub struct CaptionRegistry {
    backends: Vec<Box<dyn Captioner>>,
}

impl CaptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, backend: Box<dyn Captioner>) {
        info!("Registered caption backend [{}]", backend.name());
        self.backends.push(backend);
    }

    pub fn with(mut self, backend: impl Captioner + 'static) -> Self {
        self.register(Box::new(backend));
        self
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Descriptions from every backend, flattened. A failing backend is
    /// logged and contributes nothing.
    pub fn describe(&self, image: &Path, level: DetailLevel) -> Vec<String> {
        let mut descriptions = Vec::new();
        for backend in &self.backends {
            match backend.describe(image, level) {
                Ok(items) => descriptions.extend(
                    items
                        .into_iter()
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty()),
                ),
                Err(e) => {
                    let err = PhotoError::CaptionBackend {
                        backend: backend.name().to_string(),
                        reason: format!("{e:#}"),
                    };
                    warn!("{} (image [{}])", err, image.display());
                }
            }
        }
        info!("Descriptions for [{}]: {:?}", image.display(), descriptions);
        descriptions
    }
}

/// Runs `<program> [args...] <image> <level>`; each non-empty line of
/// stdout is one description.
#[derive(Debug, Clone)]
pub struct CommandCaptioner {
    name: String,
    program: PathBuf,
    args: Vec<String>,
}

impl CommandCaptioner {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        let program = program.into();
        let name = program
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("command")
            .to_string();
        Self { name, program, args }
    }

    /// Parse a shell-like `program arg1 arg2` string (whitespace separated).
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts.map(str::to_string).collect()))
    }
}

impl Captioner for CommandCaptioner {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self, image: &Path, level: DetailLevel) -> anyhow::Result<Vec<String>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(image)
            .arg(u8::from(level).to_string())
            .output()
            .with_context(|| format!("failed to start [{}]", self.program.display()))?;

        if !output.status.success() {
            bail!(
                "[{}] exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Join new descriptions into a comment, dropping any that already appear
/// (as a substring) in the existing comment.
pub fn compose_comment(descriptions: &[String], existing: Option<&str>) -> String {
    let kept: Vec<&str> = match existing.filter(|c| !c.is_empty()) {
        Some(comment) => descriptions
            .iter()
            .map(String::as_str)
            .filter(|d| !comment.contains(d))
            .collect(),
        None => descriptions.iter().map(String::as_str).collect(),
    };
    format!("{}.", kept.join(". "))
}
