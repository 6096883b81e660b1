use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use photodate_core::{
    CancellationToken, CaptionRegistry, CommandCaptioner, DetailLevel, Event, ProcessOptions,
    Report, Severity,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "photodate", version, about = "Date-stamp, describe and sort photos by when they were taken")]
struct Cli {
    /// Directory containing the photos
    source: Option<PathBuf>,

    /// Load options from a JSON file; flags given here override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Destination root for --move / --copy
    #[arg(short, long)]
    dest: Option<PathBuf>,

    /// Move files into <dest>/YYYY[/MM-Month]
    #[arg(long = "move", conflicts_with = "copy")]
    move_files: bool,

    /// Copy files into <dest>/YYYY[/MM-Month]
    #[arg(long)]
    copy: bool,

    /// Add a month folder below the year
    #[arg(long)]
    month_folder: bool,

    /// Do not rename files or reset their times
    #[arg(long)]
    no_created_date: bool,

    /// Only process the top-level directory
    #[arg(long)]
    no_recurse: bool,

    /// Write a description into the EXIF comment
    #[arg(long)]
    describe: bool,

    /// Description detail: 0 brief, 1 standard, 2 full
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=2))]
    detail_level: Option<u8>,

    /// Captioning command, called as `<cmd> <image> <level>`; repeatable
    #[arg(long = "caption-cmd")]
    caption_cmds: Vec<String>,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> anyhow::Result<ProcessOptions> {
        let mut options = match (&self.config, &self.source) {
            (Some(config), _) => ProcessOptions::load(config)?,
            (None, Some(source)) => ProcessOptions::new(source),
            (None, None) => bail!("a source directory or --config is required"),
        };

        if let Some(source) = &self.source {
            options.source = source.clone();
        }
        if let Some(dest) = &self.dest {
            options.destination = Some(dest.clone());
        }
        if self.move_files {
            options.move_files = true;
            options.copy_files = false;
        }
        if self.copy {
            options.copy_files = true;
            options.move_files = false;
        }
        if self.month_folder {
            options.month_folder = true;
        }
        if self.no_created_date {
            options.created_date = false;
        }
        if self.no_recurse {
            options.recurse = false;
        }
        if self.describe {
            options.describe = true;
        }
        if let Some(level) = self.detail_level {
            options.detail_level = DetailLevel::try_from(level).map_err(anyhow::Error::msg)?;
        }
        Ok(options)
    }

    fn captioners(&self) -> anyhow::Result<CaptionRegistry> {
        let mut registry = CaptionRegistry::new();
        for command in &self.caption_cmds {
            let captioner = CommandCaptioner::from_command_line(command)
                .with_context(|| format!("invalid caption command [{command}]"))?;
            registry.register(Box::new(captioner));
        }
        Ok(registry)
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

/// Print one report line above the bar. A hidden bar (stderr is not a
/// terminal) draws nothing, so headers are printed as plain lines too.
fn emit_report<W: Write>(pb: &ProgressBar, out: &mut W, report: &Report) {
    let line = match report.severity {
        Severity::Header => {
            pb.set_message(report.message.clone());
            if !pb.is_hidden() {
                return;
            }
            report.message.clone()
        }
        Severity::Info => report.message.clone(),
        Severity::Error => format!("ERROR: {}", report.message),
    };
    pb.suspend(|| {
        let _ = writeln!(out, "{line}");
    });
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let t_total = std::time::Instant::now();

    let options = cli.options()?;
    options.validate()?;
    let captioners = cli.captioners()?;
    if options.describe && captioners.is_empty() {
        warn!("--describe without --caption-cmd: existing EXIF comments will be replaced with '.'");
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {pos}/{len} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(200));

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted, finishing the current file...");
        handler_token.cancel();
    })?;

    let events_pb = pb.clone();
    let worker = photodate_core::worker::spawn_with_token(options, captioners, token, move |event| match event {
        Event::Report(report) => emit_report(&events_pb, &mut std::io::stderr(), &report),
        Event::Progress(progress) => {
            events_pb.set_length(progress.total);
            events_pb.set_position(progress.current);
        }
    });

    let result = worker.join();
    pb.finish_and_clear();
    let result = result?;

    eprintln!(
        "Done! {} files, {} processed, {} could not be read, {} failed steps ({:.2}s)",
        result.total_files,
        result.processed,
        result.failed_files,
        result.failed_steps,
        t_total.elapsed().as_secs_f64()
    );
    if result.cancelled {
        eprintln!("Cancelled: {} files left untouched", result.not_processed);
    }

    Ok(())
}
