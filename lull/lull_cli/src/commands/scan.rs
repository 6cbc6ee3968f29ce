//! The `scan` command.
//!
//! Parses every markdown file under a directory in the background: one
//! scheduler task per file, run in idle slices from the timer provider.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Serialize;
use tracing::{debug, info, warn};

use lull_markdown::{parse_document, search, TaskLine};
use lull_scheduler::scheduler::{task, BatchScheduler, Submission, Task};
use lull_scheduler::TimerSliceProvider;

use crate::config::LullConfig;

/// Arguments for the scan command
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Directory to scan for markdown files
    pub dir: PathBuf,

    /// Only show tasks whose text contains this, ignoring case
    #[arg(short, long)]
    pub query: Option<String>,

    /// Override the scheduler's low-water mark (milliseconds)
    #[arg(long)]
    pub lower_limit_ms: Option<u64>,

    /// Override the maximum number of matches shown
    #[arg(long)]
    pub limit: Option<usize>,

    /// Print a JSON report instead of text
    #[arg(long)]
    pub json: bool,
}

/// Outcome of parsing one file.
type Parsed = (PathBuf, lull_core::Result<Vec<TaskLine>>);

/// A file that could not be parsed.
#[derive(Debug, Serialize)]
struct FileError {
    path: PathBuf,
    error: String,
}

#[derive(Debug, Serialize)]
struct ScanReport<'a> {
    files: usize,
    tasks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    matches: Vec<&'a TaskLine>,
    errors: Vec<FileError>,
}

/// Implementation of the scan command
pub fn execute(args: &ScanArgs, config: &LullConfig) -> Result<()> {
    let mut config = config.clone();
    if let Some(lower_limit_ms) = args.lower_limit_ms {
        config.scheduler.time_remaining_lower_limit_ms = lower_limit_ms;
    }
    if let Some(limit) = args.limit {
        config.search_result_limit = limit;
    }
    config.validate().context("Invalid configuration")?;

    let files = markdown_files(&args.dir)
        .with_context(|| format!("Failed to list {}", args.dir.display()))?;
    info!(dir = %args.dir.display(), files = files.len(), "Scanning");

    let parsed = parse_in_background(&files, &config)?;

    let mut tasks = Vec::new();
    let mut errors = Vec::new();
    for (path, result) in parsed {
        match result {
            Ok(found) => tasks.extend(found),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping file");
                errors.push(FileError {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }

    let (description, matches) = match args.query.as_deref() {
        Some(query) => {
            let result = search(&tasks, query, config.search_result_limit);
            (Some(result.description), result.matches)
        }
        None => (None, tasks.iter().collect()),
    };

    let report = ScanReport {
        files: files.len(),
        tasks: tasks.len(),
        description,
        matches,
        errors,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, &args.dir);
    }

    Ok(())
}

/// Run one parse task per file through a batch scheduler and wait for the
/// batch to finish.
fn parse_in_background(files: &[PathBuf], config: &LullConfig) -> Result<Vec<Parsed>> {
    let provider = Rc::new(TimerSliceProvider::new(config.timer)?);
    let scheduler = BatchScheduler::with_config(provider.clone(), config.scheduler)?;

    let tasks: Vec<Task<Parsed>> = files
        .iter()
        .cloned()
        .map(|path| task(move || parse_file(path)))
        .collect();

    let results = Rc::new(RefCell::new(None));
    let sink = results.clone();
    scheduler.submit(Submission::new(tasks, move |parsed| {
        *sink.borrow_mut() = Some(parsed);
    }))?;

    let slices = provider.run_until_idle()?;
    let stats = scheduler.stats();
    debug!(slices, ?stats, "Background parse finished");

    let parsed = results.borrow_mut().take();
    parsed.ok_or_else(|| anyhow!("Scan batch ended without delivering results"))
}

fn parse_file(path: PathBuf) -> Parsed {
    let result = fs::read_to_string(&path)
        .map_err(lull_core::Error::from)
        .and_then(|source| Ok(parse_document(&path, &source)?));
    (path, result)
}

/// Every `.md` file under `dir`, sorted by path.
///
/// Hidden entries and symlinked directories are skipped.
fn markdown_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();
            let hidden = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with('.'));
            if hidden {
                continue;
            }
            // Symlinked directories are not followed, so link cycles end.
            if entry.file_type()?.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "md") {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn print_report(report: &ScanReport<'_>, root: &Path) {
    if let Some(description) = &report.description {
        println!("{}", description);
    }

    for task in &report.matches {
        let path = task
            .path
            .as_deref()
            .map(|p| p.strip_prefix(root).unwrap_or(p).display().to_string())
            .unwrap_or_default();
        let status = match task.completion {
            Some(c) => format!("[{}] ", c),
            None => String::new(),
        };
        let time = match (task.start_time, task.end_time) {
            (Some(start), Some(end)) => format!("{} - {} ", start.format("%H:%M"), end.format("%H:%M")),
            (Some(start), None) => format!("{} ", start.format("%H:%M")),
            _ => String::new(),
        };
        println!("{}:{}: {}{}{}", path, task.line, status, time, task.text);
    }

    println!(
        "Scanned {} files, found {} tasks",
        report.files, report.tasks
    );
    for error in &report.errors {
        eprintln!("warning: {}: {}", error.path.display(), error.error);
    }
}
