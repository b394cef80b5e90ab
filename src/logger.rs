//! Console and log-file reporting
//!
//! The log file receives every message down to debug level through the
//! `log` facade. The console gets the colored rendering from [`crate::ui`];
//! debug lines reach it only in verbose mode.

use crate::ui;
use anyhow::{Context, Result};
use chrono::Local;
use env_logger::Target;
use log::{Level, LevelFilter};
use stagekit::Reporter;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Open (append) `path` and route this crate's log records into it
pub fn init_file_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    env_logger::Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_CRATE_NAME"), LevelFilter::Debug)
        .target(Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                level_name(record.level()),
                record.args()
            )
        })
        .try_init()
        .context("Logger already initialized")
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug | Level::Trace => "DEBUG",
    }
}

/// [`Reporter`] printing to the terminal and logging to the file
#[derive(Debug, Clone, Copy)]
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Reporter for ConsoleReporter {
    fn info(&self, msg: &str) {
        log::info!("{msg}");
        ui::info(msg);
    }

    fn debug(&self, msg: &str) {
        log::debug!("{msg}");
        if self.verbose {
            ui::debug(msg);
        }
    }

    fn warn(&self, msg: &str) {
        log::warn!("⚠ {msg}");
        ui::warn(msg);
    }

    fn error(&self, msg: &str) {
        log::error!("✖ {msg}");
        ui::error(msg);
    }

    fn step(&self, index: usize, total: usize, label: &str) {
        log::info!("⏳ [{index}/{total}] {label}");
        ui::step(index, total, label);
    }

    fn status(&self, token: &str) {
        log::info!("✔ {token}");
        ui::status(token);
    }
}
