//! Progress indicators for long-running child processes.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Start a spinner with `msg`
///
/// Hidden when stdout is not a terminal so log captures stay clean.
pub fn spinner(msg: &str) -> ProgressBar {
    if !console::user_attended() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Stop the spinner, leaving a success line
pub fn finish_success(pb: &ProgressBar, msg: &str) {
    pb.finish_with_message(format!("{} {msg}", "✓".green()));
}

/// Stop the spinner, leaving a warning line
pub fn finish_warn(pb: &ProgressBar, msg: &str) {
    pb.finish_with_message(format!("{} {msg}", "⚠".yellow()));
}
