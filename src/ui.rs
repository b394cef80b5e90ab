use colored::Colorize;
use stagekit::{StatusClass, classify};

/// Print an info message
pub fn info(msg: &str) {
    println!("{msg}");
}

/// Print a debug message
pub fn debug(msg: &str) {
    println!("{}", msg.dimmed());
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{}", format!("⚠ {msg}").yellow());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", format!("✖ {msg}").red());
}

/// Print a step indicator
pub fn step(num: usize, total: usize, label: &str) {
    println!("{}", format!("⏳ [{num}/{total}] {label}").cyan());
}

/// Print the status token a step returned
pub fn status(token: &str) {
    let line = format!("✔ {token}");
    let colored = match classify(token) {
        StatusClass::Success => line.green(),
        StatusClass::Warning => line.yellow(),
        StatusClass::Failure => line.red(),
    };
    println!("{colored}");
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}
