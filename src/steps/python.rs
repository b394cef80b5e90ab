//! Interpreter discovery for the helper scripts

use crate::runner;
use crate::state::RunState;
use stagekit::{Abort, Outcome, StepContext};
use std::path::{Path, PathBuf};

/// Oldest interpreter the helper scripts run on
pub const MIN_VERSION: Version = Version(3, 8, 0);

const VERSION_PROBE: &str = "import sys; print('.'.join(map(str, sys.version_info[:3])))";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version(pub u32, pub u32, pub u32);

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

/// Parse `3.11.4` (or `3.11`) from the first output line
pub fn parse_version(output: &str) -> Option<Version> {
    let line = output.lines().next()?.trim();
    let mut parts = line.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let micro = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    Some(Version(major, minor, micro))
}

/// Names tried in order, newest first
pub fn candidate_names() -> Vec<String> {
    (8..=13)
        .rev()
        .map(|minor| format!("python3.{minor}"))
        .chain(["python3".to_string(), "python".to_string()])
        .collect()
}

fn probe_version(interpreter: &Path) -> Option<Version> {
    let out = runner::run_output(&interpreter.to_string_lossy(), &["-c", VERSION_PROBE]).ok()?;
    if !out.success() {
        log::debug!("{} failed: {}", interpreter.display(), out.error_text());
        return None;
    }
    parse_version(&out.stdout)
}

pub fn run(state: &mut RunState, ctx: &StepContext<'_>) -> Result<Outcome, Abort> {
    find_interpreter(state, ctx, &runner::find_in_path, &probe_version)
}

/// Pick the first interpreter on `PATH` that is new enough
pub fn find_interpreter(
    state: &mut RunState,
    ctx: &StepContext<'_>,
    locate: &dyn Fn(&str) -> Option<PathBuf>,
    version_of: &dyn Fn(&Path) -> Option<Version>,
) -> Result<Outcome, Abort> {
    let required = MIN_VERSION.to_string();
    ctx.info("python.search.start", &[("required", &required)]);

    let mut seen: Vec<PathBuf> = Vec::new();
    for name in candidate_names() {
        let Some(path) = locate(&name) else { continue };
        if seen.contains(&path) {
            continue;
        }
        seen.push(path.clone());

        let Some(version) = version_of(&path) else { continue };
        let shown = path.display().to_string();
        ctx.debug(
            "python.search.candidate",
            &[("candidate", &shown), ("version", &version.to_string())],
        );

        if version >= MIN_VERSION {
            ctx.info("python.found", &[("candidate", &shown), ("version", &version.to_string())]);
            state.python = Some(path);
            state.python_version = Some(version.to_string());
            return Ok(Outcome::Found);
        }
    }

    ctx.info("python.install.instructions", &[("required", &required)]);
    Err(Abort::environment(ctx.t("python.search.failed", &[("required", &required)])))
}
