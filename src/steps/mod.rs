//! Installer steps, in run order
//!
//! Every step has the [`stagekit::StepFn`] shape and honors `dry_run` and
//! its own skip flags itself, so the numbering of the progress lines never
//! changes between runs.

pub mod apparmor;
pub mod bench;
pub mod capacity;
pub mod certs;
pub mod configs;
pub mod docker;
pub mod docker_root;
pub mod install;
pub mod os;
pub mod packages;
pub mod python;
pub mod summary;
pub mod venv;

use crate::patch;
use crate::state::RunState;
use stagekit::{Abort, Answer, Outcome, Step, StepContext};

/// The full run
pub fn plan() -> Vec<Step<RunState>> {
    vec![
        Step::new("step.os", os::run),
        Step::new("step.packages", packages::run),
        Step::new("step.python", python::run),
        Step::new("step.capacity", capacity::run),
        Step::new("step.bench", bench::run),
        Step::new("step.apparmor", apparmor::run),
        Step::new("step.docker", docker::run),
        Step::new("step.venv", venv::run),
        Step::new("step.certs", certs::run),
        Step::new("step.configs", configs::run),
        Step::new("step.patch", patch::run),
        Step::new("step.install", install::run),
        Step::new("step.summary", summary::run),
    ]
}

/// Turn collected check warnings into an outcome
///
/// No warnings is `DONE`. Otherwise the run proceeds with
/// `PROCEED_WITH_WARNINGS` when auto-confirm is on or the operator agrees;
/// a decline aborts with code 2 and an interrupt with code 130.
pub fn decide_on_warnings(
    state: &RunState,
    ctx: &StepContext<'_>,
    warnings: &[String],
    prompt_key: &str,
) -> Result<Outcome, Abort> {
    if warnings.is_empty() {
        return Ok(Outcome::Done);
    }
    if state.auto_confirm {
        ctx.info("common.auto_continue", &[]);
        return Ok(Outcome::ProceedWithWarnings);
    }
    ask_to_continue(ctx, prompt_key).map(|()| Outcome::ProceedWithWarnings)
}

/// Ask a yes/no question where anything but yes stops the run
pub fn ask_to_continue(ctx: &StepContext<'_>, prompt_key: &str) -> Result<(), Abort> {
    match ctx.confirm(prompt_key) {
        Answer::Yes => Ok(()),
        Answer::No => Err(Abort::failure(ctx.t("common.declined", &[]))),
        Answer::Interrupted => Err(Abort::interrupted(ctx.t("common.interrupted", &[]))),
    }
}
