//! Step runner - executes steps strictly in order

use crate::context::StepContext;
use crate::error::Abort;
use crate::types::Outcome;

/// Operation of a single step
pub type StepFn<S> = fn(&mut S, &StepContext<'_>) -> Result<Outcome, Abort>;

/// A named unit of work over a shared state `S`
pub struct Step<S> {
    /// Message key of the label shown in the progress line
    pub label_key: &'static str,
    pub run: StepFn<S>,
}

impl<S> Step<S> {
    pub const fn new(label_key: &'static str, run: StepFn<S>) -> Self {
        Self { label_key, run }
    }
}

/// Outcome of every step that ran
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// `(translated label, outcome)` in execution order
    pub entries: Vec<(String, Outcome)>,
}

impl RunReport {
    /// Check if any step reported a warning-class outcome
    pub fn has_warnings(&self) -> bool {
        self.entries.iter().any(|(_, outcome)| outcome.is_warning())
    }

    /// Number of steps that reported a warning-class outcome
    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, outcome)| outcome.is_warning())
            .count()
    }

    /// Number of steps that ran
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Run `steps` in order against `state`
///
/// Each step is announced as `[N/total] label` before it runs, and its
/// status token is reported after it returns. Non-fatal outcomes never stop
/// the run. An [`Abort`] from any step is returned immediately, leaving the
/// remaining steps unexecuted.
pub fn run_steps<S>(
    steps: &[Step<S>],
    state: &mut S,
    ctx: &StepContext<'_>,
) -> Result<RunReport, Abort> {
    let total = steps.len();
    let mut report = RunReport::default();

    for (index, step) in steps.iter().enumerate() {
        let label = ctx.t(step.label_key, &[]);
        ctx.reporter.step(index + 1, total, &label);

        let outcome = (step.run)(state, ctx)?;

        ctx.reporter.status(&outcome.token());
        report.entries.push((label, outcome));
    }

    Ok(report)
}
