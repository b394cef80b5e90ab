//! Status vocabulary shared by every step

use std::fmt;

/// Result of running a single step
///
/// A fatal condition is never an `Outcome`; it travels through
/// [`crate::Abort`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Fully completed
    Done,
    /// Intentionally not performed (dry run, flag, absent prerequisite)
    Skip,
    /// Skipped with an attached reason, rendered as `SKIP <detail>`
    SkipWith(String),
    /// Already in the desired state
    Found,
    /// Performed with a concern that does not block continuation
    Warn,
    /// Aggregate of per-item warnings inside one step
    ProceedWithWarnings,
}

impl Outcome {
    /// Aggregate a list of collected warnings into an outcome
    pub fn from_warnings<T>(warnings: &[T]) -> Self {
        if warnings.is_empty() {
            Self::Done
        } else {
            Self::ProceedWithWarnings
        }
    }

    /// The status token as printed and logged
    pub fn token(&self) -> String {
        match self {
            Self::Done => "DONE".to_string(),
            Self::Skip => "SKIP".to_string(),
            Self::SkipWith(detail) => format!("SKIP {detail}"),
            Self::Found => "FOUND".to_string(),
            Self::Warn => "WARN".to_string(),
            Self::ProceedWithWarnings => "PROCEED_WITH_WARNINGS".to_string(),
        }
    }

    /// Display class of this outcome
    pub fn class(&self) -> StatusClass {
        match self {
            Self::Done | Self::Found | Self::Skip | Self::SkipWith(_) => StatusClass::Success,
            Self::Warn | Self::ProceedWithWarnings => StatusClass::Warning,
        }
    }

    /// Check if the outcome asks for operator attention
    pub fn is_warning(&self) -> bool {
        self.class() == StatusClass::Warning
    }

    /// Check if the step was skipped in any form
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip | Self::SkipWith(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

/// How a status token is rendered. Display only, never control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Warning,
    Failure,
}

/// Classify an arbitrary status token for display
///
/// `DONE`, `FOUND` and every `SKIP` variant are success. `WARN` and
/// `PROCEED_WITH_WARNINGS` are warnings. Anything else renders as failure.
pub fn classify(token: &str) -> StatusClass {
    let upper = token.trim().to_uppercase();
    let head = upper.split_whitespace().next().unwrap_or_default();

    match head {
        "DONE" | "FOUND" | "SKIP" => StatusClass::Success,
        "WARN" | "PROCEED_WITH_WARNINGS" => StatusClass::Warning,
        _ => StatusClass::Failure,
    }
}
