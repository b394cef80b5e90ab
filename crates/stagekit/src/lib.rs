//! # Stagekit
//!
//! Building blocks for a strictly sequential, staged installer run.
//!
//! ## Core Concepts
//!
//! - **Outcome**: the closed status vocabulary every step reports
//!   (`DONE`, `SKIP`, `SKIP <detail>`, `FOUND`, `WARN`, `PROCEED_WITH_WARNINGS`)
//! - **Abort**: the fatal channel; carries a process exit code to the top
//! - **Step**: a translated label plus an operation over a shared state
//! - **Runner**: announces, invokes and reports each step in order
//!
//! ## Example
//!
//! ```
//! use stagekit::testing::{KeyTranslator, Level, RecordingReporter, ScriptedReader};
//! use stagekit::{Abort, Outcome, Step, StepContext, run_steps};
//!
//! struct State {
//!     dry_run: bool,
//! }
//!
//! fn hello(state: &mut State, ctx: &StepContext<'_>) -> Result<Outcome, Abort> {
//!     if state.dry_run {
//!         return Ok(Outcome::Skip);
//!     }
//!     ctx.info("hello.done", &[]);
//!     Ok(Outcome::Done)
//! }
//!
//! # fn main() -> Result<(), Abort> {
//! let reporter = RecordingReporter::new();
//! let reader = ScriptedReader::default();
//! let ctx = StepContext::new(&reporter, &KeyTranslator, &reader);
//!
//! let steps = [Step::new("step.hello", hello)];
//! let report = run_steps(&steps, &mut State { dry_run: false }, &ctx)?;
//!
//! assert!(!report.has_warnings());
//! assert_eq!(reporter.messages(Level::Step), ["[1/1] step.hello"]);
//! assert_eq!(reporter.messages(Level::Status), ["DONE"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`Reporter`]: leveled logging, step announcements, status lines
//! - [`Translate`]: message-key lookup with named parameters
//! - [`LineReader`]: one line of operator input
//!
//! Test doubles for all three live in [`testing`].

pub mod confirm;
pub mod context;
pub mod error;
pub mod executor;
pub mod testing;
pub mod types;

// Re-export main types at crate root
pub use confirm::{AFFIRMATIVE, Answer, confirm, is_affirmative};
pub use context::{LineReader, Params, Reporter, StepContext, Translate};
pub use error::{
    Abort, EXIT_ENVIRONMENT, EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_VALIDATION,
};
pub use executor::{RunReport, Step, StepFn, run_steps};
pub use types::{Outcome, StatusClass, classify};
