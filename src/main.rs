mod cli;
mod host;
mod i18n;
mod input;
mod logger;
mod network;
mod patch;
mod paths;
mod progress;
mod runner;
mod secret;
mod state;
mod steps;
mod ui;

use clap::Parser;
use cli::Cli;
use i18n::Catalog;
use input::TerminalReader;
use logger::ConsoleReporter;
use paths::Paths;
use stagekit::{Abort, Reporter, StepContext, Translate};
use state::RunState;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let reporter = ConsoleReporter::new(cli.verbose);

    let catalog = match Catalog::load(cli.lang.code()) {
        Ok(catalog) => catalog,
        Err(err) => {
            reporter.error(&format!("{err:#}"));
            return ExitCode::from(stagekit::EXIT_FAILURE as u8);
        }
    };

    let paths = match Paths::resolve(cli.project_root.as_deref()) {
        Ok(paths) => paths,
        Err(err) => {
            reporter.error(&catalog.t("err.project_root", &[("error", &format!("{err:#}"))]));
            return ExitCode::from(stagekit::EXIT_FAILURE as u8);
        }
    };

    let log_file = cli
        .log_file
        .as_deref()
        .map_or_else(|| paths.default_log_file(), paths::expand);
    if let Err(err) = logger::init_file_logging(&log_file) {
        reporter.warn(&catalog.t("log.unavailable", &[("error", &format!("{err:#}"))]));
    }

    let reader = TerminalReader;
    let ctx = StepContext::new(&reporter, &catalog, &reader);

    ui::header(&ctx.t("app.title", &[]));
    ctx.info("log.file_path", &[("path", &log_file.display().to_string())]);
    ctx.debug("log.start", &[("version", env!("CARGO_PKG_VERSION"))]);

    let mut state = RunState::from_cli(&cli, paths, log_file);
    match run(&mut state, &ctx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(abort) => {
            reporter.error(&abort.message);
            log::debug!("Exiting with code {}", abort.code);
            ExitCode::from(abort.exit_code())
        }
    }
}

fn run(state: &mut RunState, ctx: &StepContext<'_>) -> Result<(), Abort> {
    state.validate(ctx.i18n)?;

    if let Ok(json) = serde_json::to_string(&*state) {
        log::debug!("Run state: {json}");
    }
    if state.dry_run {
        ctx.info("run.dry_run", &[]);
    }

    let report = stagekit::run_steps(&steps::plan(), state, ctx)?;

    if report.has_warnings() {
        ctx.warn("run.completed_warnings", &[("count", &report.warning_count().to_string())]);
    } else {
        ctx.info("run.completed", &[]);
    }
    Ok(())
}
