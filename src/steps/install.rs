//! Hand over to `install.py`

use super::configs;
use crate::runner::{Shell, SystemShell};
use crate::state::RunState;
use stagekit::{Abort, Outcome, StepContext};
use std::path::{Path, PathBuf};

pub const SCRIPT: &str = "install.py";

pub fn run(state: &mut RunState, ctx: &StepContext<'_>) -> Result<Outcome, Abort> {
    run_install(state, ctx, &SystemShell)
}

/// Prepend `dir` to a colon-separated search path
fn prepend(dir: &Path, current: Option<String>) -> String {
    match current.filter(|c| !c.is_empty()) {
        Some(current) => format!("{}:{current}", dir.display()),
        None => dir.display().to_string(),
    }
}

/// Environment that activates the virtualenv for a child process
pub fn venv_env(state: &RunState) -> Vec<(String, String)> {
    let mut envs = Vec::new();
    if let Some(bin) = &state.venv_bin {
        envs.push(("PATH".to_string(), prepend(bin, std::env::var("PATH").ok())));
    }
    if let Some(venv) = &state.venv_path {
        envs.push(("VIRTUAL_ENV".to_string(), venv.display().to_string()));
    }
    if let Some(site) = &state.venv_site_packages {
        envs.push(("PYTHONPATH".to_string(), prepend(site, std::env::var("PYTHONPATH").ok())));
    }
    envs
}

pub fn run_install(state: &mut RunState, ctx: &StepContext<'_>, shell: &dyn Shell) -> Result<Outcome, Abort> {
    if state.dry_run || state.skip_install {
        ctx.info("install.skip", &[]);
        return Ok(Outcome::Skip);
    }

    if !state.auto_confirm && !ctx.confirm("install.prompt").is_yes() {
        ctx.info("install.decline", &[]);
        return Ok(Outcome::Skip);
    }

    let script = state.paths.script_dir.join(SCRIPT);
    let script_path = script.display().to_string();
    if !script.exists() {
        return Err(Abort::failure(ctx.t("install.missing", &[("path", &script_path)])));
    }

    ctx.info("install.start", &[]);
    let python = PathBuf::from(configs::interpreter(state));
    let code = shell
        .status_env(&python, &[&script_path, "--confirm-all"], &venv_env(state))
        .map_err(|err| Abort::failure(ctx.t("install.fail", &[("code", &format!("{err:#}"))])))?;
    if code != 0 {
        return Err(Abort::with_code(code, ctx.t("install.fail", &[("code", &code.to_string())])));
    }

    ctx.info("install.done", &[]);
    state.install_executed = true;
    Ok(Outcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeShell;
    use crate::steps::harness::Harness;
    use std::fs;

    fn with_script(answers: &[&str]) -> Harness {
        let mut h = Harness::with_answers(answers.iter().copied());
        fs::create_dir_all(&h.state.paths.script_dir).unwrap();
        fs::write(h.state.paths.script_dir.join(SCRIPT), "").unwrap();
        let venv = h.state.paths.venv_dir();
        h.state.venv_python = Some(venv.join("bin").join("python"));
        h.state.venv_bin = Some(venv.join("bin"));
        h.state.venv_path = Some(venv.clone());
        h.state.venv_site_packages = Some(venv.join("lib/python3.10/site-packages"));
        h
    }

    #[test]
    fn test_runs_with_venv_environment() {
        let mut h = with_script(&["y"]);
        let shell = FakeShell::new();

        let outcome = h.with_ctx(|state, ctx| run_install(state, ctx, &shell)).unwrap();
        assert_eq!(outcome, Outcome::Done);
        assert!(h.state.install_executed);

        let venv = h.state.paths.venv_dir();
        assert!(shell.calls()[0].ends_with("script/install.py --confirm-all"));
        assert_eq!(shell.last_env("VIRTUAL_ENV"), Some(venv.display().to_string()));
        assert!(shell.last_env("PATH").unwrap().starts_with(&venv.join("bin").display().to_string()));
        assert!(shell.last_env("PYTHONPATH").unwrap().contains("site-packages"));
    }

    #[test]
    fn test_decline_and_interrupt_skip() {
        let mut h = with_script(&["n"]);
        let shell = FakeShell::new();
        assert_eq!(h.with_ctx(|state, ctx| run_install(state, ctx, &shell)).unwrap(), Outcome::Skip);

        let mut h = Harness::interrupted();
        assert_eq!(h.with_ctx(|state, ctx| run_install(state, ctx, &shell)).unwrap(), Outcome::Skip);
        assert!(shell.calls().is_empty());
        assert!(!h.state.install_executed);
    }

    #[test]
    fn test_failure_propagates_code() {
        let mut h = with_script(&[]);
        h.state.auto_confirm = true;
        let shell = FakeShell::new().respond(&h.state.venv_python.as_ref().unwrap().display().to_string(), 9, "");
        let abort = h.with_ctx(|state, ctx| run_install(state, ctx, &shell)).unwrap_err();
        assert_eq!(abort.code, 9);
        assert!(!h.state.install_executed);
    }

    #[test]
    fn test_missing_script_aborts() {
        let mut h = Harness::new();
        h.state.auto_confirm = true;
        let shell = FakeShell::new();
        let abort = h.with_ctx(|state, ctx| run_install(state, ctx, &shell)).unwrap_err();
        assert_eq!(abort.code, stagekit::EXIT_FAILURE);
    }

    #[test]
    fn test_skip_install_flag() {
        let mut h = with_script(&[]);
        h.state.skip_install = true;
        let shell = FakeShell::new();
        assert_eq!(h.with_ctx(|state, ctx| run_install(state, ctx, &shell)).unwrap(), Outcome::Skip);
        assert!(h.reader.prompts().is_empty());
    }

    #[test]
    fn test_prepend() {
        assert_eq!(prepend(Path::new("/v/bin"), Some("/usr/bin".into())), "/v/bin:/usr/bin");
        assert_eq!(prepend(Path::new("/v/bin"), Some(String::new())), "/v/bin");
        assert_eq!(prepend(Path::new("/v/bin"), None), "/v/bin");
    }
}
