//! Generate the configuration documents with `create_configs.py`

use crate::runner::{Shell, SystemShell};
use crate::state::RunState;
use stagekit::{Abort, Outcome, StepContext};
use std::fs;
use std::path::Path;

pub const SCRIPT: &str = "create_configs.py";

pub fn run(state: &mut RunState, ctx: &StepContext<'_>) -> Result<Outcome, Abort> {
    create_configs(state, ctx, &SystemShell)
}

/// Interpreter for the helper scripts: the virtualenv's, else the one found
/// by the python step
pub fn interpreter(state: &RunState) -> String {
    state
        .venv_python
        .as_ref()
        .or(state.python.as_ref())
        .map_or_else(|| "python3".to_string(), |p| p.to_string_lossy().into_owned())
}

fn has_entries(dir: &Path) -> bool {
    fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_some())
}

pub fn create_configs(state: &RunState, ctx: &StepContext<'_>, shell: &dyn Shell) -> Result<Outcome, Abort> {
    let configs_dir = state.paths.configs_dir.display().to_string();
    if state.dry_run {
        ctx.info("configs.dry_run", &[("path", &configs_dir)]);
        return Ok(Outcome::Skip);
    }

    let script = state.paths.script_dir.join(SCRIPT);
    let script_path = script.display().to_string();
    if !script.exists() {
        return Err(Abort::failure(ctx.t("configs.missing_script", &[("path", &script_path)])));
    }

    ctx.info("configs.run", &[("path", &script_path)]);
    match shell.status(&interpreter(state), &[&script_path]) {
        Ok(0) => {}
        Ok(code) => {
            return Err(Abort::with_code(code, ctx.t("configs.run_fail", &[("code", &code.to_string())])));
        }
        Err(_) => return Err(Abort::failure(ctx.t("configs.python_missing", &[]))),
    }

    if !has_entries(&state.paths.configs_dir) {
        return Err(Abort::failure(ctx.t("configs.no_output", &[("path", &configs_dir)])));
    }

    ctx.info("configs.success", &[("path", &configs_dir)]);
    Ok(Outcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeShell;
    use crate::steps::harness::Harness;
    use std::path::PathBuf;

    fn with_script() -> Harness {
        let h = Harness::new();
        fs::create_dir_all(&h.state.paths.script_dir).unwrap();
        fs::write(h.state.paths.script_dir.join(SCRIPT), "print('ok')\n").unwrap();
        h
    }

    #[test]
    fn test_generates_configs() {
        let mut h = with_script();
        fs::create_dir_all(&h.state.paths.configs_dir).unwrap();
        fs::write(h.state.paths.configs_dir.join("global.yaml"), "domain: \"\"\n").unwrap();
        h.state.venv_python = Some(PathBuf::from("/srv/.venv/bin/python"));
        let shell = FakeShell::new();

        let outcome = h.with_ctx(|state, ctx| create_configs(state, ctx, &shell)).unwrap();
        assert_eq!(outcome, Outcome::Done);
        assert!(shell.calls()[0].starts_with("/srv/.venv/bin/python "));
        assert!(shell.calls()[0].ends_with("script/create_configs.py"));
    }

    #[test]
    fn test_missing_script_aborts() {
        let mut h = Harness::new();
        let shell = FakeShell::new();
        let abort = h.with_ctx(|state, ctx| create_configs(state, ctx, &shell)).unwrap_err();
        assert_eq!(abort.code, stagekit::EXIT_FAILURE);
        assert!(shell.calls().is_empty());
    }

    #[test]
    fn test_script_exit_code_propagates() {
        let mut h = with_script();
        let shell = FakeShell::new().respond("python3", 5, "");
        let abort = h.with_ctx(|state, ctx| create_configs(state, ctx, &shell)).unwrap_err();
        assert_eq!(abort.code, 5);
    }

    #[test]
    fn test_empty_output_aborts() {
        let mut h = with_script();
        fs::create_dir_all(&h.state.paths.configs_dir).unwrap();
        let shell = FakeShell::new();
        let abort = h.with_ctx(|state, ctx| create_configs(state, ctx, &shell)).unwrap_err();
        assert!(abort.message.starts_with("configs.no_output"));
    }

    #[test]
    fn test_interpreter_preference() {
        let mut h = Harness::new();
        assert_eq!(interpreter(&h.state), "python3");
        h.state.python = Some(PathBuf::from("/usr/bin/python3.11"));
        assert_eq!(interpreter(&h.state), "/usr/bin/python3.11");
        h.state.venv_python = Some(PathBuf::from("/v/bin/python"));
        assert_eq!(interpreter(&h.state), "/v/bin/python");
    }

    #[test]
    fn test_dry_run_skips() {
        let mut h = Harness::dry_run();
        let shell = FakeShell::new();
        assert_eq!(h.with_ctx(|state, ctx| create_configs(state, ctx, &shell)).unwrap(), Outcome::Skip);
    }
}
