//! AppArmor removal

use crate::runner::{Shell, SystemShell};
use crate::state::RunState;
use stagekit::{Abort, Answer, Outcome, StepContext};
use std::path::Path;

const INIT_SCRIPT: &str = "/etc/init.d/apparmor";

const REMOVAL: &[&[&str]] = &[
    &[INIT_SCRIPT, "stop"],
    &["update-rc.d", "-f", "apparmor", "remove"],
    &["apt-get", "remove", "-y", "apparmor"],
];

pub fn run(state: &mut RunState, ctx: &StepContext<'_>) -> Result<Outcome, Abort> {
    handle_apparmor(state, ctx, &SystemShell, Path::new(INIT_SCRIPT))
}

fn is_present(shell: &dyn Shell, init_script: &Path) -> bool {
    init_script.exists()
        || shell.which("apparmor_status").is_some()
        || shell
            .output("systemctl", &["list-unit-files", "apparmor.service"])
            .is_ok_and(|out| out.stdout.contains("apparmor.service"))
}

pub fn handle_apparmor(
    state: &RunState,
    ctx: &StepContext<'_>,
    shell: &dyn Shell,
    init_script: &Path,
) -> Result<Outcome, Abort> {
    if state.dry_run || state.skip_checks {
        ctx.info("apparmor.skip", &[]);
        return Ok(Outcome::Skip);
    }
    if !is_present(shell, init_script) {
        ctx.info("apparmor.not_found", &[]);
        return Ok(Outcome::Skip);
    }

    if !state.auto_confirm {
        match ctx.confirm("apparmor.prompt") {
            Answer::Yes => {}
            Answer::No => {
                ctx.info("apparmor.decline", &[]);
                return Ok(Outcome::Warn);
            }
            Answer::Interrupted => {
                return Err(Abort::interrupted(ctx.t("apparmor.abort", &[])));
            }
        }
    }

    for (cmd, args) in REMOVAL.iter().filter_map(|c| c.split_first()) {
        let command = std::iter::once(*cmd).chain(args.iter().copied()).collect::<Vec<_>>().join(" ");
        ctx.info("apparmor.cmd", &[("command", &command)]);

        let code = shell.status(cmd, args).map_err(|err| {
            Abort::failure(ctx.t("apparmor.fail", &[("command", &command), ("code", &format!("{err:#}"))]))
        })?;
        if code != 0 {
            let message = ctx.t("apparmor.fail", &[("command", &command), ("code", &code.to_string())]);
            return Err(Abort::with_code(code, message));
        }
    }

    ctx.info("apparmor.removed", &[]);
    Ok(Outcome::Done)
}
