//! Docker service and swarm bootstrap

use crate::runner::{Shell, SystemShell};
use crate::state::RunState;
use stagekit::{Abort, Outcome, StepContext};

/// How a check ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ensured {
    Found,
    Started,
    Failed,
}

pub fn run(state: &mut RunState, ctx: &StepContext<'_>) -> Result<Outcome, Abort> {
    ensure_docker(state, ctx, &SystemShell)
}

pub fn ensure_docker(state: &RunState, ctx: &StepContext<'_>, shell: &dyn Shell) -> Result<Outcome, Abort> {
    if state.dry_run {
        ctx.info("docker.service.dry_run", &[]);
        return Ok(Outcome::Skip);
    }

    let Some(docker) = shell.which("docker") else {
        ctx.info("docker.service.hint", &[]);
        return Err(Abort::failure(ctx.t("docker.service.missing_binary", &[])));
    };
    let docker = docker.to_string_lossy().into_owned();
    ctx.info("docker.service.path", &[("path", &docker)]);

    match ensure_service(ctx, shell) {
        Ensured::Failed => return Err(Abort::failure(ctx.t("docker.service.fail", &[]))),
        Ensured::Started => ctx.info("docker.service.started", &[]),
        Ensured::Found => ctx.info("docker.service.active", &[]),
    }

    match shell.output(&docker, &["--version"]) {
        Ok(out) if out.success() => {
            ctx.info("docker.service.version", &[("version", out.stdout.trim())]);
        }
        Ok(out) => {
            ctx.warn("docker.service.version_fail", &[("code", &out.exit_code().to_string())]);
        }
        Err(err) => {
            ctx.warn("docker.service.version_error", &[("error", &format!("{err:#}"))]);
        }
    }

    match ensure_swarm(ctx, shell, &docker) {
        Ensured::Failed => Err(Abort::failure(ctx.t("docker.swarm.fail", &[]))),
        Ensured::Started => {
            ctx.info("docker.swarm.inited", &[]);
            Ok(Outcome::Done)
        }
        Ensured::Found => {
            ctx.info("docker.swarm.already", &[]);
            Ok(Outcome::Done)
        }
    }
}

fn systemctl_is_active(shell: &dyn Shell) -> bool {
    shell
        .output("systemctl", &["is-active", "docker"])
        .is_ok_and(|out| out.success() && out.stdout.trim() == "active")
}

/// Run a command, logging instead of failing
fn run_logged(ctx: &StepContext<'_>, shell: &dyn Shell, cmd: &str, args: &[&str]) -> bool {
    let command = std::iter::once(cmd).chain(args.iter().copied()).collect::<Vec<_>>().join(" ");
    match shell.status(cmd, args) {
        Ok(0) => {
            ctx.debug("docker.service.cmd_ok", &[("command", &command)]);
            true
        }
        Ok(code) => {
            ctx.warn("docker.service.cmd_fail", &[("command", &command), ("code", &code.to_string())]);
            false
        }
        Err(_) => {
            ctx.warn("docker.service.cmd_missing", &[("command", cmd)]);
            false
        }
    }
}

fn ensure_service(ctx: &StepContext<'_>, shell: &dyn Shell) -> Ensured {
    if shell.which("systemctl").is_some() {
        if systemctl_is_active(shell) {
            return Ensured::Found;
        }
        ctx.info("docker.service.systemctl_start", &[]);
        if run_logged(ctx, shell, "systemctl", &["enable", "docker"])
            && run_logged(ctx, shell, "systemctl", &["start", "docker"])
            && systemctl_is_active(shell)
        {
            return Ensured::Started;
        }
        ctx.warn("docker.service.systemctl_failed", &[]);
    }

    if shell.which("service").is_some() {
        ctx.info("docker.service.service_start", &[]);
        if run_logged(ctx, shell, "service", &["docker", "start"]) {
            return Ensured::Started;
        }
        ctx.warn("docker.service.service_failed", &[]);
    }

    Ensured::Failed
}

fn ensure_swarm(ctx: &StepContext<'_>, shell: &dyn Shell, docker: &str) -> Ensured {
    let swarm_state = match shell.output(docker, &["info", "--format", "{{.Swarm.LocalNodeState}}"]) {
        Ok(out) if out.success() => out.stdout.trim().to_lowercase(),
        Ok(out) => {
            ctx.warn("docker.swarm.state_fail", &[("code", &out.exit_code().to_string())]);
            return Ensured::Failed;
        }
        Err(err) => {
            ctx.warn("docker.swarm.state_error", &[("error", &format!("{err:#}"))]);
            return Ensured::Failed;
        }
    };

    if matches!(swarm_state.as_str(), "active" | "locked") {
        return Ensured::Found;
    }

    ctx.info("docker.swarm.init", &[]);
    if run_logged(ctx, shell, docker, &["swarm", "init"]) {
        Ensured::Started
    } else {
        ctx.warn("docker.swarm.init_fail", &[]);
        Ensured::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeShell;
    use crate::steps::harness::Harness;

    fn ensure(shell: &FakeShell) -> (Result<Outcome, Abort>, Harness) {
        let mut h = Harness::new();
        let result = h.with_ctx(|state, ctx| ensure_docker(state, ctx, shell));
        (result, h)
    }

    #[test]
    fn test_everything_already_running() {
        let shell = FakeShell::new()
            .respond("systemctl is-active", 0, "active\n")
            .respond("/usr/bin/docker info", 0, "active\n");

        let (result, _) = ensure(&shell);
        assert_eq!(result.unwrap(), Outcome::Done);
        assert!(!shell.calls().iter().any(|c| c.contains("swarm init")));
        assert!(!shell.calls().iter().any(|c| c.starts_with("systemctl start")));
    }

    #[test]
    fn test_starts_service_and_inits_swarm() {
        let shell = FakeShell::new()
            .respond("systemctl is-active", 3, "inactive\n")
            .respond("systemctl is-active", 0, "active\n")
            .respond("/usr/bin/docker info", 0, "inactive\n");

        let (result, h) = ensure(&shell);
        assert_eq!(result.unwrap(), Outcome::Done);
        let calls = shell.calls();
        assert!(calls.contains(&"systemctl enable docker".to_string()));
        assert!(calls.contains(&"systemctl start docker".to_string()));
        assert!(calls.contains(&"/usr/bin/docker swarm init".to_string()));
        assert!(h.reporter.contains(stagekit::testing::Level::Info, "docker.swarm.inited"));
    }

    #[test]
    fn test_service_fallback() {
        let shell = FakeShell::new()
            .missing("systemctl")
            .respond("/usr/bin/docker info", 0, "locked");
        let (result, _) = ensure(&shell);
        assert_eq!(result.unwrap(), Outcome::Done);
        assert!(shell.calls().contains(&"service docker start".to_string()));
    }

    #[test]
    fn test_service_failure_aborts() {
        let shell = FakeShell::new().missing("systemctl").respond("service docker", 1, "");
        let (result, _) = ensure(&shell);
        let abort = result.unwrap_err();
        assert_eq!(abort.code, stagekit::EXIT_FAILURE);
        assert_eq!(abort.message, "docker.service.fail");
    }

    #[test]
    fn test_swarm_failure_aborts() {
        let shell = FakeShell::new()
            .respond("systemctl is-active", 0, "active")
            .respond("/usr/bin/docker info", 0, "inactive")
            .respond("/usr/bin/docker swarm init", 1, "");
        let (result, _) = ensure(&shell);
        assert_eq!(result.unwrap_err().message, "docker.swarm.fail");
    }

    #[test]
    fn test_missing_binary_aborts() {
        let shell = FakeShell::new().missing("docker");
        let (result, _) = ensure(&shell);
        assert_eq!(result.unwrap_err().code, stagekit::EXIT_FAILURE);
        assert!(shell.calls().is_empty());
    }

    #[test]
    fn test_dry_run_skips() {
        let mut h = Harness::dry_run();
        let shell = FakeShell::new();
        let result = h.with_ctx(|state, ctx| ensure_docker(state, ctx, &shell));
        assert_eq!(result.unwrap(), Outcome::Skip);
        assert!(shell.calls().is_empty());
    }
}
