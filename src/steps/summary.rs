//! Closing summary of what was set up

use crate::patch::{DEFAULT_ADMIN_EMAIL, Patch};
use crate::state::RunState;
use stagekit::{Abort, Outcome, StepContext};

pub fn run(state: &mut RunState, ctx: &StepContext<'_>) -> Result<Outcome, Abort> {
    if state.dry_run {
        ctx.info("summary.dry_run", &[]);
        return Ok(Outcome::Skip);
    }

    ctx.info("summary.header", &[]);

    let domain = state.domain.clone().unwrap_or_else(|| ctx.t("summary.none", &[]));
    ctx.info("summary.domain", &[("domain", &domain)]);
    let host_ip = state.host_ip.clone().unwrap_or_else(|| ctx.t("summary.unknown", &[]));
    ctx.info("summary.host_ip", &[("host_ip", &host_ip)]);
    ctx.info("summary.root_mount", &[("path", &state.root_mount.display().to_string())]);

    let configs_dir = &state.paths.configs_dir;
    ctx.info("summary.configs", &[("path", &configs_dir.display().to_string())]);
    ctx.info(
        "summary.certs",
        &[
            ("bundle", &state.paths.bundle_path().display().to_string()),
            ("cert_key", &state.paths.key_path().display().to_string()),
        ],
    );

    match &state.admin_email {
        Some(email) => ctx.info("summary.admin_email", &[("email", email)]),
        None => ctx.info("summary.admin_email_default", &[("email", DEFAULT_ADMIN_EMAIL)]),
    }
    if state.admin_password_generated {
        ctx.info("summary.admin_password_generated", &[]);
    } else {
        ctx.info("summary.admin_password_cli", &[]);
    }
    let team = configs_dir.join(Patch::Team.filename());
    ctx.info("summary.admin_password_location", &[("path", &team.display().to_string())]);

    ctx.info("summary.log_file", &[("path", &state.log_file.display().to_string())]);
    if state.install_executed {
        ctx.info("summary.footer_installed", &[]);
    } else if state.skip_install {
        ctx.info("summary.footer_pending_skip", &[]);
    } else {
        ctx.info("summary.footer_pending", &[]);
    }
    Ok(Outcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::harness::Harness;
    use stagekit::testing::Level;

    #[test]
    fn test_summary_lines() {
        let mut h = Harness::new();
        h.state.domain = Some("compass.example.org".into());
        h.state.admin_password_generated = true;
        h.state.install_executed = true;

        assert_eq!(h.run(run).unwrap(), Outcome::Done);
        let info = h.reporter.messages(Level::Info);
        assert!(info.contains(&"summary.domain(domain=compass.example.org)".to_string()));
        assert!(info.contains(&"summary.host_ip(host_ip=summary.unknown)".to_string()));
        assert!(info.contains(&"summary.admin_email_default(email=admin@example.com)".to_string()));
        assert!(info.contains(&"summary.admin_password_generated".to_string()));
        assert!(info.iter().any(|l| l.starts_with("summary.admin_password_location") && l.ends_with("team.yaml)")));
        assert_eq!(info.last().map(String::as_str), Some("summary.footer_installed"));
    }

    #[test]
    fn test_footer_variants() {
        let mut h = Harness::new();
        h.state.skip_install = true;
        h.run(run).unwrap();
        assert!(h.reporter.contains(Level::Info, "summary.footer_pending_skip"));

        let mut h = Harness::new();
        h.state.admin_email = Some("ops@corp.example".into());
        h.run(run).unwrap();
        assert!(h.reporter.contains(Level::Info, "summary.footer_pending"));
        assert!(h.reporter.contains(Level::Info, "summary.admin_email(email=ops@corp.example)"));
        assert!(h.reporter.contains(Level::Info, "summary.admin_password_cli"));
    }

    #[test]
    fn test_dry_run_skips() {
        let mut h = Harness::dry_run();
        assert_eq!(h.run(run).unwrap(), Outcome::Skip);
        assert!(!h.reporter.contains(Level::Info, "summary.header"));
    }
}
