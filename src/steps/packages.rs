//! System package check and installation

use crate::runner;
use crate::state::{OsFamily, RunState};
use anyhow::Result;
use stagekit::{Abort, Outcome, StepContext};

/// One required capability, satisfied by any of several package names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    pub names: &'static [&'static str],
    pub optional: bool,
}

impl PackageRequest {
    const fn required(names: &'static [&'static str]) -> Self {
        Self {
            names,
            optional: false,
        }
    }

    pub fn primary(&self) -> &'static str {
        self.names[0]
    }
}

/// Package database and installer of the host
pub trait PackageManager {
    fn is_installed(&self, family: OsFamily, name: &str) -> bool;

    /// Install `names`, returning the installer's exit code
    fn install(&self, family: OsFamily, names: &[&str]) -> Result<i32>;
}

/// dpkg/apt-get on deb hosts, rpm/dnf (or yum) on rpm hosts
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPackages;

impl PackageManager for SystemPackages {
    fn is_installed(&self, family: OsFamily, name: &str) -> bool {
        match family {
            OsFamily::Deb => runner::run_output("dpkg-query", &["-W", "-f=${Status}", name])
                .is_ok_and(|out| out.success() && out.stdout.contains("install ok installed")),
            OsFamily::Rpm => runner::run_quiet("rpm", &["-q", name]),
        }
    }

    fn install(&self, family: OsFamily, names: &[&str]) -> Result<i32> {
        let installer = installer_for(family);
        let mut args = vec!["install", "-y"];
        args.extend_from_slice(names);

        let out = runner::run_with_spinner(&args.join(" "), installer, &args)?;
        if !out.success() {
            log::error!("{installer} failed: {}", out.stderr.trim());
        }
        Ok(out.exit_code())
    }
}

fn installer_for(family: OsFamily) -> &'static str {
    match family {
        OsFamily::Deb => "apt-get",
        OsFamily::Rpm => {
            if runner::command_exists("dnf") || !runner::command_exists("yum") {
                "dnf"
            } else {
                "yum"
            }
        }
    }
}

/// Packages to check for the host family
pub fn requests(family: OsFamily, lets_encrypt: bool, need_fio: bool) -> Vec<PackageRequest> {
    let mut list = match family {
        OsFamily::Deb => vec![
            PackageRequest::required(&["nginx"]),
            PackageRequest::required(&["docker.io", "docker-ce"]),
            PackageRequest::required(&["python3"]),
            PackageRequest::required(&["python3-venv"]),
            PackageRequest::required(&["python3-pip"]),
            PackageRequest::required(&["openssl"]),
        ],
        OsFamily::Rpm => vec![
            PackageRequest::required(&["nginx"]),
            PackageRequest::required(&["docker", "moby-engine"]),
            PackageRequest::required(&["python3"]),
            PackageRequest::required(&["python3-pip"]),
            PackageRequest::required(&["python3-virtualenv", "python3-venv"]),
            PackageRequest::required(&["openssl"]),
        ],
    };
    if lets_encrypt {
        list.push(PackageRequest::required(&["certbot"]));
    }
    list.push(PackageRequest {
        names: &["fio"],
        optional: !need_fio,
    });
    list
}

/// Command the operator can run by hand
pub fn install_preview(family: OsFamily, names: &[&str]) -> String {
    let tool = match family {
        OsFamily::Deb => "apt-get",
        OsFamily::Rpm => "dnf",
    };
    format!("{tool} install {}", names.join(" "))
}

fn installed_name(pm: &dyn PackageManager, family: OsFamily, request: &PackageRequest) -> Option<&'static str> {
    request
        .names
        .iter()
        .copied()
        .find(|name| pm.is_installed(family, name))
}

pub fn run(state: &mut RunState, ctx: &StepContext<'_>) -> Result<Outcome, Abort> {
    ensure_packages(state, ctx, &SystemPackages)
}

pub fn ensure_packages(
    state: &mut RunState,
    ctx: &StepContext<'_>,
    pm: &dyn PackageManager,
) -> Result<Outcome, Abort> {
    let Some(family) = state.os_type else {
        return Err(Abort::failure(ctx.t("pkg.unknown_os", &[])));
    };
    let need_fio = !state.skip_checks && !state.skip_bench;
    let requests = requests(family, state.lets_encrypt, need_fio);

    if state.dry_run {
        let names: Vec<&str> = requests.iter().map(PackageRequest::primary).collect();
        ctx.info("pkg.dry_run", &[("packages", &names.join(", "))]);
        return Ok(Outcome::Skip);
    }

    let family_label = ctx.t(&format!("os.type.{}", family.as_str()), &[]);
    ctx.info("pkg.start", &[("os_type", &family_label)]);

    let mut missing_required: Vec<&'static str> = Vec::new();
    let mut missing_optional = 0usize;
    for request in &requests {
        match installed_name(pm, family, request) {
            Some(name) => ctx.info("pkg.found", &[("name", name)]),
            None if request.optional => {
                ctx.warn("pkg.optional_missing", &[("name", request.primary())]);
                missing_optional += 1;
            }
            None => {
                ctx.warn("pkg.missing", &[("name", request.primary())]);
                missing_required.push(request.primary());
            }
        }
    }

    if missing_required.is_empty() {
        return Ok(finish(ctx, missing_optional));
    }

    let packages = missing_required.join(", ");
    if !state.auto_confirm {
        ctx.info("pkg.install.prompt", &[("packages", &packages)]);
        if let Err(abort) = super::ask_to_continue(ctx, "pkg.install.ask") {
            let command = install_preview(family, &missing_required);
            ctx.info("pkg.commands", &[("command", &command)]);
            return Err(abort);
        }
    }

    ctx.info("pkg.install.running", &[("command", &install_preview(family, &missing_required))]);
    match pm.install(family, &missing_required) {
        Ok(0) => {}
        Ok(code) => {
            return Err(Abort::with_code(
                code,
                ctx.t("pkg.install.error", &[("code", &code.to_string())]),
            ));
        }
        Err(err) => {
            return Err(Abort::failure(
                ctx.t("pkg.install.cmd_missing", &[("error", &err.to_string())]),
            ));
        }
    }

    // Re-check everything after installation
    let mut still_missing = Vec::new();
    let mut missing_optional = 0usize;
    for request in &requests {
        if installed_name(pm, family, request).is_none() {
            if request.optional {
                missing_optional += 1;
            } else {
                still_missing.push(request.primary());
            }
        }
    }
    if !still_missing.is_empty() {
        return Err(Abort::failure(
            ctx.t("pkg.install.fail", &[("packages", &still_missing.join(", "))]),
        ));
    }

    Ok(finish(ctx, missing_optional))
}

fn finish(ctx: &StepContext<'_>, missing_optional: usize) -> Outcome {
    ctx.info("pkg.ok", &[]);
    if missing_optional > 0 {
        ctx.warn("pkg.optional_summary", &[("count", &missing_optional.to_string())]);
        Outcome::ProceedWithWarnings
    } else {
        Outcome::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::harness::Harness;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// In-memory package database
    struct FakePackages {
        installed: RefCell<HashSet<String>>,
        installable: HashSet<&'static str>,
        installs: RefCell<Vec<Vec<String>>>,
        exit_code: i32,
    }

    impl FakePackages {
        fn new(installed: &[&str]) -> Self {
            Self {
                installed: RefCell::new(installed.iter().map(ToString::to_string).collect()),
                installable: HashSet::new(),
                installs: RefCell::new(Vec::new()),
                exit_code: 0,
            }
        }

        fn installable(mut self, names: &[&'static str]) -> Self {
            self.installable.extend(names);
            self
        }
    }

    impl PackageManager for FakePackages {
        fn is_installed(&self, _family: OsFamily, name: &str) -> bool {
            self.installed.borrow().contains(name)
        }

        fn install(&self, _family: OsFamily, names: &[&str]) -> Result<i32> {
            self.installs
                .borrow_mut()
                .push(names.iter().map(ToString::to_string).collect());
            for name in names {
                if self.installable.contains(name) {
                    self.installed.borrow_mut().insert((*name).to_string());
                }
            }
            Ok(self.exit_code)
        }
    }

    const DEB_ALL: &[&str] = &[
        "nginx",
        "docker-ce",
        "python3",
        "python3-venv",
        "python3-pip",
        "openssl",
        "fio",
    ];

    fn deb_harness(answers: &[&str]) -> Harness {
        let mut h = Harness::with_answers(answers.iter().copied());
        h.state.os_type = Some(OsFamily::Deb);
        h
    }

    fn ensure(h: &mut Harness, pm: &FakePackages) -> Result<Outcome, Abort> {
        h.with_ctx(|state, ctx| ensure_packages(state, ctx, pm))
    }

    #[test]
    fn test_request_lists() {
        let deb: Vec<_> = requests(OsFamily::Deb, true, true)
            .iter()
            .map(PackageRequest::primary)
            .collect();
        assert_eq!(
            deb,
            ["nginx", "docker.io", "python3", "python3-venv", "python3-pip", "openssl", "certbot", "fio"]
        );

        let rpm = requests(OsFamily::Rpm, false, false);
        assert_eq!(rpm[1].names, &["docker", "moby-engine"]);
        assert_eq!(rpm[4].names, &["python3-virtualenv", "python3-venv"]);
        let fio = rpm.last().unwrap();
        assert_eq!(fio.primary(), "fio");
        assert!(fio.optional);
    }

    #[test]
    fn test_all_present_is_done() {
        let mut h = deb_harness(&[]);
        let pm = FakePackages::new(DEB_ALL);
        assert_eq!(ensure(&mut h, &pm).unwrap(), Outcome::Done);
        assert!(h.reporter.contains(stagekit::testing::Level::Info, "pkg.found(name=docker-ce)"));
        assert!(pm.installs.borrow().is_empty());
    }

    #[test]
    fn test_missing_optional_fio_warns() {
        let mut h = deb_harness(&[]);
        h.state.skip_bench = true;
        let pm = FakePackages::new(&DEB_ALL[..6]);
        assert_eq!(ensure(&mut h, &pm).unwrap(), Outcome::ProceedWithWarnings);
        assert!(pm.installs.borrow().is_empty());
    }

    #[test]
    fn test_install_missing_after_confirmation() {
        let mut h = deb_harness(&["y"]);
        let pm = FakePackages::new(&["nginx", "python3", "python3-venv", "python3-pip", "openssl"])
            .installable(&["docker.io", "fio"]);

        assert_eq!(ensure(&mut h, &pm).unwrap(), Outcome::Done);
        assert_eq!(pm.installs.borrow().as_slice(), &[vec!["docker.io".to_string(), "fio".to_string()]]);
        assert_eq!(h.reader.prompts(), vec!["pkg.install.ask"]);
    }

    #[test]
    fn test_decline_aborts_with_manual_command() {
        let mut h = deb_harness(&["n"]);
        let pm = FakePackages::new(&DEB_ALL[1..]);

        let abort = ensure(&mut h, &pm).unwrap_err();
        assert_eq!(abort.code, stagekit::EXIT_FAILURE);
        assert!(h.reporter.contains(stagekit::testing::Level::Info, "apt-get install nginx"));
        assert!(pm.installs.borrow().is_empty());
    }

    #[test]
    fn test_interrupt_aborts_130() {
        let mut h = Harness::interrupted();
        h.state.os_type = Some(OsFamily::Deb);
        let pm = FakePackages::new(&DEB_ALL[1..]);
        assert_eq!(ensure(&mut h, &pm).unwrap_err().code, stagekit::EXIT_INTERRUPTED);
    }

    #[test]
    fn test_still_missing_after_install_aborts() {
        let mut h = deb_harness(&[]);
        h.state.auto_confirm = true;
        let pm = FakePackages::new(&DEB_ALL[1..]);

        let abort = ensure(&mut h, &pm).unwrap_err();
        assert_eq!(abort.code, stagekit::EXIT_FAILURE);
        assert!(abort.message.contains("nginx"));
        assert!(h.reader.prompts().is_empty());
    }

    #[test]
    fn test_installer_exit_code_propagates() {
        let mut h = deb_harness(&[]);
        h.state.auto_confirm = true;
        let mut pm = FakePackages::new(&DEB_ALL[1..]);
        pm.exit_code = 100;
        assert_eq!(ensure(&mut h, &pm).unwrap_err().code, 100);
    }

    #[test]
    fn test_dry_run_skips() {
        let mut h = Harness::dry_run();
        h.state.os_type = Some(OsFamily::Rpm);
        let pm = FakePackages::new(&[]);
        assert_eq!(ensure(&mut h, &pm).unwrap(), Outcome::Skip);
        assert!(pm.installs.borrow().is_empty());
    }

    #[test]
    fn test_install_preview() {
        assert_eq!(install_preview(OsFamily::Rpm, &["nginx", "fio"]), "dnf install nginx fio");
    }
}
