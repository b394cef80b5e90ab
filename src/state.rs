//! Run-state threaded through every step

use crate::cli::Cli;
use crate::network;
use crate::paths::Paths;
use serde::Serialize;
use stagekit::{Abort, Translate};
use std::path::PathBuf;

/// Package family of the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Deb,
    Rpm,
}

impl OsFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deb => "deb",
            Self::Rpm => "rpm",
        }
    }
}

/// Everything the steps know about the run
///
/// Options are set once from the command line. Discovered facts (OS,
/// docker root, host IP, virtualenv) are filled in by the steps that find
/// them and reused by later ones.
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    // Options
    pub auto_confirm: bool,
    pub dry_run: bool,
    pub verbose: bool,
    pub skip_checks: bool,
    pub skip_bench: bool,
    pub skip_install: bool,
    pub lets_encrypt: bool,
    pub language: String,
    pub domain: Option<String>,
    pub root_mount: PathBuf,
    pub admin_email: Option<String>,
    #[serde(skip)]
    pub admin_password: Option<String>,
    pub log_file: PathBuf,
    pub bench_runtime_secs: u64,
    pub paths: Paths,

    // Discovered
    pub host_ip: Option<String>,
    pub docker_data_root: Option<PathBuf>,
    pub os_type: Option<OsFamily>,
    pub os_id: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub python: Option<PathBuf>,
    pub python_version: Option<String>,
    pub venv_path: Option<PathBuf>,
    pub venv_python: Option<PathBuf>,
    pub venv_bin: Option<PathBuf>,
    pub venv_site_packages: Option<PathBuf>,
    pub admin_password_generated: bool,
    pub install_executed: bool,
}

impl RunState {
    /// Build the initial state for a run
    pub fn from_cli(cli: &Cli, paths: Paths, log_file: PathBuf) -> Self {
        let mut state = Self::new(paths, log_file);
        state.auto_confirm = cli.yes;
        state.dry_run = cli.dry_run;
        state.verbose = cli.verbose;
        state.skip_checks = cli.skip_checks;
        state.skip_bench = cli.skip_bench;
        state.skip_install = cli.skip_install;
        state.lets_encrypt = cli.le;
        state.language = cli.lang.code().to_string();
        state.domain = non_empty(cli.domain.as_deref());
        state.root_mount = crate::paths::expand(&cli.root_mount);
        state.admin_email = non_empty(cli.admin_email.as_deref());
        state.admin_password = non_empty(cli.admin_password.as_deref());
        state.host_ip = non_empty(cli.host_ip.as_deref());
        state.bench_runtime_secs = cli.bench_runtime;
        state
    }

    /// State with default options, rooted at `paths`
    pub fn new(paths: Paths, log_file: PathBuf) -> Self {
        Self {
            auto_confirm: false,
            dry_run: false,
            verbose: false,
            skip_checks: false,
            skip_bench: false,
            skip_install: false,
            lets_encrypt: false,
            language: "ru".to_string(),
            domain: None,
            root_mount: PathBuf::from("/opt/compass_data"),
            admin_email: None,
            admin_password: None,
            log_file,
            bench_runtime_secs: 20,
            paths,
            host_ip: None,
            docker_data_root: None,
            os_type: None,
            os_id: None,
            os_name: None,
            os_version: None,
            python: None,
            python_version: None,
            venv_path: None,
            venv_python: None,
            venv_bin: None,
            venv_site_packages: None,
            admin_password_generated: false,
            install_executed: false,
        }
    }

    /// Domain, or an empty string
    pub fn domain_or_empty(&self) -> &str {
        self.domain.as_deref().unwrap_or_default()
    }

    /// Reject option combinations that cannot work, before any step runs
    pub fn validate(&self, i18n: &dyn Translate) -> Result<(), Abort> {
        if self.lets_encrypt && self.domain.is_none() {
            return Err(Abort::validation(i18n.t("err.le_without_domain", &[])));
        }
        if let Some(domain) = &self.domain
            && !network::is_valid_domain(domain)
        {
            return Err(Abort::validation(i18n.t("err.invalid_domain", &[("domain", domain)])));
        }
        if let Some(ip) = &self.host_ip
            && !network::is_ipv4(ip)
        {
            return Err(Abort::validation(i18n.t("err.invalid_ip", &[("ip", ip)])));
        }
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use stagekit::testing::KeyTranslator;
    use std::path::Path;

    fn parse(args: &[&str]) -> RunState {
        let mut argv = vec!["easy-install"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        RunState::from_cli(&cli, Paths::from_root(Path::new("/srv")), "/tmp/x.log".into())
    }

    #[test]
    fn test_from_cli() {
        let state = parse(&[
            "-y",
            "--lang",
            "en",
            "--domain",
            "compass.example.org",
            "--admin-password",
            "S3cretPass",
            "--skip-install",
        ]);
        assert!(state.auto_confirm);
        assert!(state.skip_install);
        assert_eq!(state.language, "en");
        assert_eq!(state.domain_or_empty(), "compass.example.org");
        assert_eq!(state.admin_password.as_deref(), Some("S3cretPass"));
        assert!(state.host_ip.is_none());
    }

    #[test]
    fn test_blank_values_are_unset() {
        let state = parse(&["--admin-email", "  ", "--host-ip", ""]);
        assert!(state.admin_email.is_none());
        assert!(state.host_ip.is_none());
        assert_eq!(state.domain_or_empty(), "");
    }

    #[test]
    fn test_password_never_serialized() {
        let state = parse(&["--admin-password", "S3cretPass"]);
        let json = serde_json::to_string(&state).unwrap();
        assert!(!json.contains("S3cretPass"));
        assert!(json.contains("\"auto_confirm\":false"));
    }

    #[test]
    fn test_validate() {
        assert!(parse(&[]).validate(&KeyTranslator).is_ok());
        assert!(parse(&["--le", "-d", "compass.example.org"]).validate(&KeyTranslator).is_ok());

        let abort = parse(&["--le"]).validate(&KeyTranslator).unwrap_err();
        assert_eq!(abort.code, stagekit::EXIT_VALIDATION);
        assert_eq!(abort.message, "err.le_without_domain");

        let abort = parse(&["-d", "bad-.example"]).validate(&KeyTranslator).unwrap_err();
        assert_eq!(abort.code, stagekit::EXIT_VALIDATION);

        let abort = parse(&["--host-ip", "10.0.0.300"]).validate(&KeyTranslator).unwrap_err();
        assert_eq!(abort.message, "err.invalid_ip(ip=10.0.0.300)");
    }
}
