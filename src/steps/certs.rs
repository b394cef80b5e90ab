//! TLS certificate issuance: Let's Encrypt through acme.sh, or the bundled
//! intermediate CA as a fallback

use crate::network::{IpDetector, SystemIpDetector};
use crate::runner::{Shell, SystemShell};
use crate::state::RunState;
use anyhow::{Context, Result};
use regex::Regex;
use stagekit::{Abort, Answer, Outcome, StepContext};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const ACME_VERSION: &str = "3.0.7";
const ACME_URL: &str = "https://raw.githubusercontent.com/acmesh-official/acme.sh/3.0.7/acme.sh";
const MAX_DOWNLOAD_SIZE: u64 = 10 * 1024 * 1024;

const NGINX: &str = "/usr/sbin/nginx";
const NGINX_SNIPPETS_DIR: &str = "/etc/nginx/compass_snippets";
const NGINX_CONF_DIR: &str = "/etc/nginx/conf.d";

const LEAF_DAYS: &str = "365";

/// Where issued material goes
#[derive(Debug, Clone)]
pub struct Targets {
    pub cert_dir: PathBuf,
    pub bundle: PathBuf,
    pub key: PathBuf,
}

/// Parameters of a certificate signed by the local intermediate CA
#[derive(Debug, Clone)]
pub struct LocalRequest<'a> {
    pub ca_cert: &'a Path,
    pub ca_key: &'a Path,
    pub ip: &'a str,
    pub domain: Option<&'a str>,
}

/// Produces certificate bundles
pub trait Issuer {
    fn lets_encrypt(&self, ctx: &StepContext<'_>, domain: &str, targets: &Targets) -> Result<()>;

    fn local(&self, ctx: &StepContext<'_>, request: &LocalRequest<'_>, targets: &Targets) -> Result<()>;
}

/// Issues with acme.sh, nginx and openssl on the host
pub struct SystemIssuer<'a> {
    shell: &'a dyn Shell,
}

impl<'a> SystemIssuer<'a> {
    pub fn new(shell: &'a dyn Shell) -> Self {
        Self { shell }
    }

    /// Run a command that must succeed
    fn checked(&self, ctx: &StepContext<'_>, cmd: &str, args: &[&str]) -> Result<()> {
        let code = self.shell.status(cmd, args)?;
        if code != 0 {
            let command = std::iter::once(cmd).chain(args.iter().copied()).collect::<Vec<_>>().join(" ");
            anyhow::bail!(ctx.t("certs.le_cmd_fail", &[("command", &command), ("code", &code.to_string())]));
        }
        Ok(())
    }

    fn openssl(&self, args: &[&str]) -> Result<()> {
        let out = self.shell.output("openssl", args)?;
        if !out.success() {
            anyhow::bail!("openssl {}: {}", args.first().unwrap_or(&""), out.error_text());
        }
        Ok(())
    }

    fn sign_leaf(&self, work: &Path, request: &LocalRequest<'_>, targets: &Targets) -> Result<()> {
        let leaf_key = work.join("leaf.key");
        let csr = work.join("leaf.csr");
        let leaf = work.join("leaf.crt");
        let ext = work.join("leaf.ext");
        fs::write(&ext, leaf_extensions(request.ip, request.domain))?;

        let subject = format!("/CN={}", request.domain.unwrap_or(request.ip));
        let s = |p: &Path| p.to_string_lossy().into_owned();
        let (leaf_key_s, csr_s, leaf_s, ext_s) = (s(&leaf_key), s(&csr), s(&leaf), s(&ext));
        let (ca_cert_s, ca_key_s) = (s(request.ca_cert), s(request.ca_key));

        self.openssl(&[
            "req", "-new", "-newkey", "rsa:2048", "-nodes", "-keyout", &leaf_key_s, "-out", &csr_s, "-subj",
            &subject,
        ])?;
        self.openssl(&[
            "x509", "-req", "-in", &csr_s, "-CA", &ca_cert_s, "-CAkey", &ca_key_s, "-set_serial",
            &random_serial(), "-days", LEAF_DAYS, "-sha256", "-extfile", &ext_s, "-out", &leaf_s,
        ])?;

        let mut bundle = fs::read(&leaf).context("Signed certificate was not written")?;
        bundle.extend(fs::read(request.ca_cert)?);
        fs::write(&targets.bundle, bundle)?;
        fs::copy(&leaf_key, &targets.key)?;
        Ok(())
    }
}

impl Issuer for SystemIssuer<'_> {
    fn lets_encrypt(&self, ctx: &StepContext<'_>, domain: &str, targets: &Targets) -> Result<()> {
        let le_dir = targets.cert_dir.join("letsencrypt");
        fs::create_dir_all(&le_dir)?;

        let acme = le_dir.join("acme.sh");
        if !acme.exists() {
            ctx.info("certs.le_download", &[("version", ACME_VERSION)]);
            fs::write(&acme, download(ACME_URL)?)?;
            fs::set_permissions(&acme, fs::Permissions::from_mode(0o755))?;
        }
        let acme_s = acme.to_string_lossy().into_owned();
        let home = le_dir.to_string_lossy().into_owned();

        self.checked(ctx, &acme_s, &["--home", &home, "--set-default-ca", "--server", "letsencrypt"])?;
        self.checked(ctx, &acme_s, &["--upgrade", "--home", &home])?;

        let reg = self.shell.output(&acme_s, &["--register-account", "--home", &home])?;
        let reg_output = format!("{}{}", reg.stdout, reg.stderr);
        // acme.sh exits with 2 when the account already exists
        if !matches!(reg.code, Some(0 | 2)) {
            anyhow::bail!(ctx.t(
                "certs.le_register_fail",
                &[("code", &reg.exit_code().to_string()), ("output", reg_output.trim())],
            ));
        }
        let thumbprint = parse_thumbprint(&reg_output);

        if let Some(thumbprint) = &thumbprint {
            fs::create_dir_all(NGINX_SNIPPETS_DIR)?;
            fs::write(Path::new(NGINX_SNIPPETS_DIR).join("acme_stateless.conf"), stateless_snippet(thumbprint))?;
        }
        fs::create_dir_all(NGINX_CONF_DIR)?;
        fs::write(
            Path::new(NGINX_CONF_DIR).join("acme.easy-install.conf"),
            challenge_server(domain, thumbprint.as_deref().unwrap_or_default()),
        )?;

        self.checked(ctx, NGINX, &["-t"])?;
        self.checked(ctx, NGINX, &["-s", "reload"])?;

        let issued = le_dir.join(format!("{domain}_ecc"));
        let chain = issued.join("fullchain.cer");
        let key = issued.join(format!("{domain}.key"));
        if !chain.exists() || !key.exists() {
            ctx.info("certs.le_issue", &[("domain", domain)]);
            self.checked(
                ctx,
                &acme_s,
                &["--home", &home, "--issue", "--force", "--stateless", "-d", domain],
            )?;
        }
        fs::copy(&chain, &targets.bundle).with_context(|| format!("Missing {}", chain.display()))?;
        fs::copy(&key, &targets.key).with_context(|| format!("Missing {}", key.display()))?;

        let renew = format!("{acme_s} --home {home} --renew --force --stateless -d {domain}");
        let reload = format!("{NGINX} -t && {NGINX} -s reload");
        self.checked(ctx, "bash", &["-c", &cron_install_command("0 0 15 * *", &renew)])?;
        self.checked(ctx, "bash", &["-c", &cron_install_command("0 3 15 * *", &reload)])?;
        Ok(())
    }

    fn local(&self, _ctx: &StepContext<'_>, request: &LocalRequest<'_>, targets: &Targets) -> Result<()> {
        let work = targets.cert_dir.join(".easy-install-ca");
        fs::create_dir_all(&work)?;
        let result = self.sign_leaf(&work, request, targets);
        if let Err(err) = fs::remove_dir_all(&work) {
            log::debug!("Could not remove {}: {err}", work.display());
        }
        result
    }
}

fn download(url: &str) -> Result<Vec<u8>> {
    let agent = ureq::Agent::new_with_defaults();

    let mut response = agent
        .get(url)
        .header("User-Agent", "easy-install")
        .call()
        .context("Failed to download file")?;

    response
        .body_mut()
        .with_config()
        .limit(MAX_DOWNLOAD_SIZE)
        .read_to_vec()
        .context("Failed to read response body")
}

/// Random positive 127-bit serial in openssl's hex notation
fn random_serial() -> String {
    format!("0x{:032x}", rand::random::<u128>() >> 1)
}

/// openssl extension file for the leaf certificate
pub fn leaf_extensions(ip: &str, domain: Option<&str>) -> String {
    let mut san = format!("IP:{ip}");
    if let Some(domain) = domain {
        san.push_str(&format!(", DNS:{domain}"));
    }
    format!(
        "basicConstraints = CA:FALSE\nkeyUsage = critical, digitalSignature, keyEncipherment\nsubjectAltName = {san}\n"
    )
}

/// Account thumbprint from `acme.sh --register-account` output
pub fn parse_thumbprint(output: &str) -> Option<String> {
    let re = Regex::new(r"ACCOUNT_THUMBPRINT='([^']+)'").ok()?;
    re.captures(output).map(|c| c[1].to_string())
}

pub fn stateless_snippet(thumbprint: &str) -> String {
    format!(
        "location ~ ^/\\.well-known/acme-challenge/([-_a-zA-Z0-9]+)$ {{\n    default_type text/plain;\n    return 200 \"$1.{thumbprint}\";\n}}\n"
    )
}

/// Port-80 server answering stateless challenges and redirecting the rest
pub fn challenge_server(domain: &str, thumbprint: &str) -> String {
    format!(
        "server {{
    listen 80;
    return 404;
}}

server {{
    listen 80;
    server_name {domain};

    location ~ ^/\\.well-known/acme-challenge/([-_a-zA-Z0-9]+)$ {{
        default_type text/plain;
        return 200 \"$1.{thumbprint}\";
    }}

    location / {{
        return 301 https://$host$request_uri;
    }}
}}
"
    )
}

/// Shell line replacing any crontab entry for `command` with a new schedule
pub fn cron_install_command(schedule: &str, command: &str) -> String {
    format!(r#"(crontab -l 2>/dev/null | grep -v -F "{command}"; echo "{schedule} {command}") | crontab -"#)
}

pub fn run(state: &mut RunState, ctx: &StepContext<'_>) -> Result<Outcome, Abort> {
    let shell = SystemShell;
    ensure_certificates(state, ctx, &SystemIssuer::new(&shell), &SystemIpDetector)
}

pub fn ensure_certificates(
    state: &mut RunState,
    ctx: &StepContext<'_>,
    issuer: &dyn Issuer,
    ip: &dyn IpDetector,
) -> Result<Outcome, Abort> {
    let targets = Targets {
        cert_dir: state.paths.cert_dir.clone(),
        bundle: state.paths.bundle_path(),
        key: state.paths.key_path(),
    };
    let cert_dir = targets.cert_dir.display().to_string();
    if state.dry_run {
        ctx.info("certs.dry_run", &[("path", &cert_dir)]);
        return Ok(Outcome::Skip);
    }

    fs::create_dir_all(&targets.cert_dir).map_err(|err| {
        Abort::failure(ctx.t("certs.dir_fail", &[("path", &cert_dir), ("error", &err.to_string())]))
    })?;

    if state.lets_encrypt
        && let Some(domain) = state.domain.clone()
    {
        ctx.info("certs.mode_le", &[("domain", &domain)]);
        match issuer.lets_encrypt(ctx, &domain, &targets) {
            Ok(()) => return finish(ctx, &targets),
            Err(err) => {
                ctx.warn("certs.le_failed", &[("error", &format!("{err:#}"))]);
                if state.auto_confirm {
                    ctx.info("certs.auto_fallback", &[]);
                } else {
                    match ctx.confirm("certs.prompt_fallback") {
                        Answer::Yes => ctx.info("certs.manual_fallback", &[]),
                        Answer::No => return Err(Abort::failure(ctx.t("certs.abort", &[]))),
                        Answer::Interrupted => {
                            return Err(Abort::interrupted(ctx.t("common.interrupted", &[])));
                        }
                    }
                }
            }
        }
    }

    ctx.info("certs.mode_local", &[]);
    let paths = &state.paths;
    if !paths.ca_cert.exists() || !paths.ca_key.exists() {
        return Err(Abort::failure(ctx.t(
            "certs.intermediate_missing",
            &[("path", &paths.ca_cert.display().to_string())],
        )));
    }
    let Some(host_ip) = state.host_ip.clone().or_else(|| ip.primary_ipv4()) else {
        return Err(Abort::failure(ctx.t("certs.ip_missing", &[])));
    };
    ctx.info("certs.local_prepare", &[("ip", &host_ip), ("domain", state.domain_or_empty())]);

    let request = LocalRequest {
        ca_cert: &paths.ca_cert,
        ca_key: &paths.ca_key,
        ip: &host_ip,
        domain: state.domain.as_deref(),
    };
    issuer.local(ctx, &request, &targets).map_err(|err| {
        Abort::failure(ctx.t("certs.local_failed", &[("error", &format!("{err:#}"))]))
    })?;
    state.host_ip = Some(host_ip);

    finish(ctx, &targets)
}

fn finish(ctx: &StepContext<'_>, targets: &Targets) -> Result<Outcome, Abort> {
    for path in [&targets.bundle, &targets.key] {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|err| {
            Abort::failure(ctx.t(
                "certs.chmod_fail",
                &[("path", &path.display().to_string()), ("error", &err.to_string())],
            ))
        })?;
    }
    ctx.info(
        "certs.done",
        &[
            ("bundle", &targets.bundle.display().to_string()),
            ("cert_key", &targets.key.display().to_string()),
        ],
    );
    Ok(Outcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::tests::FixedIp;
    use crate::runner::fake::FakeShell;
    use crate::steps::harness::Harness;
    use std::cell::RefCell;

    /// Writes placeholder files instead of talking to a CA
    #[derive(Default)]
    struct FakeIssuer {
        le_fails: bool,
        local_fails: bool,
        calls: RefCell<Vec<String>>,
    }

    impl Issuer for FakeIssuer {
        fn lets_encrypt(&self, _ctx: &StepContext<'_>, domain: &str, targets: &Targets) -> Result<()> {
            self.calls.borrow_mut().push(format!("le {domain}"));
            if self.le_fails {
                anyhow::bail!("rate limited");
            }
            fs::write(&targets.bundle, "LE CHAIN")?;
            fs::write(&targets.key, "LE KEY")?;
            Ok(())
        }

        fn local(&self, _ctx: &StepContext<'_>, request: &LocalRequest<'_>, targets: &Targets) -> Result<()> {
            self.calls.borrow_mut().push(format!("local {}", request.ip));
            if self.local_fails {
                anyhow::bail!("openssl x509: unable to load CA private key");
            }
            fs::write(&targets.bundle, "LOCAL CHAIN")?;
            fs::write(&targets.key, "LOCAL KEY")?;
            Ok(())
        }
    }

    fn with_ca(h: &Harness) {
        let paths = &h.state.paths;
        fs::create_dir_all(paths.ca_cert.parent().unwrap()).unwrap();
        fs::write(&paths.ca_cert, "CA CERT").unwrap();
        fs::write(&paths.ca_key, "CA KEY").unwrap();
    }

    fn le_harness(answers: &[&str]) -> Harness {
        let mut h = Harness::with_answers(answers.iter().copied());
        h.state.lets_encrypt = true;
        h.state.domain = Some("compass.example.org".to_string());
        with_ca(&h);
        h
    }

    fn mode(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn test_lets_encrypt_success() {
        let mut h = le_harness(&[]);
        let issuer = FakeIssuer::default();
        let outcome = h
            .with_ctx(|state, ctx| ensure_certificates(state, ctx, &issuer, &FixedIp::new(Some("10.0.0.5"))))
            .unwrap();

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(*issuer.calls.borrow(), vec!["le compass.example.org"]);
        let bundle = h.state.paths.bundle_path();
        assert_eq!(fs::read_to_string(&bundle).unwrap(), "LE CHAIN");
        assert_eq!(mode(&bundle), 0o600);
        assert_eq!(mode(&h.state.paths.key_path()), 0o600);
    }

    #[test]
    fn test_failed_lets_encrypt_falls_back_when_auto() {
        let mut h = le_harness(&[]);
        h.state.auto_confirm = true;
        let issuer = FakeIssuer {
            le_fails: true,
            ..FakeIssuer::default()
        };
        let outcome = h
            .with_ctx(|state, ctx| ensure_certificates(state, ctx, &issuer, &FixedIp::new(Some("10.0.0.5"))))
            .unwrap();

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(*issuer.calls.borrow(), vec!["le compass.example.org", "local 10.0.0.5"]);
        assert_eq!(h.state.host_ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(h.reporter.warnings().len(), 1);
    }

    #[test]
    fn test_declined_fallback_aborts() {
        let mut h = le_harness(&["n"]);
        let issuer = FakeIssuer {
            le_fails: true,
            ..FakeIssuer::default()
        };
        let abort = h
            .with_ctx(|state, ctx| ensure_certificates(state, ctx, &issuer, &FixedIp::default()))
            .unwrap_err();
        assert_eq!(abort.code, stagekit::EXIT_FAILURE);
        assert_eq!(issuer.calls.borrow().len(), 1);
    }

    #[test]
    fn test_local_requires_intermediate() {
        let mut h = Harness::new();
        let issuer = FakeIssuer::default();
        let abort = h
            .with_ctx(|state, ctx| ensure_certificates(state, ctx, &issuer, &FixedIp::new(Some("10.0.0.5"))))
            .unwrap_err();
        assert!(abort.message.starts_with("certs.intermediate_missing"));
        assert!(issuer.calls.borrow().is_empty());
    }

    #[test]
    fn test_local_requires_ip() {
        let mut h = Harness::new();
        with_ca(&h);
        let issuer = FakeIssuer::default();
        let abort = h
            .with_ctx(|state, ctx| ensure_certificates(state, ctx, &issuer, &FixedIp::new(None)))
            .unwrap_err();
        assert_eq!(abort.message, "certs.ip_missing");
    }

    #[test]
    fn test_local_failure_aborts() {
        let mut h = Harness::new();
        with_ca(&h);
        h.state.host_ip = Some("192.168.1.20".to_string());
        let issuer = FakeIssuer {
            local_fails: true,
            ..FakeIssuer::default()
        };
        let abort = h
            .with_ctx(|state, ctx| ensure_certificates(state, ctx, &issuer, &FixedIp::default()))
            .unwrap_err();
        assert_eq!(abort.code, stagekit::EXIT_FAILURE);
        assert!(abort.message.contains("unable to load CA private key"));
    }

    #[test]
    fn test_dry_run_skips() {
        let mut h = Harness::dry_run();
        let issuer = FakeIssuer::default();
        let outcome = h
            .with_ctx(|state, ctx| ensure_certificates(state, ctx, &issuer, &FixedIp::default()))
            .unwrap();
        assert_eq!(outcome, Outcome::Skip);
        assert!(!h.state.paths.cert_dir.exists());
    }

    #[test]
    fn test_system_local_issuer_runs_openssl() {
        let mut h = Harness::new();
        with_ca(&h);
        h.state.host_ip = Some("10.0.0.5".to_string());
        h.state.domain = Some("compass.local".to_string());
        let shell = FakeShell::new();
        let issuer = SystemIssuer::new(&shell);

        // The fake shell writes nothing, so reading the signed leaf fails
        let abort = h
            .with_ctx(|state, ctx| ensure_certificates(state, ctx, &issuer, &FixedIp::default()))
            .unwrap_err();
        assert!(abort.message.starts_with("certs.local_failed"));

        let calls = shell.calls();
        assert!(calls[0].starts_with("openssl req -new -newkey rsa:2048 -nodes"));
        assert!(calls[0].ends_with("-subj /CN=compass.local"));
        assert!(calls[1].contains(" -days 365 -sha256 "));
        assert!(!h.state.paths.cert_dir.join(".easy-install-ca").exists());
    }

    #[test]
    fn test_leaf_extensions() {
        let ext = leaf_extensions("10.0.0.5", Some("compass.example.org"));
        assert!(ext.contains("subjectAltName = IP:10.0.0.5, DNS:compass.example.org\n"));
        assert!(ext.contains("basicConstraints = CA:FALSE"));
        assert!(leaf_extensions("10.0.0.5", None).ends_with("subjectAltName = IP:10.0.0.5\n"));
    }

    #[test]
    fn test_parse_thumbprint() {
        let out = "[Mon] Registering account\n[Mon] ACCOUNT_THUMBPRINT='AbC-123_x'\n";
        assert_eq!(parse_thumbprint(out).as_deref(), Some("AbC-123_x"));
        assert_eq!(parse_thumbprint("Already registered"), None);
    }

    #[test]
    fn test_nginx_snippets() {
        let server = challenge_server("compass.example.org", "tp");
        assert!(server.contains("server_name compass.example.org;"));
        assert!(server.contains("return 200 \"$1.tp\";"));
        assert!(stateless_snippet("tp").starts_with("location ~ ^/\\.well-known/acme-challenge/"));
    }

    #[test]
    fn test_cron_install_command() {
        let line = cron_install_command("0 3 15 * *", "/usr/sbin/nginx -s reload");
        assert_eq!(
            line,
            r#"(crontab -l 2>/dev/null | grep -v -F "/usr/sbin/nginx -s reload"; echo "0 3 15 * * /usr/sbin/nginx -s reload") | crontab -"#
        );
    }
}
