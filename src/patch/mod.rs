//! Configuration patches
//!
//! A closed, ordered set of edits applied to the generated configuration
//! files. Each edit sets fixed keys and returns the warnings it produced.
//! Edits only ever assign values, so applying one twice changes nothing.

mod apply;

pub use apply::{apply_all_patches, run};

use crate::network::IpDetector;
use crate::secret;
use crate::state::RunState;
use stagekit::StepContext;
use yamlpatch::{Document, Value};

/// Administrator display name written to `team.yaml`
pub const ADMIN_FULL_NAME: &str = "Администратор";

/// Administrator e-mail used when none was given
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";

/// One registered document transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Patch {
    Auth,
    Captcha,
    Team,
    Global,
}

impl Patch {
    /// Every patch, in application order
    pub const ALL: [Self; 4] = [Self::Auth, Self::Captcha, Self::Team, Self::Global];

    /// File name under the configs directory
    pub fn filename(self) -> &'static str {
        match self {
            Self::Auth => "auth.yaml",
            Self::Captcha => "captcha.yaml",
            Self::Team => "team.yaml",
            Self::Global => "global.yaml",
        }
    }

    /// Apply the transformation to `doc`, returning collected warnings
    pub fn apply(
        self,
        doc: &mut Document,
        state: &mut RunState,
        ctx: &StepContext<'_>,
        ip: &dyn IpDetector,
    ) -> yamlpatch::Result<Vec<String>> {
        match self {
            Self::Auth => patch_auth(doc, ctx),
            Self::Captcha => patch_captcha(doc, ctx),
            Self::Team => patch_team(doc, state, ctx),
            Self::Global => patch_global(doc, state, ctx, ip),
        }
    }
}

fn patch_auth(doc: &mut Document, ctx: &StepContext<'_>) -> yamlpatch::Result<Vec<String>> {
    doc.set("available_methods", Value::flow_seq(["mail"]))?;
    doc.set("available_guest_methods", Value::flow_seq(["mail"]))?;
    doc.set("mail.registration_2fa_enabled", false)?;
    doc.set("mail.authorization_2fa_enabled", false)?;
    doc.set("smtp.host", "smtp.example.com")?;
    doc.set("smtp.port", 587)?;
    doc.set("smtp.username", "no-reply@example.com")?;
    doc.set("smtp.password", "change-me")?;
    doc.set("smtp.encryption", "tls")?;
    doc.set("smtp.from", "compass@example.com")?;
    ctx.info("patch.auth", &[]);
    Ok(Vec::new())
}

fn patch_captcha(doc: &mut Document, ctx: &StepContext<'_>) -> yamlpatch::Result<Vec<String>> {
    doc.set("captcha.enabled", false)?;
    ctx.info("patch.captcha", &[]);
    Ok(Vec::new())
}

fn patch_team(
    doc: &mut Document,
    state: &mut RunState,
    ctx: &StepContext<'_>,
) -> yamlpatch::Result<Vec<String>> {
    let mut warnings = Vec::new();
    doc.set("root_user.full_name", ADMIN_FULL_NAME)?;

    match state.admin_email.as_deref() {
        Some(email) => {
            doc.set("root_user.mail", email)?;
            ctx.info("patch.team.mail_cli", &[]);
        }
        None => {
            doc.set("root_user.mail", DEFAULT_ADMIN_EMAIL)?;
            warnings.push(ctx.t("patch.team.mail_default", &[("email", DEFAULT_ADMIN_EMAIL)]));
        }
    }

    let password = match state.admin_password.clone() {
        Some(password) => {
            ctx.info("patch.team.password_cli", &[]);
            password
        }
        None => {
            let password = secret::generate_password();
            state.admin_password = Some(password.clone());
            state.admin_password_generated = true;
            ctx.info("patch.team.password_generated", &[]);
            password
        }
    };
    doc.set("root_user.password", password)?;

    Ok(warnings)
}

fn patch_global(
    doc: &mut Document,
    state: &mut RunState,
    ctx: &StepContext<'_>,
    ip: &dyn IpDetector,
) -> yamlpatch::Result<Vec<String>> {
    let mut warnings = Vec::new();
    doc.set("nginx.ssl_crt", crate::paths::BUNDLE_NAME)?;
    doc.set("nginx.ssl_key", crate::paths::KEY_NAME)?;
    doc.set("domain", state.domain_or_empty())?;

    let host_ip = state.host_ip.clone().or_else(|| ip.primary_ipv4());
    match host_ip {
        Some(host_ip) => {
            doc.set("host_ip", host_ip.as_str())?;
            ctx.info("patch.global.ip", &[("ip", &host_ip)]);
            state.host_ip = Some(host_ip);
        }
        None => warnings.push(ctx.t("patch.global.ip_warn", &[])),
    }

    doc.set("root_mount_path", state.root_mount.to_string_lossy().into_owned())?;
    Ok(warnings)
}
