//! Virtualenv for the helper scripts, with pinned dependencies

use crate::runner::{Shell, SystemShell};
use crate::state::RunState;
use stagekit::{Abort, Outcome, StepContext};
use std::path::{Path, PathBuf};

/// A pinned dependency and the versions that are good enough
#[derive(Debug, Clone, Copy)]
pub struct Dependency {
    pub name: &'static str,
    pub preferred: &'static str,
    pub accepted: &'static [&'static str],
}

impl Dependency {
    pub fn accepts(&self, version: &str) -> bool {
        self.accepted.iter().any(|v| *v == version)
    }
}

pub const DEPENDENCIES: &[Dependency] = &[
    Dependency { name: "PyYAML", preferred: "6.0.2", accepted: &["6.0.2", "6.0.1"] },
    Dependency {
        name: "ruamel.yaml",
        preferred: "0.18.5",
        accepted: &["0.18.5", "0.18.4", "0.17.35", "0.17.34"],
    },
    Dependency { name: "pyopenssl", preferred: "24.0.0", accepted: &["24.0.0"] },
    Dependency { name: "docker", preferred: "7.1.0", accepted: &["7.1.0"] },
    Dependency { name: "mysql-connector-python", preferred: "8.2.0", accepted: &["8.2.0"] },
    Dependency { name: "python-dotenv", preferred: "1.0.0", accepted: &["1.0.0"] },
    Dependency { name: "psutil", preferred: "5.9.6", accepted: &["5.9.6"] },
    Dependency { name: "pycryptodome", preferred: "3.21.0", accepted: &["3.21.0"] },
];

const VERSION_SNIPPET: &str =
    "import importlib.metadata, sys;pkg=sys.argv[1];print(importlib.metadata.version(pkg))";

/// `lib/pythonX.Y/site-packages` under the virtualenv
pub fn site_packages(venv: &Path, python_version: &str) -> Option<PathBuf> {
    let mut parts = python_version.split('.');
    let (major, minor) = (parts.next()?, parts.next()?);
    Some(venv.join("lib").join(format!("python{major}.{minor}")).join("site-packages"))
}

pub fn run(state: &mut RunState, ctx: &StepContext<'_>) -> Result<Outcome, Abort> {
    ensure_virtualenv(state, ctx, &SystemShell)
}

pub fn ensure_virtualenv(
    state: &mut RunState,
    ctx: &StepContext<'_>,
    shell: &dyn Shell,
) -> Result<Outcome, Abort> {
    let venv = state.paths.venv_dir();
    if state.dry_run {
        ctx.info("venv.dry_run", &[("path", &venv.display().to_string())]);
        return Ok(Outcome::Skip);
    }

    let python = create(state, ctx, shell, &venv)?;
    let python_cmd = python.to_string_lossy().into_owned();

    state.venv_bin = python.parent().map(Path::to_path_buf);
    state.venv_site_packages = state
        .python_version
        .as_deref()
        .and_then(|version| site_packages(&venv, version));
    state.venv_path = Some(venv);
    state.venv_python = Some(python);

    let mut issues = false;
    for dep in DEPENDENCIES {
        if let Some(installed) = installed_version(shell, &python_cmd, dep.name)
            && dep.accepts(&installed)
        {
            ctx.info("venv.pkg.present", &[("name", dep.name), ("version", &installed)]);
            continue;
        }

        ctx.info("venv.pkg.install", &[("name", dep.name), ("version", dep.preferred)]);
        if !pip_install(ctx, shell, &python_cmd, dep) {
            issues = true;
            continue;
        }

        match installed_version(shell, &python_cmd, dep.name) {
            Some(version) if version == dep.preferred => {
                ctx.info("venv.pkg.installed", &[("name", dep.name), ("version", &version)]);
            }
            Some(version) if dep.accepts(&version) => {
                ctx.warn("venv.pkg.accepted", &[("name", dep.name), ("version", &version)]);
            }
            other => {
                let version = other.unwrap_or_else(|| "?".to_string());
                ctx.warn("venv.pkg.mismatch", &[("name", dep.name), ("version", &version)]);
                issues = true;
            }
        }
    }

    Ok(if issues { Outcome::Warn } else { Outcome::Done })
}

/// Create the virtualenv unless its interpreter already exists
fn create(state: &RunState, ctx: &StepContext<'_>, shell: &dyn Shell, venv: &Path) -> Result<PathBuf, Abort> {
    let python = venv.join("bin").join("python");
    let shown = venv.display().to_string();
    if python.exists() {
        ctx.info("venv.exists", &[("path", &shown)]);
        return Ok(python);
    }

    ctx.info("venv.create", &[("path", &shown)]);
    let base = state
        .python
        .as_ref()
        .map_or_else(|| "python3".to_string(), |p| p.to_string_lossy().into_owned());
    match shell.status(&base, &["-m", "venv", "--system-site-packages", &shown]) {
        Ok(0) => {}
        Ok(code) => {
            return Err(Abort::with_code(code, ctx.t("venv.create_fail", &[("code", &code.to_string())])));
        }
        Err(_) => return Err(Abort::failure(ctx.t("venv.create_missing", &[]))),
    }

    if !python.exists() {
        let path = python.display().to_string();
        return Err(Abort::failure(ctx.t("venv.missing_python", &[("path", &path)])));
    }
    ctx.info("venv.created", &[("path", &shown)]);
    Ok(python)
}

fn installed_version(shell: &dyn Shell, python: &str, name: &str) -> Option<String> {
    let out = shell.output(python, &["-c", VERSION_SNIPPET, name]).ok()?;
    let version = out.stdout.trim();
    (out.success() && !version.is_empty()).then(|| version.to_string())
}

fn pip_install(ctx: &StepContext<'_>, shell: &dyn Shell, python: &str, dep: &Dependency) -> bool {
    let spec = format!("{}=={}", dep.name, dep.preferred);
    match shell.status(python, &["-m", "pip", "install", "--no-input", &spec]) {
        Ok(0) => true,
        Ok(code) => {
            ctx.error("venv.pip_fail", &[("package", dep.name), ("code", &code.to_string())]);
            false
        }
        Err(err) => {
            ctx.error("venv.pip_error", &[("error", &format!("{err:#}"))]);
            false
        }
    }
}
