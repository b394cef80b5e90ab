//! Filesystem layout of an installation
//!
//! Everything the installer reads or writes lives under the project root:
//!
//! ```text
//! <root>/
//!   script/            create_configs.py, install.py, .venv/
//!   configs/           auth.yaml, captcha.yaml, team.yaml, global.yaml
//!   packages/ca/       intermediate.crt, intermediate.key
//!   logs/              easy-install_<timestamp>.log
//! ```
//!
//! # Root Resolution Priority
//!
//! 1. `--project-root` flag
//! 2. `EASY_INSTALL_ROOT` environment variable (through clap)
//! 3. Parent of the directory holding the executable

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Environment variable for project root override
pub const ENV_ROOT: &str = "EASY_INSTALL_ROOT";

/// Directory the web server reads TLS material from
pub const CERT_DIR: &str = "/etc/nginx/ssl";

/// Certificate chain file name (leaf + intermediate)
pub const BUNDLE_NAME: &str = "compass.bundle.crt";

/// Private key file name
pub const KEY_NAME: &str = "compass.key";

/// Resolved directories of one installation
#[derive(Debug, Clone, Serialize)]
pub struct Paths {
    pub project_root: PathBuf,
    pub configs_dir: PathBuf,
    pub script_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub ca_cert: PathBuf,
    pub ca_key: PathBuf,
    pub cert_dir: PathBuf,
}

impl Paths {
    /// Lay out every path under `root`
    pub fn from_root(root: &Path) -> Self {
        let ca_dir = root.join("packages").join("ca");
        Self {
            project_root: root.to_path_buf(),
            configs_dir: root.join("configs"),
            script_dir: root.join("script"),
            logs_dir: root.join("logs"),
            ca_cert: ca_dir.join("intermediate.crt"),
            ca_key: ca_dir.join("intermediate.key"),
            cert_dir: PathBuf::from(CERT_DIR),
        }
    }

    /// Resolve the project root and lay out paths under it
    pub fn resolve(root_override: Option<&Path>) -> Result<Self> {
        let root = match root_override {
            Some(root) => expand(&root.to_string_lossy()),
            None => default_root()?,
        };
        log::debug!("Using project root: {}", root.display());
        Ok(Self::from_root(&root))
    }

    pub fn bundle_path(&self) -> PathBuf {
        self.cert_dir.join(BUNDLE_NAME)
    }

    pub fn key_path(&self) -> PathBuf {
        self.cert_dir.join(KEY_NAME)
    }

    pub fn venv_dir(&self) -> PathBuf {
        self.script_dir.join(".venv")
    }

    /// Default log file: `<root>/logs/easy-install_<YYYYmmdd_HHMMSS>.log`
    pub fn default_log_file(&self) -> PathBuf {
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.logs_dir.join(format!("easy-install_{ts}.log"))
    }
}

fn default_root() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Could not locate the running executable")?;
    let root = exe
        .parent()
        .and_then(Path::parent)
        .context("Executable has no parent directory")?;
    Ok(root.to_path_buf())
}

/// Expand `~` and environment variables in a path
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Closest existing ancestor of `path` (or `path` itself)
pub fn nearest_existing(path: &Path) -> PathBuf {
    path.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.exists())
        .map_or_else(|| PathBuf::from("/"), Path::to_path_buf)
}
