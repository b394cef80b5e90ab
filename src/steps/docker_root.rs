//! Docker data-root discovery, shared by the capacity and bench steps

use crate::runner::{self, CmdOutput};
use crate::state::RunState;
use anyhow::Result;
use stagekit::StepContext;
use std::path::{Path, PathBuf};

pub const DEFAULT_DOCKER_ROOT: &str = "/var/lib/docker";

const DAEMON_JSON: &str = "/etc/docker/daemon.json";

fn docker_info() -> Result<CmdOutput> {
    runner::run_output("docker", &["info", "--format", "{{.DockerRootDir}}"])
}

/// Docker data-root, cached in the run state after the first lookup
pub fn ensure_docker_root(state: &mut RunState, ctx: &StepContext<'_>) -> PathBuf {
    ensure_with(state, ctx, &docker_info, Path::new(DAEMON_JSON))
}

pub fn ensure_with(
    state: &mut RunState,
    ctx: &StepContext<'_>,
    info: &dyn Fn() -> Result<CmdOutput>,
    daemon_json: &Path,
) -> PathBuf {
    if state.dry_run {
        return PathBuf::from(DEFAULT_DOCKER_ROOT);
    }
    if let Some(path) = &state.docker_data_root {
        ctx.debug("docker.root.cached", &[("path", &path.display().to_string())]);
        return path.clone();
    }

    ctx.info("docker.root.start", &[]);
    let path = from_docker_info(ctx, info)
        .or_else(|| from_daemon_json(ctx, daemon_json))
        .unwrap_or_else(|| {
            ctx.info("docker.root.default", &[("path", DEFAULT_DOCKER_ROOT)]);
            PathBuf::from(DEFAULT_DOCKER_ROOT)
        });

    ctx.info("docker.root.result", &[("path", &path.display().to_string())]);
    state.docker_data_root = Some(path.clone());
    path
}

fn from_docker_info(ctx: &StepContext<'_>, info: &dyn Fn() -> Result<CmdOutput>) -> Option<PathBuf> {
    let out = match info() {
        Ok(out) => out,
        Err(err) => {
            ctx.debug("docker.root.info_missing", &[("error", &format!("{err:#}"))]);
            return None;
        }
    };
    if !out.success() {
        let error = out.error_text();
        let error = if error.is_empty() { out.exit_code().to_string() } else { error };
        ctx.warn("docker.root.info_fail", &[("error", &error)]);
        return None;
    }

    let root = out.stdout.trim();
    if root.is_empty() {
        ctx.warn("docker.root.info_empty", &[]);
        return None;
    }
    ctx.info("docker.root.info_success", &[("path", root)]);
    Some(PathBuf::from(root))
}

fn from_daemon_json(ctx: &StepContext<'_>, daemon_json: &Path) -> Option<PathBuf> {
    let shown = daemon_json.display().to_string();
    let Ok(text) = std::fs::read_to_string(daemon_json) else {
        ctx.debug("docker.root.daemon_missing_file", &[("path", &shown)]);
        return None;
    };

    let data: serde_json::Value = match serde_json::from_str(&text) {
        Ok(data) => data,
        Err(err) => {
            ctx.warn("docker.root.daemon_parse", &[("error", &err.to_string())]);
            return None;
        }
    };

    match data.get("data-root").and_then(serde_json::Value::as_str) {
        Some(root) if !root.is_empty() => {
            ctx.info("docker.root.daemon_success", &[("path", root)]);
            Some(PathBuf::from(root))
        }
        _ => {
            ctx.warn("docker.root.daemon_no_key", &[]);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::harness::Harness;
    use std::cell::Cell;
    use std::fs;

    fn output(code: i32, stdout: &str) -> Result<CmdOutput> {
        Ok(CmdOutput {
            code: Some(code),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    fn no_docker() -> Result<CmdOutput> {
        anyhow::bail!("Failed to execute: docker info")
    }

    #[test]
    fn test_docker_info_wins() {
        let mut h = Harness::new();
        let daemon = h.dir.path().join("daemon.json");
        let info = || output(0, "/srv/docker\n");

        let root = h.with_ctx(|state, ctx| ensure_with(state, ctx, &info, &daemon));
        assert_eq!(root, PathBuf::from("/srv/docker"));
        assert_eq!(h.state.docker_data_root, Some(root));
    }

    #[test]
    fn test_daemon_json_fallback() {
        let mut h = Harness::new();
        let daemon = h.dir.path().join("daemon.json");
        fs::write(&daemon, r#"{"data-root": "/data/docker", "log-driver": "json-file"}"#).unwrap();

        let root = h.with_ctx(|state, ctx| ensure_with(state, ctx, &no_docker, &daemon));
        assert_eq!(root, PathBuf::from("/data/docker"));
    }

    #[test]
    fn test_default_when_nothing_known() {
        let mut h = Harness::new();
        let daemon = h.dir.path().join("daemon.json");
        fs::write(&daemon, "{not json").unwrap();
        let info = || output(1, "");

        let root = h.with_ctx(|state, ctx| ensure_with(state, ctx, &info, &daemon));
        assert_eq!(root, PathBuf::from(DEFAULT_DOCKER_ROOT));
        assert_eq!(h.reporter.warnings().len(), 2);
    }

    #[test]
    fn test_cached_value_skips_lookup() {
        let mut h = Harness::new();
        h.state.docker_data_root = Some(PathBuf::from("/cached"));
        let calls = Cell::new(0);
        let info = || {
            calls.set(calls.get() + 1);
            output(0, "/other")
        };

        let root = h.with_ctx(|state, ctx| ensure_with(state, ctx, &info, Path::new("/nonexistent")));
        assert_eq!(root, PathBuf::from("/cached"));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_dry_run_does_not_cache() {
        let mut h = Harness::dry_run();
        let info = || output(0, "/srv/docker");
        let root = h.with_ctx(|state, ctx| ensure_with(state, ctx, &info, Path::new("/nonexistent")));
        assert_eq!(root, PathBuf::from(DEFAULT_DOCKER_ROOT));
        assert!(h.state.docker_data_root.is_none());
    }
}
