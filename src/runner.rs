use crate::progress;
use anyhow::{Context, Result};
use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Exit code used when a child died without one (signal)
const NO_EXIT_CODE: i32 = 2;

/// Captured result of a finished command
#[derive(Debug, Clone, Default)]
pub struct CmdOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code to propagate when the command failed
    pub fn exit_code(&self) -> i32 {
        self.code.unwrap_or(NO_EXIT_CODE)
    }

    /// Best single-line description of a failure
    pub fn error_text(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        text.trim().lines().last().unwrap_or_default().to_string()
    }
}

fn describe(cmd: &str, args: &[&str]) -> String {
    if args.is_empty() {
        cmd.to_string()
    } else {
        format!("{} {}", cmd, args.join(" "))
    }
}

/// Run a command and inherit stdio (shows output in real-time)
pub fn run(cmd: &str, args: &[&str]) -> Result<ExitStatus> {
    Command::new(cmd)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("Failed to execute: {}", describe(cmd, args)))
}

/// Run a command with extra environment variables and inherited stdio
pub fn run_with_env<K, V>(
    cmd: &Path,
    args: &[&str],
    envs: &[(K, V)],
    cwd: Option<&Path>,
) -> Result<ExitStatus>
where
    K: AsRef<OsStr>,
    V: AsRef<OsStr>,
{
    let mut command = Command::new(cmd);
    command
        .args(args)
        .envs(envs.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    command
        .status()
        .with_context(|| format!("Failed to execute: {}", describe(&cmd.to_string_lossy(), args)))
}

/// Run a command and capture everything, whatever its exit status
pub fn run_output(cmd: &str, args: &[&str]) -> Result<CmdOutput> {
    let output = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {}", describe(cmd, args)))?;

    Ok(CmdOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run a command under a spinner, capturing its output
pub fn run_with_spinner(msg: &str, cmd: &str, args: &[&str]) -> Result<CmdOutput> {
    log::debug!("Running: {}", describe(cmd, args));
    let pb = progress::spinner(msg);
    let result = run_output(cmd, args);
    match &result {
        Ok(out) if out.success() => progress::finish_success(&pb, msg),
        Ok(_) | Err(_) => progress::finish_warn(&pb, msg),
    }
    result
}

/// Run a command silently, returning success/failure
pub fn run_quiet(cmd: &str, args: &[&str]) -> bool {
    Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Locate an executable on `PATH`
pub fn find_in_path(cmd: &str) -> Option<PathBuf> {
    if cmd.contains('/') {
        let path = PathBuf::from(cmd);
        return is_executable(&path).then_some(path);
    }
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(cmd))
        .find(|candidate| is_executable(candidate))
}

/// Check if a command exists
pub fn command_exists(cmd: &str) -> bool {
    find_in_path(cmd).is_some()
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

/// Exit code to propagate for a finished child
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(NO_EXIT_CODE)
}

/// Process execution seam for steps that drive system tools
pub trait Shell {
    /// Locate an executable on `PATH`
    fn which(&self, cmd: &str) -> Option<PathBuf>;

    /// Run with inherited stdio, returning the exit code
    fn status(&self, cmd: &str, args: &[&str]) -> Result<i32>;

    /// Run and capture output
    fn output(&self, cmd: &str, args: &[&str]) -> Result<CmdOutput>;

    /// Run with inherited stdio and extra environment variables
    fn status_env(&self, cmd: &Path, args: &[&str], envs: &[(String, String)]) -> Result<i32>;
}

/// The real host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShell;

impl Shell for SystemShell {
    fn which(&self, cmd: &str) -> Option<PathBuf> {
        find_in_path(cmd)
    }

    fn status(&self, cmd: &str, args: &[&str]) -> Result<i32> {
        log::debug!("Running: {}", describe(cmd, args));
        run(cmd, args).map(exit_code)
    }

    fn output(&self, cmd: &str, args: &[&str]) -> Result<CmdOutput> {
        log::debug!("Running: {}", describe(cmd, args));
        run_output(cmd, args)
    }

    fn status_env(&self, cmd: &Path, args: &[&str], envs: &[(String, String)]) -> Result<i32> {
        log::debug!("Running: {}", describe(&cmd.to_string_lossy(), args));
        run_with_env(cmd, args, envs, None).map(exit_code)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_output_captures() {
        let out = run_output("sh", &["-c", "echo out; echo err >&2; exit 3"]).unwrap();
        assert_eq!(out.code, Some(3));
        assert!(!out.success());
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.error_text(), "err");
        assert_eq!(out.exit_code(), 3);
    }

    #[test]
    fn test_run_missing_binary() {
        assert!(run_output("definitely-not-a-real-binary-xyz", &[]).is_err());
        assert!(!run_quiet("definitely-not-a-real-binary-xyz", &[]));
    }

    #[test]
    fn test_find_in_path() {
        assert!(command_exists("sh"));
        assert!(!command_exists("definitely-not-a-real-binary-xyz"));
        assert!(find_in_path("/bin/sh").is_some());
    }

    #[test]
    fn test_error_text_falls_back_to_stdout() {
        let out = CmdOutput {
            code: Some(1),
            stdout: "first\nlast line\n".into(),
            stderr: "  ".into(),
        };
        assert_eq!(out.error_text(), "last line");
    }

    #[test]
    fn test_fake_shell_script() {
        let shell = fake::FakeShell::new()
            .missing("service")
            .respond("systemctl is-active", 3, "inactive")
            .respond("systemctl is-active", 0, "active");

        assert!(shell.which("service").is_none());
        assert!(shell.status("service", &["docker", "start"]).is_err());
        assert_eq!(shell.output("systemctl", &["is-active", "docker"]).unwrap().code, Some(3));
        assert_eq!(shell.output("systemctl", &["is-active", "docker"]).unwrap().code, Some(0));
        assert_eq!(shell.output("systemctl", &["is-active", "docker"]).unwrap().code, Some(0));
        assert_eq!(shell.status("true", &[]).unwrap(), 0);
        assert_eq!(shell.calls().len(), 5);
    }
}
