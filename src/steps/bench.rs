//! Random I/O benchmark with fio

use super::docker_root;
use crate::runner::{self, CmdOutput};
use crate::state::RunState;
use anyhow::Result;
use serde::Deserialize;
use stagekit::{Abort, Answer, Outcome, StepContext};
use std::fs;
use std::path::{Path, PathBuf};

pub const TEST_FILENAME: &str = "easy-install-fio-test.bin";

/// Required IOPS for one direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub avg: f64,
    pub min: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    RandWrite,
    RandRead,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RandWrite => "randwrite",
            Self::RandRead => "randread",
        }
    }

    pub fn limits(self) -> Limits {
        match self {
            Self::RandWrite => Limits { avg: 600.0, min: 324.0 },
            Self::RandRead => Limits { avg: 600.0, min: 288.0 },
        }
    }
}

/// Measured IOPS
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub avg: f64,
    pub min: f64,
}

impl Metrics {
    pub fn meets(&self, limits: Limits) -> bool {
        self.avg >= limits.avg && self.min >= limits.min
    }
}

#[derive(Debug, Deserialize)]
struct FioReport {
    #[serde(default)]
    jobs: Vec<FioJob>,
}

#[derive(Debug, Deserialize)]
struct FioJob {
    read: Option<FioStats>,
    write: Option<FioStats>,
}

#[derive(Debug, Deserialize)]
struct FioStats {
    iops: Option<f64>,
    iops_min: Option<f64>,
}

/// Extract the metrics of `mode` from fio's JSON output
pub fn parse_report(json: &str, mode: Mode) -> Result<Metrics> {
    let report: FioReport = serde_json::from_str(json)?;
    let job = report
        .jobs
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("jobs array empty"))?;
    let stats = match mode {
        Mode::RandWrite => job.write,
        Mode::RandRead => job.read,
    };
    Ok(stats.map_or(Metrics { avg: 0.0, min: 0.0 }, |s| Metrics {
        avg: s.iops.unwrap_or(0.0),
        min: s.iops_min.unwrap_or(0.0),
    }))
}

/// fio arguments for one run against `file`
pub fn fio_args(file: &Path, mode: Mode, runtime_secs: u64) -> Vec<String> {
    vec![
        format!("--name=easy_install_{}", mode.as_str()),
        format!("--filename={}", file.display()),
        format!("--rw={}", mode.as_str()),
        "--bs=4k".to_string(),
        "--iodepth=16".to_string(),
        "--numjobs=1".to_string(),
        "--direct=1".to_string(),
        format!("--runtime={}", runtime_secs.max(1)),
        "--time_based=1".to_string(),
        "--size=1G".to_string(),
        "--ioengine=libaio".to_string(),
        "--group_reporting=1".to_string(),
        "--output-format=json".to_string(),
    ]
}

/// Runs one fio job and returns its captured output
pub type FioRunner<'a> = &'a dyn Fn(&Path, Mode, u64) -> Result<CmdOutput>;

fn system_fio(fio: &Path) -> impl Fn(&Path, Mode, u64) -> Result<CmdOutput> + '_ {
    move |file, mode, runtime| {
        let args = fio_args(file, mode, runtime);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let msg = format!("fio {} {}", mode.as_str(), file.display());
        runner::run_with_spinner(&msg, &fio.to_string_lossy(), &args)
    }
}

pub fn run(state: &mut RunState, ctx: &StepContext<'_>) -> Result<Outcome, Abort> {
    if state.skip_checks || state.skip_bench {
        ctx.info("bench.skip", &[]);
        return Ok(Outcome::Skip);
    }
    if state.dry_run {
        ctx.info("bench.dry_run", &[]);
        return Ok(Outcome::Skip);
    }

    let Some(fio) = runner::find_in_path("fio") else {
        return skip_without_fio(state, ctx);
    };

    ctx.info("bench.start", &[]);
    let docker_root = docker_root::ensure_docker_root(state, ctx);
    let locations = vec![state.root_mount.clone(), docker_root];
    let fio = system_fio(&fio);
    let warnings = benchmark(state, ctx, &locations, &fio);
    finish(state, ctx, &warnings)
}

/// `fio` is not installed: skip, after asking unless auto-confirming
pub fn skip_without_fio(state: &RunState, ctx: &StepContext<'_>) -> Result<Outcome, Abort> {
    ctx.warn("bench.no_fio", &[]);
    ctx.info("bench.install_hint", &[]);
    if state.auto_confirm {
        ctx.info("bench.auto_skip", &[]);
        return Ok(Outcome::SkipWith("fio".to_string()));
    }
    match ctx.confirm("bench.confirm") {
        Answer::Yes => {
            ctx.info("bench.manual_skip", &[]);
            Ok(Outcome::SkipWith("fio".to_string()))
        }
        Answer::No => Err(Abort::failure(ctx.t("bench.aborted", &[]))),
        Answer::Interrupted => Err(Abort::interrupted(ctx.t("common.interrupted", &[]))),
    }
}

/// Existing, de-duplicated benchmark directories
fn prepare_locations(ctx: &StepContext<'_>, locations: &[PathBuf], warnings: &mut Vec<String>) -> Vec<PathBuf> {
    let mut unique: Vec<PathBuf> = Vec::new();
    for location in locations {
        if let Err(err) = fs::create_dir_all(location) {
            warnings.push(ctx.warn(
                "bench.mkdir_fail",
                &[("path", &location.display().to_string()), ("error", &err.to_string())],
            ));
            continue;
        }
        let resolved = fs::canonicalize(location).unwrap_or_else(|_| location.clone());
        if !unique.contains(&resolved) {
            unique.push(resolved);
        }
    }
    unique
}

/// Benchmark every location, returning the warnings
pub fn benchmark(
    state: &RunState,
    ctx: &StepContext<'_>,
    locations: &[PathBuf],
    fio: FioRunner<'_>,
) -> Vec<String> {
    let mut warnings = Vec::new();

    for location in prepare_locations(ctx, locations, &mut warnings) {
        let test_file = location.join(TEST_FILENAME);
        let path = location.display().to_string();

        for mode in [Mode::RandWrite, Mode::RandRead] {
            let metrics = match measure(ctx, fio, &test_file, mode, state.bench_runtime_secs) {
                Ok(metrics) => metrics,
                Err(warning) => {
                    warnings.push(warning);
                    // Nothing to read back
                    break;
                }
            };

            let limits = mode.limits();
            let avg = format!("{:.2}", metrics.avg);
            let min = format!("{:.2}", metrics.min);
            let req_avg = format!("{:.0}", limits.avg);
            let req_min = format!("{:.0}", limits.min);
            let params = [
                ("path", path.as_str()),
                ("mode", mode.as_str()),
                ("avg", avg.as_str()),
                ("min", min.as_str()),
                ("req_avg", req_avg.as_str()),
                ("req_min", req_min.as_str()),
            ];
            ctx.info("bench.metrics", &params);
            if !metrics.meets(limits) {
                warnings.push(ctx.warn("bench.warn", &params));
            }
        }

        if test_file.exists()
            && let Err(err) = fs::remove_file(&test_file)
        {
            log::debug!("Could not remove {}: {err}", test_file.display());
        }
    }

    warnings
}

fn measure(
    ctx: &StepContext<'_>,
    fio: FioRunner<'_>,
    file: &Path,
    mode: Mode,
    runtime_secs: u64,
) -> Result<Metrics, String> {
    let out = fio(file, mode, runtime_secs).map_err(|err| {
        ctx.warn("bench.exec_error", &[("mode", mode.as_str()), ("error", &format!("{err:#}"))])
    })?;
    if !out.success() {
        return Err(ctx.warn(
            "bench.exec_error",
            &[("mode", mode.as_str()), ("error", &out.error_text())],
        ));
    }
    parse_report(&out.stdout, mode).map_err(|err| {
        ctx.warn("bench.parse_error", &[("mode", mode.as_str()), ("error", &err.to_string())])
    })
}

fn finish(state: &RunState, ctx: &StepContext<'_>, warnings: &[String]) -> Result<Outcome, Abort> {
    if warnings.is_empty() {
        ctx.info("bench.ok", &[]);
    } else {
        ctx.warn("bench.summary_warn", &[("count", &warnings.len().to_string())]);
    }
    super::decide_on_warnings(state, ctx, warnings, "bench.confirm_warnings")
}
