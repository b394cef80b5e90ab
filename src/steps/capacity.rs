//! CPU, memory and disk capacity checks

use super::docker_root;
use crate::host::{self, GIB};
use crate::paths;
use crate::state::RunState;
use stagekit::{Abort, Outcome, StepContext};
use std::path::{Path, PathBuf};

pub const CPU_MIN: usize = 8;
pub const RAM_MIN_GIB: u64 = 16;
pub const DISK_MIN_GIB: u64 = 30;

/// What the host reported
#[derive(Debug, Clone, Default)]
pub struct Measurements {
    pub cpus: Option<usize>,
    pub ram_bytes: Option<u64>,
    pub disks: Vec<DiskReading>,
}

/// Free space for one requested location
#[derive(Debug, Clone)]
pub struct DiskReading {
    pub requested: PathBuf,
    pub checked: PathBuf,
    pub free_bytes: Option<u64>,
}

impl DiskReading {
    fn measure(requested: &Path) -> Self {
        let checked = paths::nearest_existing(requested);
        let free_bytes = host::free_space(&checked)
            .inspect_err(|err| log::debug!("{err:#}"))
            .ok();
        Self {
            requested: requested.to_path_buf(),
            checked,
            free_bytes,
        }
    }
}

pub fn run(state: &mut RunState, ctx: &StepContext<'_>) -> Result<Outcome, Abort> {
    if state.skip_checks {
        ctx.info("capacity.skip", &[]);
        return Ok(Outcome::Skip);
    }
    if state.dry_run {
        ctx.info("capacity.dry_run.cpu", &[("required", &CPU_MIN.to_string())]);
        ctx.info("capacity.dry_run.ram", &[("required", &RAM_MIN_GIB.to_string())]);
        ctx.info(
            "capacity.dry_run.disk",
            &[
                ("path", &state.root_mount.display().to_string()),
                ("required", &DISK_MIN_GIB.to_string()),
            ],
        );
        return Ok(Outcome::Skip);
    }

    ctx.info("capacity.start", &[]);
    let docker_root = docker_root::ensure_docker_root(state, ctx);
    let measurements = Measurements {
        cpus: host::cpu_count(),
        ram_bytes: host::mem_total(),
        disks: vec![
            DiskReading::measure(&state.root_mount),
            DiskReading::measure(&docker_root),
        ],
    };

    let warnings = evaluate(ctx, &measurements);
    finish(state, ctx, &warnings)
}

/// Report every reading and collect the warnings
pub fn evaluate(ctx: &StepContext<'_>, m: &Measurements) -> Vec<String> {
    let mut warnings = Vec::new();
    let cpu_required = CPU_MIN.to_string();
    let ram_required = RAM_MIN_GIB.to_string();
    let disk_required = DISK_MIN_GIB.to_string();

    match m.cpus {
        None | Some(0) => warnings.push(ctx.warn("capacity.cpu_unknown", &[])),
        Some(cpus) => {
            let actual = cpus.to_string();
            ctx.info("capacity.cpu", &[("actual", &actual), ("required", &cpu_required)]);
            if cpus < CPU_MIN {
                warnings.push(ctx.warn(
                    "capacity.cpu_warn",
                    &[("actual", &actual), ("required", &cpu_required)],
                ));
            }
        }
    }

    match m.ram_bytes {
        None => warnings.push(ctx.warn("capacity.ram_unknown", &[])),
        Some(bytes) => {
            let actual = host::gib(bytes);
            ctx.info("capacity.ram", &[("actual", &actual), ("required", &ram_required)]);
            if bytes < RAM_MIN_GIB * GIB {
                warnings.push(ctx.warn(
                    "capacity.ram_warn",
                    &[("actual", &actual), ("required", &ram_required)],
                ));
            }
        }
    }

    for disk in &m.disks {
        let requested = disk.requested.display().to_string();
        if disk.requested != disk.checked {
            ctx.info(
                "capacity.disk.lookup",
                &[("requested", &requested), ("checked", &disk.checked.display().to_string())],
            );
        }
        let Some(free) = disk.free_bytes else {
            warnings.push(ctx.warn("capacity.disk_unknown", &[("path", &requested)]));
            continue;
        };
        let free_gib = host::gib(free);
        ctx.info(
            "capacity.disk",
            &[
                ("path", &disk.checked.display().to_string()),
                ("free", &free_gib),
                ("required", &disk_required),
            ],
        );
        if free < DISK_MIN_GIB * GIB {
            warnings.push(ctx.warn(
                "capacity.disk_warn",
                &[("path", &requested), ("free", &free_gib), ("required", &disk_required)],
            ));
        }
    }

    warnings
}

fn finish(state: &RunState, ctx: &StepContext<'_>, warnings: &[String]) -> Result<Outcome, Abort> {
    if warnings.is_empty() {
        ctx.info("capacity.ok", &[]);
    } else {
        ctx.warn("capacity.summary_warn", &[("count", &warnings.len().to_string())]);
    }
    super::decide_on_warnings(state, ctx, warnings, "capacity.confirm")
}
