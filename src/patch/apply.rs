//! Patch driver: load, transform, persist, aggregate

use super::Patch;
use crate::network::{IpDetector, SystemIpDetector};
use crate::state::RunState;
use stagekit::{Abort, Outcome, StepContext};
use yamlpatch::Document;

/// Step entry point
pub fn run(state: &mut RunState, ctx: &StepContext<'_>) -> Result<Outcome, Abort> {
    apply_all_patches(state, ctx, &SystemIpDetector)
}

/// Apply every registered patch to its document under the configs directory
///
/// Documents are processed strictly in registry order. A missing or
/// unparsable document aborts the run before any later document is read;
/// documents already written stay written. Returns `PROCEED_WITH_WARNINGS`
/// when any patch produced a warning, `DONE` otherwise, and `SKIP` without
/// touching the filesystem in dry-run mode.
pub fn apply_all_patches(
    state: &mut RunState,
    ctx: &StepContext<'_>,
    ip: &dyn IpDetector,
) -> Result<Outcome, Abort> {
    let configs_dir = state.paths.configs_dir.clone();
    if state.dry_run {
        ctx.info("patch.dry_run", &[("path", &configs_dir.display().to_string())]);
        return Ok(Outcome::Skip);
    }

    let mut warnings: Vec<String> = Vec::new();

    for patch in Patch::ALL {
        let target = configs_dir.join(patch.filename());
        let path = target.display().to_string();

        if !target.exists() {
            return Err(Abort::failure(ctx.t("patch.missing", &[("path", &path)])));
        }

        let failed = |err: yamlpatch::Error| {
            Abort::failure(ctx.t("patch.failed", &[("path", &path), ("error", &err.to_string())]))
        };

        let mut doc = Document::load(&target).map_err(failed)?;
        let patch_warnings = patch.apply(&mut doc, state, ctx, ip).map_err(failed)?;

        if doc.is_modified() {
            log_changes(ctx, &doc);
        }
        doc.save(&target).map_err(failed)?;

        for message in &patch_warnings {
            ctx.reporter.warn(message);
        }
        warnings.extend(patch_warnings);

        ctx.info("patch.applied", &[("path", &path)]);
    }

    if !warnings.is_empty() {
        ctx.info("patch.warnings_total", &[("count", &warnings.len().to_string())]);
    }

    Ok(Outcome::from_warnings(&warnings))
}

const MASK: &str = "\"********\"";

/// Keys whose values never reach the log
fn is_secret_key(key: &str) -> bool {
    key == "password" || key.ends_with(".password")
}

/// Log changed lines at debug level, with secret values masked on both
/// sides of the diff
fn log_changes(ctx: &StepContext<'_>, doc: &Document) {
    let new_text = doc.render();
    let diff = similar::TextDiff::from_lines(doc.source(), &new_text);
    let mut lines = vec![doc.origin().to_string()];

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            similar::ChangeTag::Delete => '-',
            similar::ChangeTag::Insert => '+',
            similar::ChangeTag::Equal => continue,
        };
        let text = change.value().trim_end();
        let text = yamlpatch::mask_value(text, MASK, is_secret_key)
            .unwrap_or_else(|| text.to_string());
        lines.push(format!("{sign} {text}"));
    }

    ctx.reporter.debug(&lines.join("\n"));
}
