//! Operating system detection

use crate::state::{OsFamily, RunState};
use stagekit::{Abort, Outcome, StepContext};
use std::collections::HashMap;
use std::fs;

const OS_RELEASE: &str = "/etc/os-release";

const DEB_IDS: &[&str] = &["debian", "ubuntu"];
const RPM_IDS: &[&str] = &["rhel", "centos", "rocky", "almalinux", "fedora", "amzn", "ol"];

/// Identity of the running distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsInfo {
    pub family: Option<OsFamily>,
    pub id: String,
    pub name: String,
    pub version: String,
}

/// Parse `KEY=value` lines, stripping quotes
pub fn parse_os_release(text: &str) -> HashMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// Classify by `ID` first, then by each `ID_LIKE` entry
pub fn classify(id: &str, id_like: &[String]) -> Option<OsFamily> {
    let family_of = |candidate: &str| {
        if DEB_IDS.contains(&candidate) {
            Some(OsFamily::Deb)
        } else if RPM_IDS.contains(&candidate) {
            Some(OsFamily::Rpm)
        } else {
            None
        }
    };

    family_of(id).or_else(|| {
        id_like
            .iter()
            .find_map(|like| family_of(like.as_str()).filter(|f| *f == OsFamily::Deb))
            .or_else(|| id_like.iter().find_map(|like| family_of(like.as_str())))
    })
}

/// Build [`OsInfo`] from parsed os-release fields
pub fn describe(fields: &HashMap<String, String>) -> OsInfo {
    let id = fields.get("ID").map(|v| v.to_lowercase()).unwrap_or_default();
    let name = fields
        .get("NAME")
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| if id.is_empty() { "Unknown".to_string() } else { id.clone() });
    let version = fields
        .get("VERSION_ID")
        .or_else(|| fields.get("VERSION"))
        .cloned()
        .unwrap_or_default();
    let id_like: Vec<String> = fields
        .get("ID_LIKE")
        .map(|v| v.split_whitespace().map(str::to_lowercase).collect())
        .unwrap_or_default();

    OsInfo {
        family: classify(&id, &id_like),
        id,
        name,
        version,
    }
}

pub fn run(state: &mut RunState, ctx: &StepContext<'_>) -> Result<Outcome, Abort> {
    ctx.info("os.detect.start", &[]);
    let text = fs::read_to_string(OS_RELEASE).unwrap_or_default();
    detect(state, ctx, &text)
}

/// Detection over already-read os-release text
pub fn detect(state: &mut RunState, ctx: &StepContext<'_>, text: &str) -> Result<Outcome, Abort> {
    let info = describe(&parse_os_release(text));

    let Some(family) = info.family else {
        let os_id = if info.id.is_empty() { "unknown" } else { info.id.as_str() };
        ctx.info("os.detect.expected.deb", &[]);
        ctx.info("os.detect.expected.rpm", &[]);
        return Err(Abort::failure(ctx.t("os.detect.unsupported", &[("os_id", os_id)])));
    };

    let family_label = match family {
        OsFamily::Deb => ctx.t("os.type.deb", &[]),
        OsFamily::Rpm => ctx.t("os.type.rpm", &[]),
    };
    let version = if info.version.is_empty() { "?" } else { info.version.as_str() };
    ctx.info(
        "os.detect.result",
        &[
            ("name", &info.name),
            ("version", version),
            ("os_id", &info.id),
            ("os_type", &family_label),
        ],
    );

    state.os_type = Some(family);
    state.os_id = Some(info.id);
    state.os_name = Some(info.name);
    state.os_version = Some(info.version);
    Ok(Outcome::Done)
}
