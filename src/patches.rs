use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::warn;

use crate::db::Vod;

/// A dated balance patch. The list is short and human-curated
/// (data/patches.txt), so attribution is a plain scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub name: String,
    pub date: DateTime<Utc>,
    pub url: String,
}

/// A vod paired with the patch it was played on, if any.
#[derive(Debug, Clone)]
pub struct PatchedVod {
    pub vod: Vod,
    pub patch_name: Option<String>,
    pub patch_url: Option<String>,
}

/// Load the patch list: one `name,date,url` per line, dates as MM/DD/YY
/// interpreted as UTC midnight. `#` comments and blank lines are skipped;
/// a malformed line is reported and skipped, never fatal.
pub fn load(path: &Path) -> Result<Vec<Patch>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read patch list {}", path.display()))?;
    Ok(parse(&text))
}

fn parse(text: &str) -> Vec<Patch> {
    let mut patches = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Ok(patch) => patches.push(patch),
            Err(e) => warn!("Skipping malformed patch line {:?}: {}", line, e),
        }
    }
    patches
}

fn parse_line(line: &str) -> Result<Patch> {
    let mut fields = line.splitn(3, ',');
    let name = fields.next().unwrap_or("").trim();
    let date = fields.next().context("missing date field")?.trim();
    let url = fields.next().context("missing url field")?.trim();

    let date = NaiveDate::parse_from_str(date, "%m/%d/%y")
        .with_context(|| format!("bad date {:?}", date))?
        .and_time(NaiveTime::MIN)
        .and_utc();

    Ok(Patch {
        name: name.to_string(),
        date,
        url: url.to_string(),
    })
}

/// Attribute each vod to the most recent patch at or before its date. Vods
/// with no parseable date, or that predate every patch, get no patch. Input
/// order is preserved.
///
/// Patches sharing an effective date are ordered by name, so the
/// alphabetically first name wins; the result is the same for any input
/// ordering of the patch list.
pub fn attach(vods: Vec<Vod>, patches: &[Patch]) -> Vec<PatchedVod> {
    let mut ordered: Vec<&Patch> = patches.iter().collect();
    ordered.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.name.cmp(&b.name)));

    vods.into_iter()
        .map(|vod| {
            let found = vod
                .date()
                .and_then(|d| ordered.iter().find(|p| p.date <= d));
            PatchedVod {
                patch_name: found.map(|p| p.name.clone()),
                patch_url: found.map(|p| p.url.clone()),
                vod,
            }
        })
        .collect()
}
