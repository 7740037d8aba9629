use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rusqlite::Connection;
use serde::Deserialize;
use tracing::warn;

use crate::db::{self, VodRow};
use crate::parser::{self, TitlePattern};
use crate::roster::Roster;

/// One ingestion candidate before parsing: a raw title, the URL it came
/// from, and its timestamp string.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub url: String,
    pub title: String,
    pub vod_date: String,
}

/// A parsed and resolved match, staged for insertion pending confirmation.
/// Character ids may be absent: that marks the record unresolved, it does
/// not fail the extraction.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub url: String,
    pub p1: String,
    pub p1_id: i64,
    pub c1: String,
    pub c1_id: Option<i64>,
    pub p2: String,
    pub p2_id: i64,
    pub c2: String,
    pub c2_id: Option<i64>,
    pub event: String,
    pub event_id: i64,
    pub round: String,
    pub vod_date: String,
}

impl MatchRecord {
    pub fn is_resolved(&self) -> bool {
        self.c1_id.is_some() && self.c2_id.is_some()
    }

    pub fn describe(&self) -> String {
        format!(
            "p1={} c1={} p2={} c2={} event={} round={} vod_date={} url={}",
            self.p1, self.c1, self.p2, self.c2, self.event, self.round, self.vod_date, self.url
        )
    }

    pub fn to_row(&self) -> VodRow {
        VodRow {
            url: self.url.clone(),
            event_id: self.event_id,
            p1_id: self.p1_id,
            p2_id: self.p2_id,
            c1_id: self.c1_id,
            c2_id: self.c2_id,
            round: self.round.clone(),
            vod_date: self.vod_date.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct StageOutcome {
    pub staged: usize,
    pub already_present: usize,
    pub unmatched: usize,
    pub unresolved: usize,
}

impl StageOutcome {
    pub fn print(&self) {
        println!(
            "Staged {} ({} already present, {} did not match, {} unresolved characters).",
            self.staged, self.already_present, self.unmatched, self.unresolved
        );
    }
}

/// Parse and resolve a batch of candidates against the catalog. Parsing is
/// pure and runs in parallel; the resolve-and-stage pass stays sequential
/// because it touches the store. Nothing is inserted here: the caller prints
/// the staged records, asks for confirmation, and commits the batch.
///
/// `keep_unresolved` keeps records whose characters did not resolve (so they
/// can be fixed up later) instead of dropping them.
pub fn stage_candidates(
    conn: &Connection,
    roster: &Roster,
    pattern: &TitlePattern,
    candidates: &[Candidate],
    default_event: &str,
    keep_unresolved: bool,
) -> Result<(Vec<MatchRecord>, StageOutcome)> {
    let parsed: Vec<_> = candidates
        .par_iter()
        .map(|c| parser::extract(&c.title, pattern, default_event))
        .collect();

    let mut records = Vec::new();
    let mut outcome = StageOutcome::default();
    for (candidate, parsed) in candidates.iter().zip(parsed) {
        if db::vod_exists(conn, &candidate.url)? {
            println!("ALREADY PRESENT: {}", candidate.title);
            outcome.already_present += 1;
            continue;
        }
        let Some(parsed) = parsed else {
            println!("DOES NOT MATCH: {}", candidate.title);
            outcome.unmatched += 1;
            continue;
        };

        // A template without %C1/%C2 cannot tell us the characters; ask.
        let c1 = match parsed.c1 {
            Some(c) => c,
            None => prompt(&format!("c1 for {}", candidate.url), None),
        };
        let c2 = match parsed.c2 {
            Some(c) => c,
            None => prompt(&format!("c2 for {}", candidate.url), None),
        };

        let record = MatchRecord {
            url: candidate.url.clone(),
            p1_id: db::ensure_player(conn, &parsed.p1)?,
            p2_id: db::ensure_player(conn, &parsed.p2)?,
            event_id: db::ensure_event(conn, &parsed.event)?,
            c1_id: roster.resolve(&c1),
            c2_id: roster.resolve(&c2),
            p1: parsed.p1,
            p2: parsed.p2,
            c1,
            c2,
            event: parsed.event,
            round: parsed.round,
            vod_date: candidate.vod_date.clone(),
        };

        if !record.is_resolved() {
            outcome.unresolved += 1;
            if !keep_unresolved {
                continue;
            }
        }
        println!("{}", record.describe());
        records.push(record);
        outcome.staged += 1;
    }

    Ok((records, outcome))
}

/// Commit a staged batch in one transaction.
pub fn commit_records(conn: &Connection, records: &[MatchRecord]) -> Result<usize> {
    let rows: Vec<VodRow> = records.iter().map(MatchRecord::to_row).collect();
    db::insert_vods(conn, &rows)
}

// ── CSV ingestion ──

/// Column order matches the export format: url,p1,c1,p2,c2,event,round,date.
#[derive(Debug, Clone, Deserialize)]
pub struct CsvVod {
    pub url: String,
    pub p1: String,
    pub c1: String,
    pub p2: String,
    pub c2: String,
    pub event: String,
    pub round: String,
    pub date: String,
}

#[derive(Debug, Default)]
pub struct CsvOutcome {
    pub ingested: usize,
    pub already_present: usize,
    pub unresolved: usize,
}

impl CsvOutcome {
    pub fn print(&self) {
        println!(
            "Ingested {} vods ({} already present, {} with unresolved characters).",
            self.ingested, self.already_present, self.unresolved
        );
    }
}

/// Bulk-load a headerless CSV of vods. Malformed lines are reported and
/// skipped; the whole batch lands in one transaction.
pub fn ingest_csv(conn: &Connection, roster: &Roster, path: &Path) -> Result<CsvOutcome> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open CSV {}", path.display()))?;
    let rows = read_csv_rows(file);

    let pb = ProgressBar::new(rows.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec})")?
            .progress_chars("=> "),
    );

    let tx = conn.unchecked_transaction()?;
    let mut outcome = CsvOutcome::default();
    for row in &rows {
        pb.inc(1);
        if db::vod_exists(&tx, &row.url)? {
            outcome.already_present += 1;
            continue;
        }
        let vod = VodRow {
            url: row.url.clone(),
            event_id: db::ensure_event(&tx, &row.event)?,
            p1_id: db::ensure_player(&tx, &row.p1)?,
            p2_id: db::ensure_player(&tx, &row.p2)?,
            c1_id: roster.resolve(&row.c1),
            c2_id: roster.resolve(&row.c2),
            round: row.round.clone(),
            vod_date: row.date.clone(),
        };
        if vod.c1_id.is_none() || vod.c2_id.is_none() {
            outcome.unresolved += 1;
        }
        db::insert_vod(&tx, &vod)?;
        outcome.ingested += 1;
    }
    tx.commit()?;
    pb.finish_and_clear();
    Ok(outcome)
}

fn read_csv_rows<R: Read>(reader: R) -> Vec<CsvVod> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(reader);
    let mut rows = Vec::new();
    for (i, row) in csv_reader.deserialize::<CsvVod>().enumerate() {
        match row {
            Ok(row) => rows.push(row),
            Err(e) => warn!("Skipping CSV line {}: {}", i + 1, e),
        }
    }
    rows
}

// ── Description files ──

/// One line of a multi-VOD description file: a timestamp into the video and
/// the match title at that offset.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedTitle {
    pub seconds: u32,
    pub title: String,
}

impl TimestampedTitle {
    /// The per-match URL: the base VOD URL with a seek parameter.
    pub fn url(&self, base_url: &str) -> String {
        format!("{}&t={}", base_url, self.seconds)
    }
}

/// Read a description file of `MM:SS title` lines. Bad lines are reported
/// and skipped; they never abort the batch.
pub fn read_description_file(path: &Path) -> Result<Vec<TimestampedTitle>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read description file {}", path.display()))?;
    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_description_line(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("Skipping description line {:?}: {}", line, e),
        }
    }
    Ok(entries)
}

fn parse_description_line(line: &str) -> Result<TimestampedTitle> {
    let (timestamp, title) = line
        .split_once(' ')
        .context("expected '<timestamp> <title>'")?;
    Ok(TimestampedTitle {
        seconds: parse_timestamp(timestamp)?,
        title: title.trim().to_string(),
    })
}

/// Accepts plain seconds, MM:SS, or H:MM:SS.
pub fn parse_timestamp(s: &str) -> Result<u32> {
    let parts = s
        .split(':')
        .map(|p| {
            p.parse::<u32>()
                .with_context(|| format!("bad timestamp component {:?}", p))
        })
        .collect::<Result<Vec<_>>>()?;
    match parts.as_slice() {
        [secs] => Ok(*secs),
        [mins, secs] => Ok(mins * 60 + secs),
        [hours, mins, secs] => Ok(hours * 3600 + mins * 60 + secs),
        _ => bail!("unknown timestamp format {:?}", s),
    }
}

// ── Dates ──

/// Parse a human-entered MM/DD/YY date (MM/DD assumes the current year) as
/// UTC midnight.
pub fn parse_vod_date(s: &str) -> Result<DateTime<Utc>> {
    let parts: Vec<&str> = s.trim().split('/').collect();
    let (month, day, year) = match parts.as_slice() {
        [m, d, y] => (m.parse::<u32>()?, d.parse::<u32>()?, 2000 + y.parse::<i32>()?),
        [m, d] => (m.parse::<u32>()?, d.parse::<u32>()?, Utc::now().year()),
        _ => bail!("expected MM/DD/YY, got {:?}", s),
    };
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .with_context(|| format!("invalid date {:?}", s))?;
    Ok(date.and_time(NaiveTime::MIN).and_utc())
}

// ── Prompts ──

/// Prompt on stdout and read one trimmed line from stdin. Empty input falls
/// back to the default when one is given.
pub fn prompt(text: &str, default: Option<&str>) -> String {
    match default {
        Some(d) => print!("{} [{}]: ", text, d),
        None => print!("{}: ", text),
    }
    let _ = io::stdout().flush();

    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_err() {
        return default.unwrap_or_default().to_string();
    }
    let value = line.trim();
    if value.is_empty() {
        default.unwrap_or_default().to_string()
    } else {
        value.to_string()
    }
}

pub fn confirm(question: &str) -> bool {
    let answer = prompt(question, None).to_lowercase();
    matches!(answer.as_str(), "y" | "yes")
}
