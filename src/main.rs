mod db;
mod ingest;
mod parser;
mod patches;
mod roster;
mod youtube;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::ingest::Candidate;
use crate::patches::PatchedVod;
use crate::roster::Roster;

const PATCHES_PATH: &str = "data/patches.txt";
const LUNARANK_PATH: &str = "data/lunarank.txt";
const ALEXRANK_PATH: &str = "data/alexrank.txt";

#[derive(Parser)]
#[command(name = "rivals-vods", about = "Rivals of Aether II tournament VOD catalog")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and seed the character roster
    Init,
    /// Bulk-load vods from a headerless CSV (url,p1,c1,p2,c2,event,round,date)
    IngestCsv {
        file: PathBuf,
    },
    /// Pull a channel's search results and ingest titles matching a template
    IngestChannel {
        channel_id: String,
        /// Search query sent to the channel (e.g. a tournament series name)
        query: String,
        /// Title template, e.g. "%P1 (%C1) %V %P2 (%C2) - %R - %E"
        template: String,
    },
    /// Pull a playlist and ingest titles matching a template
    IngestPlaylist {
        playlist_url: String,
        /// Event name applied when the template has no %E
        event: String,
        template: String,
    },
    /// Ingest timestamped matches from a description file for one long VOD
    IngestTimestamps {
        /// Base VOD URL; each match gets a &t= seek parameter
        url: String,
        event: String,
        template: String,
        /// Date applied to every match (MM/DD/YY)
        date: String,
        /// File of "MM:SS title" lines
        file: PathBuf,
    },
    /// Submit a vod for review
    Submit {
        url: String,
        #[arg(long)]
        p1: Option<String>,
        #[arg(long)]
        c1: Option<String>,
        #[arg(long)]
        p2: Option<String>,
        #[arg(long)]
        c2: Option<String>,
        #[arg(long)]
        event: Option<String>,
        #[arg(long)]
        round: Option<String>,
        /// MM/DD/YY
        #[arg(long)]
        date: Option<String>,
    },
    /// Review pending submissions interactively
    Review,
    /// Most recent vods
    Latest {
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Search the catalog
    Search {
        #[arg(long, default_value = "")]
        p1: String,
        #[arg(long, default_value = "")]
        p2: String,
        #[arg(long, default_value = "")]
        c1: String,
        #[arg(long, default_value = "")]
        c2: String,
        #[arg(long, default_value = "")]
        event: String,
        /// Restrict to ranked players: one_lunarank, two_lunarank,
        /// one_alexrank, two_alexrank
        #[arg(long)]
        rank: Option<String>,
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Export the whole catalog as CSV
    Export {
        file: PathBuf,
    },
    /// Catalog statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let roster = Roster::rivals2();

    let result = match cli.command {
        Commands::Init => {
            let conn = db::connect()?;
            db::init_schema(&conn, &roster)?;
            println!("Initialized the database.");
            Ok(())
        }
        Commands::IngestCsv { file } => {
            let conn = db::connect()?;
            db::init_schema(&conn, &roster)?;
            let outcome = ingest::ingest_csv(&conn, &roster, &file)?;
            outcome.print();
            Ok(())
        }
        Commands::IngestChannel {
            channel_id,
            query,
            template,
        } => {
            let conn = db::connect()?;
            db::init_schema(&conn, &roster)?;
            let pattern = parser::compile(&template);

            let client = youtube::YoutubeClient::from_env()?;
            let videos = client.search_channel(&channel_id, &query).await?;
            let candidates: Vec<Candidate> = videos
                .iter()
                .map(|v| Candidate {
                    url: v.watch_url(),
                    title: v.title.clone(),
                    vod_date: v.published_at.clone(),
                })
                .collect();

            let (records, outcome) =
                ingest::stage_candidates(&conn, &roster, &pattern, &candidates, "Unknown", false)?;
            outcome.print();
            commit_staged(&conn, &records)
        }
        Commands::IngestPlaylist {
            playlist_url,
            event,
            template,
        } => {
            let conn = db::connect()?;
            db::init_schema(&conn, &roster)?;
            let pattern = parser::compile(&template);

            let client = youtube::YoutubeClient::from_env()?;
            let playlist_id = youtube::playlist_id(&playlist_url)?;
            let videos = client.playlist_videos(&playlist_id).await?;
            let candidates: Vec<Candidate> = videos
                .iter()
                .map(|v| Candidate {
                    url: v.watch_url(),
                    title: v.title.clone(),
                    vod_date: v.published_at.clone(),
                })
                .collect();

            // Playlists are curated, so keep records with unrecognized
            // character spellings instead of silently dropping them.
            let (records, outcome) =
                ingest::stage_candidates(&conn, &roster, &pattern, &candidates, &event, true)?;
            outcome.print();
            commit_staged(&conn, &records)
        }
        Commands::IngestTimestamps {
            url,
            event,
            template,
            date,
            file,
        } => {
            let conn = db::connect()?;
            db::init_schema(&conn, &roster)?;
            let pattern = parser::compile(&template);
            let vod_date = ingest::parse_vod_date(&date)?.to_rfc3339();

            let entries = ingest::read_description_file(&file)?;
            let candidates: Vec<Candidate> = entries
                .iter()
                .map(|e| Candidate {
                    url: e.url(&url),
                    title: e.title.clone(),
                    vod_date: vod_date.clone(),
                })
                .collect();

            let (records, outcome) =
                ingest::stage_candidates(&conn, &roster, &pattern, &candidates, &event, false)?;
            outcome.print();
            commit_staged(&conn, &records)
        }
        Commands::Submit {
            url,
            p1,
            c1,
            p2,
            c2,
            event,
            round,
            date,
        } => {
            validate_submission_url(&url)?;
            let conn = db::connect()?;
            db::init_schema(&conn, &roster)?;
            db::create_submission(
                &conn,
                &db::NewSubmission {
                    url,
                    p1,
                    c1,
                    p2,
                    c2,
                    event,
                    round,
                    date,
                },
            )?;
            println!("Submitted for review.");
            Ok(())
        }
        Commands::Review => {
            let conn = db::connect()?;
            db::init_schema(&conn, &roster)?;
            review_submissions(&conn, &roster)
        }
        Commands::Latest { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn, &roster)?;
            let vods = db::latest_vods(&conn, limit)?;
            print_vods(&attach_patches(vods));
            Ok(())
        }
        Commands::Search {
            p1,
            p2,
            c1,
            c2,
            event,
            rank,
            limit,
        } => {
            let conn = db::connect()?;
            db::init_schema(&conn, &roster)?;

            let filter = db::SearchFilter {
                p1,
                p2,
                c1: c1.trim().to_lowercase(),
                c2: c2.trim().to_lowercase(),
                event,
            };
            let mut vods = db::search_vods(&conn, &filter, limit)?;

            if let Some(rank) = rank {
                let (path, require_both) = rank_source(&rank)
                    .with_context(|| format!("Unknown rank filter {:?}", rank))?;
                let ranked = load_rank_list(Path::new(path))?;
                vods = db::filter_by_rank(vods, &ranked, require_both);
            }

            print_vods(&attach_patches(vods));
            Ok(())
        }
        Commands::Export { file } => {
            let conn = db::connect()?;
            db::init_schema(&conn, &roster)?;
            let vods = db::all_vods(&conn)?;
            let count = vods.len();

            let mut writer = csv::Writer::from_path(&file)
                .with_context(|| format!("Failed to open {}", file.display()))?;
            for v in &vods {
                writer.write_record([
                    &v.url, &v.p1_tag, &v.c1_name, &v.p2_tag, &v.c2_name, &v.event, &v.round,
                    &v.vod_date,
                ])?;
            }
            writer.flush()?;
            println!("Exported {} vods to {}", count, file.display());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn, &roster)?;
            let s = db::get_stats(&conn)?;
            println!("Vods:                {}", s.vods);
            println!("Players:             {}", s.players);
            println!("Events:              {}", s.events);
            println!("Pending submissions: {}", s.pending_submissions);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Shared confirm-then-commit tail of every staged ingestion flow.
fn commit_staged(conn: &rusqlite::Connection, records: &[ingest::MatchRecord]) -> Result<()> {
    if records.is_empty() {
        println!("Nothing to commit.");
        return Ok(());
    }
    if !ingest::confirm(&format!(
        "Commit {} vods to the database? [y/n]",
        records.len()
    )) {
        println!("Aborted; nothing committed.");
        return Ok(());
    }
    let inserted = ingest::commit_records(conn, records)?;
    println!("Committed {} vods.", inserted);
    Ok(())
}

// ── Submissions ──

fn validate_submission_url(raw: &str) -> Result<()> {
    if raw.trim().is_empty() {
        bail!("Need a URL.");
    }
    let parsed = url::Url::parse(raw).with_context(|| format!("Invalid URL {:?}", raw))?;
    let host = parsed.host_str().context("URL has no host")?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if !matches!(host, "youtube.com" | "twitch.tv") {
        bail!("Only YouTube and Twitch VODs are accepted for now.");
    }
    Ok(())
}

fn review_submissions(conn: &rusqlite::Connection, roster: &Roster) -> Result<()> {
    let pending = db::pending_submissions(conn)?;
    if pending.is_empty() {
        println!("No pending submissions.");
        return Ok(());
    }
    println!("{} submissions to review.\n", pending.len());

    for mut sub in pending {
        loop {
            print_submission(&sub);
            let action = ingest::prompt("Approve [a] Edit [e] Skip [s] Reject [r]", None)
                .to_lowercase();
            match action.as_str() {
                "a" => {
                    approve_submission(conn, roster, &sub)?;
                    break;
                }
                "e" => {
                    edit_submission(&mut sub);
                    print_submission(&sub);
                    if ingest::confirm("Commit this to the database? [y/n]") {
                        approve_submission(conn, roster, &sub)?;
                    }
                    break;
                }
                "s" => break,
                "r" => {
                    db::set_submission_status(conn, sub.id, db::STATUS_REJECTED)?;
                    println!("Rejected.");
                    break;
                }
                _ => println!("Unknown action."),
            }
        }
        println!();
    }
    Ok(())
}

fn print_submission(sub: &db::Submission) {
    let field = |v: &Option<String>| v.as_deref().unwrap_or("-").to_string();
    println!("#{} {}", sub.id, sub.url);
    println!(
        "  {} ({}) vs {} ({})",
        field(&sub.p1),
        field(&sub.c1),
        field(&sub.p2),
        field(&sub.c2)
    );
    println!(
        "  event={} round={} date={}",
        field(&sub.event),
        field(&sub.round),
        field(&sub.date)
    );
}

fn edit_submission(sub: &mut db::Submission) {
    let field = |text: &str, current: &Option<String>| -> Option<String> {
        let value = ingest::prompt(text, current.as_deref());
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    };
    sub.url = ingest::prompt("URL", Some(&sub.url));
    sub.p1 = field("Player 1", &sub.p1);
    sub.c1 = field("Char 1", &sub.c1);
    sub.p2 = field("Player 2", &sub.p2);
    sub.c2 = field("Char 2", &sub.c2);
    sub.event = field("Event", &sub.event);
    sub.round = field("Round", &sub.round);
    sub.date = field("Date (MM/DD/YY)", &sub.date);
}

fn approve_submission(
    conn: &rusqlite::Connection,
    roster: &Roster,
    sub: &db::Submission,
) -> Result<()> {
    let vod_date = match sub.date.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(d) => match ingest::parse_vod_date(d) {
            Ok(parsed) => parsed.to_rfc3339(),
            Err(e) => {
                warn!("Keeping submission {} with no date: {}", sub.id, e);
                String::new()
            }
        },
        None => String::new(),
    };

    let row = db::VodRow {
        url: sub.url.clone(),
        event_id: db::ensure_event(conn, sub.event.as_deref().unwrap_or("Unknown"))?,
        p1_id: db::ensure_player(conn, sub.p1.as_deref().unwrap_or(""))?,
        p2_id: db::ensure_player(conn, sub.p2.as_deref().unwrap_or(""))?,
        c1_id: sub.c1.as_deref().and_then(|c| roster.resolve(c)),
        c2_id: sub.c2.as_deref().and_then(|c| roster.resolve(c)),
        round: sub.round.clone().unwrap_or_default(),
        vod_date,
    };
    db::insert_vod(conn, &row)?;
    db::set_submission_status(conn, sub.id, db::STATUS_APPROVED)?;
    println!("Approved {}", sub.url);
    Ok(())
}

// ── Listings ──

fn attach_patches(vods: Vec<db::Vod>) -> Vec<PatchedVod> {
    let patch_list = match patches::load(Path::new(PATCHES_PATH)) {
        Ok(list) => list,
        Err(e) => {
            warn!("No patch list loaded: {}", e);
            Vec::new()
        }
    };
    patches::attach(vods, &patch_list)
}

fn print_vods(vods: &[PatchedVod]) {
    if vods.is_empty() {
        println!("No vods found.");
        return;
    }

    println!(
        "{:>3} | {:<10} | {:<34} | {:<20} | {:<16} | {:<10} | {}",
        "#", "Date", "Match", "Event", "Round", "Patch", "URL"
    );
    println!("{}", "-".repeat(120));

    for (i, pv) in vods.iter().enumerate() {
        let v = &pv.vod;
        let matchup = format!(
            "{} ({}) vs {} ({})",
            v.p1_tag, v.c1_name, v.p2_tag, v.c2_name
        );
        let date = v
            .date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".into());
        let patch = pv.patch_name.as_deref().unwrap_or("-");

        println!(
            "{:>3} | {:<10} | {:<34} | {:<20} | {:<16} | {:<10} | {}",
            i + 1,
            date,
            truncate(&matchup, 34),
            truncate(&v.event, 20),
            truncate(&v.round, 16),
            truncate(patch, 10),
            v.url
        );
    }

    println!("\n{} vods", vods.len());
}

// ── Rank lists ──

fn rank_source(rank: &str) -> Option<(&'static str, bool)> {
    match rank.to_lowercase().as_str() {
        "one_lunarank" => Some((LUNARANK_PATH, false)),
        "two_lunarank" => Some((LUNARANK_PATH, true)),
        "one_alexrank" => Some((ALEXRANK_PATH, false)),
        "two_alexrank" => Some((ALEXRANK_PATH, true)),
        _ => None,
    }
}

fn load_rank_list(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read rank list {}", path.display()))?;
    Ok(parse_rank_list(&text))
}

/// One tag per line, lowercased; `#` comments and blank lines are skipped.
fn parse_rank_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_lowercase)
        .collect()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
