use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::roster::Roster;

const DB_PATH: &str = "data/vods.sqlite";

/// Only Rivals of Aether II is cataloged today; the column exists so a second
/// game does not need a migration.
pub const RIVALS_2: i64 = 1;

// Submission statuses.
pub const STATUS_PENDING: i64 = 1;
pub const STATUS_REJECTED: i64 = 2;
pub const STATUS_APPROVED: i64 = 3;

pub fn connect() -> Result<Connection> {
    if let Some(dir) = std::path::Path::new(DB_PATH).parent() {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection, roster: &Roster) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS game_character (
            id   INTEGER PRIMARY KEY,
            name TEXT UNIQUE NOT NULL
        );

        -- UNIQUE keys turn the get-or-create race into a storage-level
        -- conflict that ensure_player/ensure_event absorb atomically.
        CREATE TABLE IF NOT EXISTS player (
            id  INTEGER PRIMARY KEY,
            tag TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS event (
            id   INTEGER PRIMARY KEY,
            name TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS vod (
            id         INTEGER PRIMARY KEY,
            game_id    INTEGER NOT NULL,
            event_id   INTEGER NOT NULL REFERENCES event(id),
            url        TEXT UNIQUE NOT NULL,
            p1_id      INTEGER NOT NULL REFERENCES player(id),
            p2_id      INTEGER NOT NULL REFERENCES player(id),
            c1_id      INTEGER REFERENCES game_character(id),
            c2_id      INTEGER REFERENCES game_character(id),
            round      TEXT NOT NULL DEFAULT '',
            vod_date   TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_vod_date ON vod(vod_date);

        CREATE TABLE IF NOT EXISTS submission (
            id         INTEGER PRIMARY KEY,
            game_id    INTEGER NOT NULL,
            url        TEXT NOT NULL,
            status     INTEGER NOT NULL DEFAULT 1,
            p1         TEXT,
            c1         TEXT,
            p2         TEXT,
            c2         TEXT,
            event      TEXT,
            round      TEXT,
            date       TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_submission_status ON submission(status);
        ",
    )?;

    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO game_character (id, name) VALUES (?1, ?2)")?;
    for &(name, id) in roster.characters() {
        stmt.execute(rusqlite::params![id, name])?;
    }
    Ok(())
}

// ── Dictionary resolution ──

/// Get-or-create a player by tag. One atomic statement: the ON CONFLICT
/// no-op update lets RETURNING hand back the existing row's id, so two
/// writers racing on the same unseen tag cannot produce duplicates.
pub fn ensure_player(conn: &Connection, tag: &str) -> Result<i64> {
    let id = conn.query_row(
        "INSERT INTO player (tag) VALUES (?1)
         ON CONFLICT(tag) DO UPDATE SET tag = excluded.tag
         RETURNING id",
        [tag],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Get-or-create an event by name. Same contract as ensure_player.
pub fn ensure_event(conn: &Connection, name: &str) -> Result<i64> {
    let id = conn.query_row(
        "INSERT INTO event (name) VALUES (?1)
         ON CONFLICT(name) DO UPDATE SET name = excluded.name
         RETURNING id",
        [name],
        |row| row.get(0),
    )?;
    Ok(id)
}

// ── Vods ──

pub fn vod_exists(conn: &Connection, url: &str) -> Result<bool> {
    let found = conn
        .query_row("SELECT id FROM vod WHERE url = ?1 LIMIT 1", [url], |row| {
            row.get::<_, i64>(0)
        })
        .map(|_| true);
    match found {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// A fully resolved vod ready to insert.
#[derive(Debug, Clone)]
pub struct VodRow {
    pub url: String,
    pub event_id: i64,
    pub p1_id: i64,
    pub p2_id: i64,
    pub c1_id: Option<i64>,
    pub c2_id: Option<i64>,
    pub round: String,
    pub vod_date: String,
}

pub fn insert_vod(conn: &Connection, row: &VodRow) -> Result<()> {
    conn.execute(
        "INSERT INTO vod (game_id, event_id, url, p1_id, p2_id, c1_id, c2_id, round, vod_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            RIVALS_2, row.event_id, row.url, row.p1_id, row.p2_id, row.c1_id, row.c2_id,
            row.round, row.vod_date,
        ],
    )?;
    Ok(())
}

/// Insert a batch of vods in one transaction, ignoring URLs already present.
/// Returns the number actually inserted.
pub fn insert_vods(conn: &Connection, rows: &[VodRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO vod
             (game_id, event_id, url, p1_id, p2_id, c1_id, c2_id, round, vod_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for row in rows {
            count += stmt.execute(rusqlite::params![
                RIVALS_2, row.event_id, row.url, row.p1_id, row.p2_id, row.c1_id, row.c2_id,
                row.round, row.vod_date,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

/// A joined vod row for display and export. Character columns come through
/// the inner join, so vods with unresolved characters do not appear here.
#[derive(Debug, Clone)]
pub struct Vod {
    pub url: String,
    pub event: String,
    pub p1_tag: String,
    pub c1_name: String,
    pub p2_tag: String,
    pub c2_name: String,
    pub round: String,
    pub vod_date: String,
}

impl Vod {
    /// The stored date, when it parses as RFC 3339. Vods with junk dates are
    /// still listed; they just never get a patch attributed.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.vod_date)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    }
}

const VOD_SELECT: &str = "
    SELECT vod.url, e.name, p1.tag, c1.name, p2.tag, c2.name, vod.round, vod.vod_date
    FROM vod
        INNER JOIN event e ON e.id = vod.event_id
        INNER JOIN player p1 ON p1.id = vod.p1_id
        INNER JOIN player p2 ON p2.id = vod.p2_id
        INNER JOIN game_character c1 ON c1.id = vod.c1_id
        INNER JOIN game_character c2 ON c2.id = vod.c2_id";

fn vod_from_row(row: &rusqlite::Row) -> rusqlite::Result<Vod> {
    Ok(Vod {
        url: row.get(0)?,
        event: row.get(1)?,
        p1_tag: row.get(2)?,
        c1_name: row.get(3)?,
        p2_tag: row.get(4)?,
        c2_name: row.get(5)?,
        round: row.get(6)?,
        vod_date: row.get(7)?,
    })
}

pub fn latest_vods(conn: &Connection, limit: usize) -> Result<Vec<Vod>> {
    let sql = format!("{} ORDER BY vod_date DESC LIMIT {}", VOD_SELECT, limit);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], vod_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every vod, oldest first, for CSV export.
pub fn all_vods(conn: &Connection) -> Result<Vec<Vod>> {
    let sql = format!("{} ORDER BY vod_date ASC", VOD_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], vod_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Substring filters for the catalog search. Empty strings match everything;
/// character names are expected in canonical lowercase form.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub p1: String,
    pub p2: String,
    pub c1: String,
    pub c2: String,
    pub event: String,
}

/// Search the catalog. Either player filter may hit either side; character
/// filters likewise, unless both name the same character, in which case both
/// sides must match. Results whose stored sides are flipped relative to the
/// queried character order are swapped for display.
pub fn search_vods(conn: &Connection, filter: &SearchFilter, limit: usize) -> Result<Vec<Vod>> {
    let p1 = format!("%{}%", filter.p1);
    let p2 = format!("%{}%", filter.p2);
    let c1 = format!("%{}%", filter.c1);
    let c2 = format!("%{}%", filter.c2);
    let event = format!("%{}%", filter.event);

    let vods = if filter.c1 != filter.c2 {
        let sql = format!(
            "{}
             WHERE (p1.tag LIKE ?1 OR p2.tag LIKE ?1)
               AND (p1.tag LIKE ?2 OR p2.tag LIKE ?2)
               AND (c1.name LIKE ?3 OR c2.name LIKE ?3)
               AND (c1.name LIKE ?4 OR c2.name LIKE ?4)
               AND e.name LIKE ?5
             ORDER BY vod_date DESC LIMIT {}",
            VOD_SELECT, limit
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params![p1, p2, c1, c2, event], vod_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    } else {
        // Mirror matchups (or no character filter at all): both sides must
        // satisfy the same filter.
        let sql = format!(
            "{}
             WHERE (p1.tag LIKE ?1 OR p2.tag LIKE ?1)
               AND (p1.tag LIKE ?2 OR p2.tag LIKE ?2)
               AND c1.name LIKE ?3 AND c2.name LIKE ?3
               AND e.name LIKE ?4
             ORDER BY vod_date DESC LIMIT {}",
            VOD_SELECT, limit
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params![p1, p2, c1, event], vod_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    // Present each result in the queried character order.
    let queried_c1 = filter.c1.to_lowercase();
    let swapped = vods
        .into_iter()
        .map(|v| {
            if !queried_c1.is_empty() && v.c2_name.to_lowercase() == queried_c1 {
                Vod {
                    p1_tag: v.p2_tag,
                    c1_name: v.c2_name,
                    p2_tag: v.p1_tag,
                    c2_name: v.c1_name,
                    ..v
                }
            } else {
                v
            }
        })
        .collect();
    Ok(swapped)
}

/// Keep vods where a ranked tag appears on one side (or on both sides when
/// `require_both`). Replaces the original site's string-spliced SQL with an
/// in-process pass over the result set.
pub fn filter_by_rank(vods: Vec<Vod>, ranked_tags: &[String], require_both: bool) -> Vec<Vod> {
    let ranked = |tag: &str| {
        let tag = tag.to_lowercase();
        ranked_tags.iter().any(|r| tag.contains(r.as_str()))
    };
    vods.into_iter()
        .filter(|v| {
            let p1 = ranked(&v.p1_tag);
            let p2 = ranked(&v.p2_tag);
            if require_both {
                p1 && p2
            } else {
                p1 || p2
            }
        })
        .collect()
}

// ── Submissions ──

#[derive(Debug, Clone, Default)]
pub struct NewSubmission {
    pub url: String,
    pub p1: Option<String>,
    pub c1: Option<String>,
    pub p2: Option<String>,
    pub c2: Option<String>,
    pub event: Option<String>,
    pub round: Option<String>,
    pub date: Option<String>,
}

pub fn create_submission(conn: &Connection, sub: &NewSubmission) -> Result<()> {
    conn.execute(
        "INSERT INTO submission (game_id, url, status, p1, c1, p2, c2, event, round, date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            RIVALS_2, sub.url, STATUS_PENDING, sub.p1, sub.c1, sub.p2, sub.c2, sub.event,
            sub.round, sub.date,
        ],
    )?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub id: i64,
    pub url: String,
    pub p1: Option<String>,
    pub c1: Option<String>,
    pub p2: Option<String>,
    pub c2: Option<String>,
    pub event: Option<String>,
    pub round: Option<String>,
    pub date: Option<String>,
}

pub fn pending_submissions(conn: &Connection) -> Result<Vec<Submission>> {
    let mut stmt = conn.prepare(
        "SELECT id, url, p1, c1, p2, c2, event, round, date
         FROM submission WHERE status = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([STATUS_PENDING], |row| {
            Ok(Submission {
                id: row.get(0)?,
                url: row.get(1)?,
                p1: row.get(2)?,
                c1: row.get(3)?,
                p2: row.get(4)?,
                c2: row.get(5)?,
                event: row.get(6)?,
                round: row.get(7)?,
                date: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn set_submission_status(conn: &Connection, id: i64, status: i64) -> Result<()> {
    conn.execute(
        "UPDATE submission SET status = ?1 WHERE id = ?2",
        rusqlite::params![status, id],
    )?;
    Ok(())
}

// ── Stats ──

pub struct Stats {
    pub vods: usize,
    pub players: usize,
    pub events: usize,
    pub pending_submissions: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let vods: usize = conn.query_row("SELECT COUNT(*) FROM vod", [], |r| r.get(0))?;
    let players: usize = conn.query_row("SELECT COUNT(*) FROM player", [], |r| r.get(0))?;
    let events: usize = conn.query_row("SELECT COUNT(*) FROM event", [], |r| r.get(0))?;
    let pending_submissions: usize = conn.query_row(
        "SELECT COUNT(*) FROM submission WHERE status = ?1",
        [STATUS_PENDING],
        |r| r.get(0),
    )?;
    Ok(Stats {
        vods,
        players,
        events,
        pending_submissions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn, &Roster::rivals2()).unwrap();
        conn
    }

    fn test_vod(conn: &Connection, url: &str, p1: &str, c1: i64, p2: &str, c2: i64, date: &str) {
        let row = VodRow {
            url: url.into(),
            event_id: ensure_event(conn, "Test Event").unwrap(),
            p1_id: ensure_player(conn, p1).unwrap(),
            p2_id: ensure_player(conn, p2).unwrap(),
            c1_id: Some(c1),
            c2_id: Some(c2),
            round: String::new(),
            vod_date: date.into(),
        };
        insert_vod(conn, &row).unwrap();
    }

    #[test]
    fn ensure_player_is_get_or_create() {
        let conn = test_conn();
        let first = ensure_player(&conn, "Alex").unwrap();
        let second = ensure_player(&conn, "Alex").unwrap();
        assert_eq!(first, second);

        let count: usize = conn
            .query_row("SELECT COUNT(*) FROM player WHERE tag = 'Alex'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);

        let other = ensure_player(&conn, "Bob").unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn ensure_event_is_get_or_create() {
        let conn = test_conn();
        let first = ensure_event(&conn, "Genesis X").unwrap();
        let second = ensure_event(&conn, "Genesis X").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn roster_is_seeded() {
        let conn = test_conn();
        let count: usize = conn
            .query_row("SELECT COUNT(*) FROM game_character", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, Roster::rivals2().characters().len());
    }

    #[test]
    fn vod_exists_round_trip() {
        let conn = test_conn();
        assert!(!vod_exists(&conn, "https://example.com/1").unwrap());
        test_vod(&conn, "https://example.com/1", "Alex", 3, "Bob", 12, "2024-01-01T00:00:00Z");
        assert!(vod_exists(&conn, "https://example.com/1").unwrap());
    }

    #[test]
    fn latest_vods_newest_first() {
        let conn = test_conn();
        test_vod(&conn, "https://example.com/old", "Alex", 3, "Bob", 12, "2024-01-01T00:00:00Z");
        test_vod(&conn, "https://example.com/new", "Cyn", 8, "Dyl", 4, "2024-06-01T00:00:00Z");
        let vods = latest_vods(&conn, 10).unwrap();
        assert_eq!(vods.len(), 2);
        assert_eq!(vods[0].url, "https://example.com/new");
    }

    #[test]
    fn unresolved_characters_are_excluded_from_listings() {
        let conn = test_conn();
        let row = VodRow {
            url: "https://example.com/unresolved".into(),
            event_id: ensure_event(&conn, "Test Event").unwrap(),
            p1_id: ensure_player(&conn, "Alex").unwrap(),
            p2_id: ensure_player(&conn, "Bob").unwrap(),
            c1_id: None,
            c2_id: Some(12),
            round: String::new(),
            vod_date: "2024-01-01T00:00:00Z".into(),
        };
        insert_vod(&conn, &row).unwrap();
        assert!(latest_vods(&conn, 10).unwrap().is_empty());
    }

    #[test]
    fn search_matches_either_side() {
        let conn = test_conn();
        test_vod(&conn, "https://example.com/1", "Alex", 3, "Bob", 12, "2024-01-01T00:00:00Z");

        let filter = SearchFilter {
            p1: "bob".into(),
            ..Default::default()
        };
        // LIKE is case-insensitive for ASCII in SQLite.
        assert_eq!(search_vods(&conn, &filter, 10).unwrap().len(), 1);

        let filter = SearchFilter {
            p1: "nobody".into(),
            ..Default::default()
        };
        assert!(search_vods(&conn, &filter, 10).unwrap().is_empty());
    }

    #[test]
    fn search_swaps_sides_to_match_query_order() {
        let conn = test_conn();
        // Stored as olympia vs zetterburn.
        test_vod(&conn, "https://example.com/1", "Alex", 12, "Bob", 3, "2024-01-01T00:00:00Z");

        let filter = SearchFilter {
            c1: "zetterburn".into(),
            ..Default::default()
        };
        let vods = search_vods(&conn, &filter, 10).unwrap();
        assert_eq!(vods.len(), 1);
        assert_eq!(vods[0].c1_name, "zetterburn");
        assert_eq!(vods[0].p1_tag, "Bob");
    }

    #[test]
    fn mirror_search_requires_both_sides() {
        let conn = test_conn();
        test_vod(&conn, "https://example.com/1", "Alex", 3, "Bob", 12, "2024-01-01T00:00:00Z");
        test_vod(&conn, "https://example.com/2", "Cyn", 3, "Dyl", 3, "2024-02-01T00:00:00Z");

        let filter = SearchFilter {
            c1: "zetterburn".into(),
            c2: "zetterburn".into(),
            ..Default::default()
        };
        let vods = search_vods(&conn, &filter, 10).unwrap();
        assert_eq!(vods.len(), 1);
        assert_eq!(vods[0].url, "https://example.com/2");
    }

    #[test]
    fn rank_filter_one_and_both() {
        let conn = test_conn();
        test_vod(&conn, "https://example.com/1", "Alex", 3, "Bob", 12, "2024-01-01T00:00:00Z");
        test_vod(&conn, "https://example.com/2", "Cyn", 8, "Dyl", 4, "2024-02-01T00:00:00Z");
        let vods = latest_vods(&conn, 10).unwrap();

        let ranked = vec!["alex".to_string(), "bob".to_string()];
        assert_eq!(filter_by_rank(vods.clone(), &ranked, false).len(), 1);
        assert_eq!(filter_by_rank(vods.clone(), &ranked, true).len(), 1);

        let one_sided = vec!["alex".to_string()];
        assert_eq!(filter_by_rank(vods.clone(), &one_sided, false).len(), 1);
        assert!(filter_by_rank(vods, &one_sided, true).is_empty());
    }

    #[test]
    fn submission_lifecycle() {
        let conn = test_conn();
        create_submission(
            &conn,
            &NewSubmission {
                url: "https://youtube.com/watch?v=abc".into(),
                p1: Some("Alex".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let pending = pending_submissions(&conn).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].p1.as_deref(), Some("Alex"));

        set_submission_status(&conn, pending[0].id, STATUS_APPROVED).unwrap();
        assert!(pending_submissions(&conn).unwrap().is_empty());
    }

    #[test]
    fn duplicate_url_is_rejected() {
        let conn = test_conn();
        test_vod(&conn, "https://example.com/1", "Alex", 3, "Bob", 12, "2024-01-01T00:00:00Z");
        let row = VodRow {
            url: "https://example.com/1".into(),
            event_id: ensure_event(&conn, "Test Event").unwrap(),
            p1_id: ensure_player(&conn, "Cyn").unwrap(),
            p2_id: ensure_player(&conn, "Dyl").unwrap(),
            c1_id: Some(8),
            c2_id: Some(4),
            round: String::new(),
            vod_date: String::new(),
        };
        assert!(insert_vod(&conn, &row).is_err());
        // The batch path ignores the duplicate instead.
        assert_eq!(insert_vods(&conn, &[row]).unwrap(), 0);
        let count: usize = conn
            .query_row("SELECT COUNT(*) FROM vod", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
