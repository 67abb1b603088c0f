use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::DashboardResult;

pub mod models;
use models::*;

/// Score literal recorded for walkovers; such matches never count as settled bets.
pub const WALKOVER: &str = "W/O";

/// Handle on the SQLite file holding bets, matches and predictions.
///
/// Only the path is kept: every read opens its own connection and drops it
/// when done, so nothing is shared between pipeline invocations.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    settled_cutoff: NaiveDate,
}

impl Database {
    /// Open (or create) the database and make sure the schema exists.
    pub fn open(path: impl AsRef<Path>, settled_cutoff: NaiveDate) -> DashboardResult<Self> {
        let db = Database {
            path: path.as_ref().to_path_buf(),
            settled_cutoff,
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn connect(&self) -> DashboardResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(conn)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> DashboardResult<()> {
        let conn = self.connect()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    pub fn settled_cutoff(&self) -> NaiveDate {
        self.settled_cutoff
    }

    // ── Bets ──────────────────────────────────────────────────────────────────

    /// All bet legs of `user_id` for the requested settlement status, across
    /// the three competition tables, oldest scheduled match first.
    ///
    /// Settled fetches only keep matches on/after the configured cutoff whose
    /// score is not a walkover. An unknown user yields an empty vector.
    pub fn fetch_bets(&self, user_id: i64, status: BetStatus) -> DashboardResult<Vec<BetRecord>> {
        let conn = self.connect()?;
        let cutoff = self.settled_cutoff;

        let mut bets = fetch_men(&conn, user_id, status, cutoff)?;
        bets.extend(fetch_women(&conn, user_id, status, cutoff)?);
        bets.extend(fetch_doubles(&conn, user_id, status, cutoff)?);

        // Stable: legs of the same slot keep their per-table order.
        bets.sort_by_key(|b| b.scheduled_at);
        debug!(
            "Fetched {} {:?} bet legs for user {}",
            bets.len(),
            status,
            user_id
        );
        Ok(bets)
    }

    // ── Upcoming matches ──────────────────────────────────────────────────────

    /// Every match not settled yet, across the three competition tables,
    /// ordered by scheduled time. Odds and predictions are optional.
    pub fn fetch_future_matches(&self) -> DashboardResult<Vec<FutureMatch>> {
        let conn = self.connect()?;
        let mut matches = Vec::new();
        for (category, names) in [
            (Category::Atp, SINGLES_NAMES),
            (Category::Wta, SINGLES_NAMES),
            (Category::Doubles, DOUBLES_NAMES),
        ] {
            let sql = future_sql(category.table(), names);
            let mut stmt = conn.prepare(&sql)?;
            let raws = stmt
                .query_map([], map_raw_future)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for raw in raws {
                match FutureMatch::from_raw(raw, category) {
                    Ok(m) => matches.push(m),
                    Err(e) => warn!("Skipping upcoming {} match: {}", category.code(), e),
                }
            }
        }
        matches.sort_by_key(|m| m.scheduled_at);
        debug!("Fetched {} upcoming matches", matches.len());
        Ok(matches)
    }

    // ── Users ─────────────────────────────────────────────────────────────────

    /// Bankroll of the user, `0.0` when the user is unknown.
    pub fn load_bankroll(&self, user_id: i64) -> DashboardResult<f64> {
        let conn = self.connect()?;
        let bankroll: Option<f64> = conn
            .query_row(
                "SELECT bankroll FROM Users WHERE ID_USER = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bankroll.unwrap_or(0.0))
    }
}

// ── Per-category fetches ───────────────────────────────────────────────────────

pub fn fetch_men(
    conn: &Connection,
    user_id: i64,
    status: BetStatus,
    cutoff: NaiveDate,
) -> DashboardResult<Vec<BetRecord>> {
    let sql = select_sql(Category::Atp.table(), SINGLES_NAMES, status);
    run_fetch(conn, &sql, Category::Atp, user_id, status, cutoff)
}

pub fn fetch_women(
    conn: &Connection,
    user_id: i64,
    status: BetStatus,
    cutoff: NaiveDate,
) -> DashboardResult<Vec<BetRecord>> {
    let sql = select_sql(Category::Wta.table(), SINGLES_NAMES, status);
    run_fetch(conn, &sql, Category::Wta, user_id, status, cutoff)
}

/// Doubles teams are labelled `player1/player2`.
pub fn fetch_doubles(
    conn: &Connection,
    user_id: i64,
    status: BetStatus,
    cutoff: NaiveDate,
) -> DashboardResult<Vec<BetRecord>> {
    let sql = select_sql(Category::Doubles.table(), DOUBLES_NAMES, status);
    run_fetch(conn, &sql, Category::Doubles, user_id, status, cutoff)
}

const SINGLES_NAMES: &str = "m.winner_name, m.loser_name";
const DOUBLES_NAMES: &str = "m.winner_name1 || '/' || m.winner_name2, \
                             m.loser_name1 || '/' || m.loser_name2";

fn select_sql(table: &str, names: &str, status: BetStatus) -> String {
    let filter = match status {
        BetStatus::Settled => {
            "m.match_settled IN (1, 2) AND m.score IS NOT NULL AND m.score != ?3 \
             AND m.tourney_date >= ?2"
        }
        BetStatus::Unsettled => "m.match_settled NOT IN (1, 2)",
    };
    format!(
        "SELECT b.ID_MATCH, b.ID_USER, b.bet, b.stake, b.odds,
                m.tourney_name, m.tourney_level, m.round, m.surface, m.score,
                m.match_settled, m.tourney_date, {names},
                p.winner_pred, p.loser_pred
         FROM Bet b
         JOIN {table} m ON b.ID_MATCH = m.ID_MATCH
         JOIN predictions p ON p.ID_MATCH = m.ID_MATCH
         WHERE b.ID_USER = ?1 AND {filter}
         ORDER BY m.tourney_date ASC, b.ID_BET ASC"
    )
}

fn run_fetch(
    conn: &Connection,
    sql: &str,
    category: Category,
    user_id: i64,
    status: BetStatus,
    cutoff: NaiveDate,
) -> DashboardResult<Vec<BetRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = match status {
        BetStatus::Settled => {
            let cutoff = cutoff.format("%Y-%m-%d").to_string();
            stmt.query_map(params![user_id, cutoff, WALKOVER], map_raw_bet)?
        }
        BetStatus::Unsettled => stmt.query_map(params![user_id], map_raw_bet)?,
    };
    let raws = rows.collect::<rusqlite::Result<Vec<_>>>()?;

    let fetched = raws.len();
    let records: Vec<BetRecord> = raws
        .into_iter()
        .filter_map(|raw| match BetRecord::from_raw(raw, category) {
            Ok(rec) => Some(rec),
            Err(e) => {
                warn!("Skipping {} bet leg: {}", category.code(), e);
                None
            }
        })
        .collect();
    debug!(
        "{}: {} rows fetched, {} kept ({:?})",
        category.table(),
        fetched,
        records.len(),
        status
    );
    Ok(records)
}

fn future_sql(table: &str, names: &str) -> String {
    format!(
        "SELECT m.ID_MATCH, m.tourney_name, m.tourney_date, {names},
                p.winner_pred, p.loser_pred, o.max_odds1, o.max_odds2, o.odds_lien
         FROM {table} m
         LEFT JOIN predictions p ON p.ID_MATCH = m.ID_MATCH
         LEFT JOIN match_odds o ON o.ID_MATCH = m.ID_MATCH
         WHERE m.match_settled NOT IN (1, 2)
         ORDER BY m.tourney_date ASC, m.ID_MATCH ASC"
    )
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn map_raw_bet(row: &rusqlite::Row) -> rusqlite::Result<RawBetRow> {
    Ok(RawBetRow {
        match_id: row.get(0)?,
        user_id: row.get(1)?,
        bet: row.get(2)?,
        stake: row.get(3)?,
        odds: row.get(4)?,
        tourney_name: row.get(5)?,
        tourney_level: row.get(6)?,
        round: row.get(7)?,
        surface: row.get(8)?,
        score: row.get(9)?,
        match_settled: row.get(10)?,
        tourney_date: row.get(11)?,
        winner_name: row.get(12)?,
        loser_name: row.get(13)?,
        winner_pred: row.get(14)?,
        loser_pred: row.get(15)?,
    })
}

fn map_raw_future(row: &rusqlite::Row) -> rusqlite::Result<RawFutureRow> {
    Ok(RawFutureRow {
        match_id: row.get(0)?,
        tourney_name: row.get(1)?,
        tourney_date: row.get(2)?,
        winner_name: row.get(3)?,
        loser_name: row.get(4)?,
        winner_pred: row.get(5)?,
        loser_pred: row.get(6)?,
        max_odds1: row.get(7)?,
        max_odds2: row.get(8)?,
        odds_link: row.get(9)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS Users (
    ID_USER   INTEGER PRIMARY KEY,
    bankroll  REAL    NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS men_matchs (
    ID_MATCH      TEXT    PRIMARY KEY,
    tourney_name  TEXT,
    tourney_level TEXT,
    winner_name   TEXT    NOT NULL,
    loser_name    TEXT    NOT NULL,
    round         TEXT,
    surface       TEXT,
    score         TEXT,
    match_settled INTEGER NOT NULL DEFAULT 0,
    tourney_date  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS women_matchs (
    ID_MATCH      TEXT    PRIMARY KEY,
    tourney_name  TEXT,
    tourney_level TEXT,
    winner_name   TEXT    NOT NULL,
    loser_name    TEXT    NOT NULL,
    round         TEXT,
    surface       TEXT,
    score         TEXT,
    match_settled INTEGER NOT NULL DEFAULT 0,
    tourney_date  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS double_matchs (
    ID_MATCH      TEXT    PRIMARY KEY,
    tourney_name  TEXT,
    tourney_level TEXT,
    winner_name1  TEXT    NOT NULL,
    winner_name2  TEXT    NOT NULL,
    loser_name1   TEXT    NOT NULL,
    loser_name2   TEXT    NOT NULL,
    round         TEXT,
    surface       TEXT,
    score         TEXT,
    match_settled INTEGER NOT NULL DEFAULT 0,
    tourney_date  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS predictions (
    ID_MATCH    TEXT PRIMARY KEY,
    winner_pred REAL,
    loser_pred  REAL
);

-- Best bookmaker odds per slot for upcoming matches
CREATE TABLE IF NOT EXISTS match_odds (
    ID_MATCH  TEXT PRIMARY KEY,
    max_odds1 REAL,
    max_odds2 REAL,
    odds_lien TEXT
);

CREATE TABLE IF NOT EXISTS Bet (
    ID_BET   INTEGER PRIMARY KEY AUTOINCREMENT,
    ID_MATCH TEXT    NOT NULL,
    ID_USER  INTEGER NOT NULL,
    bet      INTEGER NOT NULL,
    stake    REAL    NOT NULL,
    odds     REAL    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bet_user ON Bet(ID_USER);
CREATE INDEX IF NOT EXISTS idx_bet_match ON Bet(ID_MATCH);
"#;

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    /// Database in a throwaway file; the file and its SQLite side files are
    /// deleted on drop.
    pub struct TestDb {
        db: Database,
    }

    impl TestDb {
        /// Owned handle for code that takes a `Database` by value. The
        /// `TestDb` must outlive it.
        pub fn handle(&self) -> Database {
            self.db.clone()
        }
    }

    impl std::ops::Deref for TestDb {
        type Target = Database;

        fn deref(&self) -> &Database {
            &self.db
        }
    }

    impl Drop for TestDb {
        fn drop(&mut self) {
            let path = self.db.path.clone();
            for suffix in ["-journal", "-wal", "-shm"] {
                let mut side = path.clone().into_os_string();
                side.push(suffix);
                let _ = std::fs::remove_file(side);
            }
            let _ = std::fs::remove_file(path);
        }
    }

    /// Fresh database file under the OS temp dir.
    pub fn temp_db() -> TestDb {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "tennis-bets-test-{}-{}.db",
            std::process::id(),
            n
        ));
        let _ = std::fs::remove_file(&path);
        let cutoff = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        TestDb {
            db: Database::open(&path, cutoff).unwrap(),
        }
    }

    pub struct MatchRow<'a> {
        pub id: &'a str,
        pub a: &'a str,
        pub b: &'a str,
        pub settled: i64,
        pub score: Option<&'a str>,
        pub date: &'a str,
    }

    pub fn insert_single(db: &Database, table: &str, m: &MatchRow, preds: (f64, f64)) {
        let conn = db.connect().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {table} (ID_MATCH, tourney_name, tourney_level, winner_name,
                    loser_name, round, surface, score, match_settled, tourney_date)
                 VALUES (?1, 'Open', 'A', ?2, ?3, 'QF', 'hard', ?4, ?5, ?6)"
            ),
            params![m.id, m.a, m.b, m.score, m.settled, m.date],
        )
        .unwrap();
        insert_prediction(&conn, m.id, preds);
    }

    pub fn insert_double(db: &Database, m: &MatchRow, preds: (f64, f64)) {
        let conn = db.connect().unwrap();
        conn.execute(
            "INSERT INTO double_matchs (ID_MATCH, tourney_name, tourney_level, winner_name1,
                winner_name2, loser_name1, loser_name2, round, surface, score,
                match_settled, tourney_date)
             VALUES (?1, 'Open', 'M', ?2, 'X', ?3, 'Y', 'F', 'clay', ?4, ?5, ?6)",
            params![m.id, m.a, m.b, m.score, m.settled, m.date],
        )
        .unwrap();
        insert_prediction(&conn, m.id, preds);
    }

    fn insert_prediction(conn: &Connection, id: &str, preds: (f64, f64)) {
        conn.execute(
            "INSERT INTO predictions (ID_MATCH, winner_pred, loser_pred) VALUES (?1, ?2, ?3)",
            params![id, preds.0, preds.1],
        )
        .unwrap();
    }

    pub fn insert_bet(db: &Database, match_id: &str, user_id: i64, bet: i64, stake: f64, odds: f64) {
        let conn = db.connect().unwrap();
        conn.execute(
            "INSERT INTO Bet (ID_MATCH, ID_USER, bet, stake, odds) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![match_id, user_id, bet, stake, odds],
        )
        .unwrap();
    }

    pub fn insert_odds(db: &Database, match_id: &str, max_odds: (f64, f64), link: Option<&str>) {
        let conn = db.connect().unwrap();
        conn.execute(
            "INSERT INTO match_odds (ID_MATCH, max_odds1, max_odds2, odds_lien) VALUES (?1, ?2, ?3, ?4)",
            params![match_id, max_odds.0, max_odds.1, link],
        )
        .unwrap();
    }

    pub fn insert_user(db: &Database, user_id: i64, bankroll: f64) {
        let conn = db.connect().unwrap();
        conn.execute(
            "INSERT INTO Users (ID_USER, bankroll) VALUES (?1, ?2)",
            params![user_id, bankroll],
        )
        .unwrap();
    }
}
