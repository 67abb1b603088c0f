use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, DashboardResult};

/// Competition category; each one lives in its own match table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Singles, men (`men_matchs`)
    Atp,
    /// Singles, women (`women_matchs`)
    Wta,
    /// Doubles (`double_matchs`)
    Doubles,
}

impl Category {
    /// Raw competition code as stored alongside the fetched rows.
    pub fn code(self) -> &'static str {
        match self {
            Category::Atp => "atp",
            Category::Wta => "wta",
            Category::Doubles => "doubles",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Category::Atp => "men_matchs",
            Category::Wta => "women_matchs",
            Category::Doubles => "double_matchs",
        }
    }
}

/// Settlement code of a match: 0 = pending, 1 = player A won, 2 = player B won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Pending,
    PlayerAWon,
    PlayerBWon,
}

impl Outcome {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Outcome::Pending),
            1 => Some(Outcome::PlayerAWon),
            2 => Some(Outcome::PlayerBWon),
            _ => None,
        }
    }
}

/// Which positional slot the bettor backed. `bet = 1` in storage is player A
/// (the `winner_name` column), `bet = 0` is player B (`loser_name`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    PlayerA,
    PlayerB,
}

impl Side {
    pub fn from_flag(flag: i64) -> Self {
        if flag == 1 {
            Side::PlayerA
        } else {
            Side::PlayerB
        }
    }

    /// True when the settled outcome matches the backed slot.
    pub fn wins(self, outcome: Outcome) -> bool {
        matches!(
            (outcome, self),
            (Outcome::PlayerAWon, Side::PlayerA) | (Outcome::PlayerBWon, Side::PlayerB)
        )
    }
}

/// Which matches a fetch is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetStatus {
    Settled,
    Unsettled,
}

impl BetStatus {
    pub fn from_finished(finished: bool) -> Self {
        if finished {
            BetStatus::Settled
        } else {
            BetStatus::Unsettled
        }
    }

    /// Display value of the `Statut` column.
    pub fn label(self) -> &'static str {
        match self {
            BetStatus::Settled => "Terminé",
            BetStatus::Unsettled => "En cours",
        }
    }
}

/// Loosely typed row exactly as the join query returns it.
#[derive(Debug, Clone)]
pub struct RawBetRow {
    pub match_id: String,
    pub user_id: i64,
    pub bet: i64,
    pub stake: f64,
    pub odds: f64,
    pub tourney_name: Option<String>,
    pub tourney_level: Option<String>,
    pub round: Option<String>,
    pub surface: Option<String>,
    pub score: Option<String>,
    pub match_settled: i64,
    pub tourney_date: String,
    pub winner_name: String,
    pub loser_name: String,
    pub winner_pred: Option<f64>,
    pub loser_pred: Option<f64>,
}

/// One bet leg, validated right after the fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetRecord {
    pub match_id: String,
    pub user_id: i64,
    pub side: Side,
    /// Amount wagered, always > 0
    pub stake: f64,
    /// Bookmaker odds as stored, always > 1
    pub odds: f64,
    pub outcome: Outcome,
    pub score: Option<String>,
    pub tourney_name: Option<String>,
    pub tourney_level: Option<String>,
    pub round: Option<String>,
    pub surface: Option<String>,
    pub scheduled_at: NaiveDateTime,
    /// Model odds for the player in slot A
    pub pred_a: f64,
    /// Model odds for the player in slot B
    pub pred_b: f64,
    pub category: Category,
    /// Display name in slot A (`winner_name`)
    pub name_a: String,
    /// Display name in slot B (`loser_name`)
    pub name_b: String,
}

impl BetRecord {
    pub fn from_raw(raw: RawBetRow, category: Category) -> DashboardResult<Self> {
        let invalid = |reason: String| DashboardError::InvalidRecord {
            match_id: raw.match_id.clone(),
            reason,
        };

        if !(raw.stake > 0.0) {
            return Err(invalid(format!("stake must be positive, got {}", raw.stake)));
        }
        if !(raw.odds > 1.0) {
            return Err(invalid(format!("odds must exceed 1, got {}", raw.odds)));
        }
        let outcome = Outcome::from_code(raw.match_settled)
            .ok_or_else(|| invalid(format!("unknown outcome code {}", raw.match_settled)))?;
        let scheduled_at = parse_schedule(&raw.tourney_date)
            .ok_or_else(|| invalid(format!("unparseable date {:?}", raw.tourney_date)))?;

        Ok(BetRecord {
            side: Side::from_flag(raw.bet),
            outcome,
            scheduled_at,
            pred_a: raw.winner_pred.unwrap_or(0.0),
            pred_b: raw.loser_pred.unwrap_or(0.0),
            category,
            match_id: raw.match_id,
            user_id: raw.user_id,
            stake: raw.stake,
            odds: raw.odds,
            score: raw.score,
            tourney_name: raw.tourney_name,
            tourney_level: raw.tourney_level,
            round: raw.round,
            surface: raw.surface,
            name_a: raw.winner_name,
            name_b: raw.loser_name,
        })
    }

    /// "A - B" label used as part of the grouping key.
    pub fn match_label(&self) -> String {
        format!("{} - {}", self.name_a, self.name_b)
    }
}

/// Loosely typed row of an upcoming match with its best available odds.
#[derive(Debug, Clone)]
pub struct RawFutureRow {
    pub match_id: String,
    pub tourney_name: Option<String>,
    pub tourney_date: String,
    pub winner_name: String,
    pub loser_name: String,
    pub winner_pred: Option<f64>,
    pub loser_pred: Option<f64>,
    pub max_odds1: Option<f64>,
    pub max_odds2: Option<f64>,
    pub odds_link: Option<String>,
}

/// A match not settled yet, with model odds and the best bookmaker odds per
/// slot. Missing numbers read as `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FutureMatch {
    pub match_id: String,
    pub category: Category,
    pub tourney_name: Option<String>,
    pub scheduled_at: NaiveDateTime,
    pub name_a: String,
    pub name_b: String,
    pub pred_a: f64,
    pub pred_b: f64,
    pub max_odds_a: f64,
    pub max_odds_b: f64,
    pub odds_link: Option<String>,
}

impl FutureMatch {
    pub fn from_raw(raw: RawFutureRow, category: Category) -> DashboardResult<Self> {
        let scheduled_at =
            parse_schedule(&raw.tourney_date).ok_or_else(|| DashboardError::InvalidRecord {
                match_id: raw.match_id.clone(),
                reason: format!("unparseable date {:?}", raw.tourney_date),
            })?;
        Ok(FutureMatch {
            match_id: raw.match_id,
            category,
            tourney_name: raw.tourney_name,
            scheduled_at,
            name_a: raw.winner_name,
            name_b: raw.loser_name,
            pred_a: raw.winner_pred.unwrap_or(0.0),
            pred_b: raw.loser_pred.unwrap_or(0.0),
            max_odds_a: raw.max_odds1.unwrap_or(0.0),
            max_odds_b: raw.max_odds2.unwrap_or(0.0),
            odds_link: raw.odds_link,
        })
    }

    pub fn match_label(&self) -> String {
        format!("{} - {}", self.name_a, self.name_b)
    }
}

/// Accepts the timestamp shapes found in the match tables: naive timestamps
/// with optional fractional seconds, offset or `Z` suffixed ones (converted to
/// UTC), and bare dates meaning midnight.
pub fn parse_schedule(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    const OFFSET_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_utc());
        }
    }
    if let Some(naive) = s.strip_suffix('Z').or_else(|| s.strip_suffix(" UTC")) {
        return parse_schedule(naive);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawBetRow {
        RawBetRow {
            match_id: "m1".into(),
            user_id: 7,
            bet: 1,
            stake: 10.0,
            odds: 1.8,
            tourney_name: Some("Roland Garros".into()),
            tourney_level: Some("G".into()),
            round: Some("R32".into()),
            surface: Some("Clay".into()),
            score: Some("6-4 6-3".into()),
            match_settled: 1,
            tourney_date: "2026-05-30 14:00:00".into(),
            winner_name: "Alcaraz".into(),
            loser_name: "Sinner".into(),
            winner_pred: Some(1.7),
            loser_pred: None,
        }
    }

    #[test]
    fn builds_record_from_valid_row() {
        let rec = BetRecord::from_raw(raw(), Category::Atp).unwrap();
        assert_eq!(rec.side, Side::PlayerA);
        assert_eq!(rec.outcome, Outcome::PlayerAWon);
        assert_eq!(rec.pred_b, 0.0);
        assert_eq!(rec.match_label(), "Alcaraz - Sinner");
        assert_eq!(rec.scheduled_at.format("%H:%M").to_string(), "14:00");
    }

    #[test]
    fn rejects_non_positive_stake() {
        let mut r = raw();
        r.stake = 0.0;
        assert!(matches!(
            BetRecord::from_raw(r, Category::Atp),
            Err(DashboardError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn rejects_odds_of_one_or_less() {
        let mut r = raw();
        r.odds = 1.0;
        assert!(BetRecord::from_raw(r, Category::Wta).is_err());
    }

    #[test]
    fn rejects_unknown_outcome_code() {
        let mut r = raw();
        r.match_settled = 3;
        assert!(BetRecord::from_raw(r, Category::Doubles).is_err());
    }

    #[test]
    fn side_wins_only_on_matching_outcome() {
        assert!(Side::PlayerA.wins(Outcome::PlayerAWon));
        assert!(Side::PlayerB.wins(Outcome::PlayerBWon));
        assert!(!Side::PlayerA.wins(Outcome::PlayerBWon));
        assert!(!Side::PlayerB.wins(Outcome::Pending));
    }

    #[test]
    fn parses_bare_dates_as_midnight() {
        let dt = parse_schedule("2026-02-01").unwrap();
        assert_eq!(dt.to_string(), "2026-02-01 00:00:00");
        assert!(parse_schedule("not a date").is_none());
    }

    #[test]
    fn parses_fractional_seconds() {
        let dt = parse_schedule("2026-02-01 10:00:00.250").unwrap();
        assert_eq!(dt.format("%H:%M:%S%.3f").to_string(), "10:00:00.250");
        assert!(parse_schedule("2026-02-01T10:00:00.123456").is_some());
    }

    #[test]
    fn offsets_are_converted_to_utc() {
        let expected = parse_schedule("2026-02-01 10:00:00").unwrap();
        assert_eq!(parse_schedule("2026-02-01 10:00:00+00:00"), Some(expected));
        assert_eq!(parse_schedule("2026-02-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_schedule("2026-02-01T12:00:00+02:00"), Some(expected));
        assert_eq!(parse_schedule("2026-02-01 10:00:00.000+0000"), Some(expected));
        assert_eq!(parse_schedule("2026-02-01 10:00:00 UTC"), Some(expected));
    }
}
