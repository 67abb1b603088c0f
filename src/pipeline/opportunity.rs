//! Value bets among upcoming matches: compares the best available bookmaker
//! odds with the model odds for each side.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::labels::competition_label;
use super::round_to;
use crate::db::models::FutureMatch;

/// Minimum expected value, in percent, for a side to be worth backing.
pub const MIN_EDGE_PCT: f64 = 2.0;
/// Model odds outside this range are never flagged.
pub const MIN_BETABLE_PRED: f64 = 1.1;
pub const MAX_BETABLE_PRED: f64 = 4.0;

/// One side of an upcoming match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    #[serde(rename = "ID_MATCH")]
    pub match_id: String,
    #[serde(rename = "Match")]
    pub match_label: String,
    #[serde(rename = "Joueur")]
    pub player: String,
    #[serde(rename = "Prédiction")]
    pub predicted_odds: f64,
    #[serde(rename = "Max_cote")]
    pub max_odds: f64,
    #[serde(rename = "EV_pct")]
    pub ev_pct: f64,
    #[serde(rename = "Parier ?")]
    pub betable: bool,
    #[serde(rename = "Lien")]
    pub link: Option<String>,
    #[serde(rename = "Tournoi")]
    pub tournament: Option<String>,
    #[serde(rename = "Compétition")]
    pub competition: String,
    #[serde(rename = "Date")]
    pub date: NaiveDateTime,
}

/// `(max_odds / pred - 1) * 100`, or `0.0` when either side is missing.
pub fn expected_value_pct(max_odds: f64, predicted_odds: f64) -> f64 {
    if max_odds == 0.0 || predicted_odds == 0.0 {
        return 0.0;
    }
    (max_odds / predicted_odds - 1.0) * 100.0
}

pub fn is_betable(ev_pct: f64, predicted_odds: f64) -> bool {
    ev_pct > MIN_EDGE_PCT && (MIN_BETABLE_PRED..=MAX_BETABLE_PRED).contains(&predicted_odds)
}

fn side(m: &FutureMatch, player: &str, pred: f64, max_odds: f64) -> Opportunity {
    let ev = expected_value_pct(max_odds, pred);
    Opportunity {
        match_id: m.match_id.clone(),
        match_label: m.match_label(),
        player: player.to_string(),
        predicted_odds: round_to(pred, 3),
        max_odds: round_to(max_odds, 3),
        ev_pct: round_to(ev, 1),
        betable: is_betable(ev, pred),
        link: m.odds_link.clone(),
        tournament: m.tourney_name.clone(),
        competition: competition_label(m.category),
        date: m.scheduled_at,
    }
}

/// Two rows per match (slot A then slot B), sorted by date then match label.
///
/// The flag is decided on full precision values; only the displayed numbers
/// are rounded.
pub fn opportunities(matches: &[FutureMatch]) -> Vec<Opportunity> {
    let mut rows: Vec<Opportunity> = matches
        .iter()
        .flat_map(|m| {
            [
                side(m, &m.name_a, m.pred_a, m.max_odds_a),
                side(m, &m.name_b, m.pred_b, m.max_odds_b),
            ]
        })
        .collect();
    rows.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.match_label.cmp(&b.match_label))
    });
    rows
}
