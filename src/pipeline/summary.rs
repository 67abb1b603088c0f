//! Headline metrics and per-dimension breakdowns of the grouped bets.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::group::GroupedBet;
use super::round_to;

/// Totals shown above the bet tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_bets: usize,
    /// Groups with a strictly positive net gain
    pub wins: usize,
    pub win_rate: f64,
    pub total_stake: f64,
    pub total_gain: f64,
    /// Net gain as a percentage of stake
    pub roi: f64,
    pub total_expected_margin: f64,
    /// Expected margin as a percentage of stake
    pub expected_margin_pct: f64,
    pub bankroll: f64,
}

fn pct(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

pub fn summarize(groups: &[GroupedBet], bankroll: f64) -> Summary {
    let total_bets = groups.len();
    let wins = groups.iter().filter(|g| g.net_gain > 0.0).count();
    let total_stake: f64 = groups.iter().map(|g| g.stake).sum();
    let total_gain: f64 = groups.iter().map(|g| g.net_gain).sum();
    let total_expected_margin: f64 = groups.iter().map(|g| g.expected_margin).sum();

    Summary {
        total_bets,
        wins,
        win_rate: pct(wins as f64, total_bets as f64),
        total_stake: round_to(total_stake, 2),
        total_gain: round_to(total_gain, 2),
        roi: round_to(pct(total_gain, total_stake), 2),
        total_expected_margin: round_to(total_expected_margin, 2),
        expected_margin_pct: round_to(pct(total_expected_margin, total_stake), 2),
        bankroll,
    }
}

// ── Breakdown ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Competition,
    Surface,
    Odds,
    Month,
    Day,
}

/// Odds bands, lowest first. Upper bounds are inclusive.
const ODDS_BANDS: [(f64, &str); 6] = [
    (1.5, "<1.5"),
    (2.0, "1.5-2.0"),
    (2.5, "2.0-2.5"),
    (3.0, "2.5-3.0"),
    (5.0, "3.0-5.0"),
    (100.0, ">=5.0"),
];

const MONTHS_FR: [&str; 12] = [
    "Janvier",
    "Février",
    "Mars",
    "Avril",
    "Mai",
    "Juin",
    "Juillet",
    "Août",
    "Septembre",
    "Octobre",
    "Novembre",
    "Décembre",
];

pub fn odds_band(odds: f64) -> &'static str {
    if !(0.0..=100.0).contains(&odds) {
        return "Unknown";
    }
    ODDS_BANDS
        .iter()
        .find(|(upper, _)| odds <= *upper)
        .map(|(_, label)| *label)
        .unwrap_or("Unknown")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub key: String,
    #[serde(rename = "Nb Paris")]
    pub count: usize,
    pub wins: usize,
    #[serde(rename = "Winrate")]
    pub win_rate: f64,
    #[serde(rename = "Cote moyenne")]
    pub avg_odds: f64,
    #[serde(rename = "Prédiction moyenne")]
    pub avg_prediction: f64,
    #[serde(rename = "ROI attendu")]
    pub expected_roi: f64,
    #[serde(rename = "Mises")]
    pub total_stake: f64,
    #[serde(rename = "Resultat.attendu")]
    pub expected_result: f64,
    #[serde(rename = "Gains")]
    pub total_gain: f64,
    #[serde(rename = "ROI")]
    pub roi: f64,
}

#[derive(Default)]
struct Bucket {
    count: usize,
    wins: usize,
    stake: f64,
    gain: f64,
    margin: f64,
    odds_sum: f64,
    pred_sum: f64,
    /// `YYYYMM` of the earliest group, used to order months
    month_key: Option<i32>,
}

/// Aggregate grouped bets along one dimension.
pub fn breakdown(groups: &[GroupedBet], dimension: Dimension) -> Vec<BreakdownRow> {
    let multi_year = groups.iter().map(|g| g.date.year()).collect::<HashSet<_>>().len() > 1;

    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Bucket> = HashMap::new();
    for g in groups {
        let key = bucket_key(g, dimension, multi_year);
        let bucket = buckets.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Bucket::default()
        });
        bucket.count += 1;
        if g.net_gain > 0.0 {
            bucket.wins += 1;
        }
        bucket.stake += g.stake;
        bucket.gain += g.net_gain;
        bucket.margin += g.expected_margin;
        bucket.odds_sum += g.realized_odds;
        bucket.pred_sum += g.predicted_odds;
        let month = g.date.year() * 100 + g.date.month() as i32;
        bucket.month_key = Some(bucket.month_key.map_or(month, |m| m.min(month)));
    }

    let mut rows: Vec<(Option<i32>, BreakdownRow)> = order
        .into_iter()
        .filter_map(|key| {
            let b = buckets.remove(&key)?;
            let n = b.count as f64;
            let avg_odds = b.odds_sum / n;
            let avg_prediction = b.pred_sum / n;
            let expected_roi = if avg_prediction == 0.0 {
                0.0
            } else {
                (avg_odds / avg_prediction - 1.0) * 100.0
            };
            let row = BreakdownRow {
                key,
                count: b.count,
                wins: b.wins,
                win_rate: round_to(pct(b.wins as f64, n), 2),
                avg_odds: round_to(avg_odds, 3),
                avg_prediction: round_to(avg_prediction, 3),
                expected_roi: round_to(expected_roi, 2),
                total_stake: round_to(b.stake, 2),
                expected_result: round_to(b.margin, 2),
                total_gain: round_to(b.gain, 2),
                roi: round_to(pct(b.gain, b.stake), 2),
            };
            Some((b.month_key, row))
        })
        .collect();

    match dimension {
        Dimension::Month => rows.sort_by(|a, b| b.0.cmp(&a.0)),
        Dimension::Day => rows.sort_by(|a, b| b.1.key.cmp(&a.1.key)),
        Dimension::Odds => rows.sort_by_key(|(_, r)| band_rank(&r.key)),
        Dimension::Competition | Dimension::Surface => rows.sort_by(|a, b| {
            b.1.total_gain
                .partial_cmp(&a.1.total_gain)
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
    }
    rows.into_iter().map(|(_, r)| r).collect()
}

fn bucket_key(g: &GroupedBet, dimension: Dimension, multi_year: bool) -> String {
    match dimension {
        Dimension::Competition => g.competition.clone(),
        Dimension::Surface => g.surface.clone().unwrap_or_else(|| "Unknown".into()),
        Dimension::Odds => odds_band(g.realized_odds).to_string(),
        Dimension::Month => {
            let name = MONTHS_FR[g.date.month0() as usize];
            if multi_year {
                format!("{} {}", name, g.date.year())
            } else {
                name.to_string()
            }
        }
        Dimension::Day => g.date.format("%Y-%m-%d").to_string(),
    }
}

/// Highest band first, unknown last.
fn band_rank(label: &str) -> usize {
    ODDS_BANDS
        .iter()
        .rev()
        .position(|(_, l)| *l == label)
        .unwrap_or(ODDS_BANDS.len())
}
