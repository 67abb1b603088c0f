//! Per match/player aggregation of enriched bet legs.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;

use super::enrich::EnrichedBet;
use super::round_to;

/// Display columns of the grouped table, in order. Also describes the schema
/// of an empty result.
pub const GROUPED_COLUMNS: [&str; 15] = [
    "ID_MATCH",
    "Match",
    "Date",
    "Compétition",
    "Level",
    "Round",
    "Surface",
    "Score",
    "player_bet",
    "Mise",
    "Cote",
    "Prédiction",
    "Gains net",
    "Marge attendue",
    "Cumulative Gains",
];

/// All legs placed on one player of one match, at full precision.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedBet {
    pub match_id: String,
    pub match_label: String,
    pub player_bet: String,
    pub date: NaiveDateTime,
    pub competition: String,
    pub level: Option<String>,
    pub round: Option<String>,
    pub surface: Option<String>,
    pub score: Option<String>,
    pub stake: f64,
    /// Stake-weighted mean of the legs' realized odds
    pub realized_odds: f64,
    /// Plain mean of the legs' predicted odds
    pub predicted_odds: f64,
    pub net_gain: f64,
    pub expected_margin: f64,
    /// Running total of `net_gain` in chronological order
    pub cumulative_gain: f64,
}

impl GroupedBet {
    /// Rounded view with the display column names.
    pub fn to_row(&self) -> GroupedBetRow {
        GroupedBetRow {
            match_id: self.match_id.clone(),
            match_label: self.match_label.clone(),
            date: self.date,
            competition: self.competition.clone(),
            level: self.level.clone(),
            round: self.round.clone(),
            surface: self.surface.clone(),
            score: self.score.clone(),
            player_bet: self.player_bet.clone(),
            stake: round_to(self.stake, 2),
            realized_odds: round_to(self.realized_odds, 3),
            predicted_odds: round_to(self.predicted_odds, 3),
            net_gain: round_to(self.net_gain, 2),
            expected_margin: round_to(self.expected_margin, 2),
            cumulative_gain: round_to(self.cumulative_gain, 2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedBetRow {
    #[serde(rename = "ID_MATCH")]
    pub match_id: String,
    #[serde(rename = "Match")]
    pub match_label: String,
    #[serde(rename = "Date")]
    pub date: NaiveDateTime,
    #[serde(rename = "Compétition")]
    pub competition: String,
    #[serde(rename = "Level")]
    pub level: Option<String>,
    #[serde(rename = "Round")]
    pub round: Option<String>,
    #[serde(rename = "Surface")]
    pub surface: Option<String>,
    #[serde(rename = "Score")]
    pub score: Option<String>,
    pub player_bet: String,
    #[serde(rename = "Mise")]
    pub stake: f64,
    #[serde(rename = "Cote")]
    pub realized_odds: f64,
    #[serde(rename = "Prédiction")]
    pub predicted_odds: f64,
    #[serde(rename = "Gains net")]
    pub net_gain: f64,
    #[serde(rename = "Marge attendue")]
    pub expected_margin: f64,
    #[serde(rename = "Cumulative Gains")]
    pub cumulative_gain: f64,
}

#[derive(Default)]
struct Accumulator {
    stake: f64,
    /// (realized odds, stake) per leg
    odds: Vec<(f64, f64)>,
    predicted_sum: f64,
    net_gain: f64,
    expected_margin: f64,
}

/// Stake-weighted mean; `0.0` when the weights sum to zero.
pub fn weighted_mean(pairs: &[(f64, f64)]) -> f64 {
    let weight: f64 = pairs.iter().map(|(_, w)| w).sum();
    if weight == 0.0 {
        return 0.0;
    }
    pairs.iter().map(|(v, w)| v * w).sum::<f64>() / weight
}

/// Group non-voided legs by (match, match label, backed player), sort the
/// groups chronologically and fill in the running gain.
///
/// Descriptive fields come from the first leg seen for each group. Ties on
/// the date are broken by match id then player so the output does not depend
/// on the order of the input legs.
pub fn group_bets(legs: &[EnrichedBet]) -> Vec<GroupedBet> {
    let mut index: HashMap<(String, String, String), usize> = HashMap::new();
    let mut groups: Vec<(GroupedBet, Accumulator)> = Vec::new();

    for leg in legs.iter().filter(|l| !l.voided) {
        let key = (
            leg.record.match_id.clone(),
            leg.match_label(),
            leg.player_bet.clone(),
        );
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push((first_of_group(leg), Accumulator::default()));
            groups.len() - 1
        });
        let acc = &mut groups[slot].1;
        acc.stake += leg.record.stake;
        acc.odds.push((leg.realized_odds, leg.record.stake));
        acc.predicted_sum += leg.predicted_odds;
        acc.net_gain += leg.net_gain;
        acc.expected_margin += leg.expected_margin;
    }

    let mut grouped: Vec<GroupedBet> = groups
        .into_iter()
        .map(|(mut g, acc)| {
            g.stake = acc.stake;
            g.realized_odds = weighted_mean(&acc.odds);
            g.predicted_odds = if acc.odds.is_empty() {
                0.0
            } else {
                acc.predicted_sum / acc.odds.len() as f64
            };
            g.net_gain = acc.net_gain;
            g.expected_margin = acc.expected_margin;
            g
        })
        .collect();

    grouped.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.match_id.cmp(&b.match_id))
            .then_with(|| a.player_bet.cmp(&b.player_bet))
    });

    // Only valid after the chronological sort above.
    let mut running = 0.0;
    for g in &mut grouped {
        running += g.net_gain;
        g.cumulative_gain = running;
    }
    grouped
}

fn first_of_group(leg: &EnrichedBet) -> GroupedBet {
    GroupedBet {
        match_id: leg.record.match_id.clone(),
        match_label: leg.match_label(),
        player_bet: leg.player_bet.clone(),
        date: leg.record.scheduled_at,
        competition: leg.labels.competition.clone(),
        level: leg.labels.level.clone(),
        round: leg.labels.round.clone(),
        surface: leg.labels.surface.clone(),
        score: leg.record.score.clone(),
        stake: 0.0,
        realized_odds: 0.0,
        predicted_odds: 0.0,
        net_gain: 0.0,
        expected_margin: 0.0,
        cumulative_gain: 0.0,
    }
}
