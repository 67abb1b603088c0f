use chrono::NaiveDateTime;
use serde::Serialize;

use super::labels::BetLabels;
use super::round_to;
use super::score::is_voided;
use crate::db::models::{BetRecord, BetStatus, Side};

/// Share of the winnings kept after the exchange commission.
pub const COMMISSION_FACTOR: f64 = 0.97;

/// Payout odds after commission: `1 / (odds - 1) * 0.97 + 1`.
///
/// Stored odds are validated to be > 1 when records are built; anything else
/// yields the `0.0` sentinel.
pub fn realized_odds(quoted_odds: f64) -> f64 {
    if quoted_odds <= 1.0 {
        return 0.0;
    }
    1.0 / (quoted_odds - 1.0) * COMMISSION_FACTOR + 1.0
}

/// Edge of the realized odds over the model odds, per unit staked.
/// `0.0` when no prediction is available.
pub fn margin_unit(realized_odds: f64, predicted_odds: f64) -> f64 {
    if predicted_odds == 0.0 {
        return 0.0;
    }
    realized_odds / predicted_odds - 1.0
}

/// A bet leg with its derived financial fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedBet {
    pub record: BetRecord,
    pub labels: BetLabels,
    pub realized_odds: f64,
    /// Model odds of the player that was backed
    pub predicted_odds: f64,
    pub player_bet: String,
    /// `None` while the match is not settled
    pub win: Option<bool>,
    pub net_gain: f64,
    pub net_unit: f64,
    pub margin_unit: f64,
    pub expected_margin: f64,
    pub voided: bool,
}

impl EnrichedBet {
    pub fn from_record(record: BetRecord, status: BetStatus) -> Self {
        let realized = realized_odds(record.odds);
        let (predicted, player_bet) = match record.side {
            Side::PlayerA => (record.pred_a, record.name_a.clone()),
            Side::PlayerB => (record.pred_b, record.name_b.clone()),
        };

        let (win, net_gain, voided) = match status {
            BetStatus::Settled => {
                let win = record.side.wins(record.outcome);
                let gain = if win {
                    realized * record.stake - record.stake
                } else {
                    -record.stake
                };
                (Some(win), gain, is_voided(record.score.as_deref()))
            }
            BetStatus::Unsettled => (None, 0.0, false),
        };
        let net_unit = if record.stake == 0.0 {
            0.0
        } else {
            net_gain / record.stake
        };
        let unit = margin_unit(realized, predicted);

        EnrichedBet {
            labels: BetLabels::for_record(&record),
            realized_odds: realized,
            predicted_odds: predicted,
            player_bet,
            win,
            net_gain,
            net_unit,
            margin_unit: unit,
            expected_margin: unit * record.stake,
            voided,
            record,
        }
    }

    pub fn match_label(&self) -> String {
        self.record.match_label()
    }

    /// Rounded view with the display column names.
    pub fn to_row(&self) -> LegRow {
        LegRow {
            match_id: self.record.match_id.clone(),
            match_label: self.match_label(),
            date: self.record.scheduled_at,
            kickoff: self.record.scheduled_at.format("%H:%M").to_string(),
            tournament: self.record.tourney_name.clone(),
            competition: self.labels.competition.clone(),
            level: self.labels.level.clone(),
            round: self.labels.round.clone(),
            surface: self.labels.surface.clone(),
            score: self.record.score.clone(),
            player_bet: self.player_bet.clone(),
            stake: round_to(self.record.stake, 2),
            realized_odds: round_to(self.realized_odds, 3),
            predicted_odds: round_to(self.predicted_odds, 3),
            win: self.win,
            net_gain: round_to(self.net_gain, 2),
            net_unit: round_to(self.net_unit, 3),
            margin_unit: round_to(self.margin_unit, 3),
            expected_margin: round_to(self.expected_margin, 2),
            voided: self.voided,
        }
    }
}

/// Enrich every fetched leg. Settled legs get their win flag, gain and
/// voided flag; unsettled legs carry a zero gain and are never voided.
pub fn enrich(records: Vec<BetRecord>, status: BetStatus) -> Vec<EnrichedBet> {
    records
        .into_iter()
        .map(|r| EnrichedBet::from_record(r, status))
        .collect()
}

/// Per-leg table row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegRow {
    #[serde(rename = "ID_MATCH")]
    pub match_id: String,
    #[serde(rename = "Match")]
    pub match_label: String,
    #[serde(rename = "Date")]
    pub date: NaiveDateTime,
    #[serde(rename = "Horaire")]
    pub kickoff: String,
    #[serde(rename = "Tournoi")]
    pub tournament: Option<String>,
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
    pub win: Option<bool>,
    #[serde(rename = "Gains net")]
    pub net_gain: f64,
    #[serde(rename = "Gains unitaires")]
    pub net_unit: f64,
    #[serde(rename = "Marge unitaire")]
    pub margin_unit: f64,
    #[serde(rename = "Marge attendue")]
    pub expected_margin: f64,
    #[serde(rename = "Annulé")]
    pub voided: bool,
}
