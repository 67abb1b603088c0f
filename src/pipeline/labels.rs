//! Display labels for the raw categorical codes stored with each match.
//!
//! Every mapping is total: unknown codes come back unchanged.

use serde::{Deserialize, Serialize};

use crate::db::models::{BetRecord, Category};

pub fn surface_label(raw: &str) -> String {
    let label = match raw.trim().to_lowercase().as_str() {
        "hard" => "Dur",
        "grass" => "Gazon",
        "clay" => "Terre battue",
        _ => return raw.to_string(),
    };
    label.to_string()
}

pub fn round_label(raw: &str) -> String {
    let label = match raw.trim().to_uppercase().as_str() {
        "F" => "Finale",
        "SF" => "Demi-finale",
        "QF" => "Quart de finale",
        "R16" => "8èmes de finale",
        "R32" => "16èmes de finale",
        "R64" => "32èmes de finale",
        "R128" => "64èmes de finale",
        "RR" => "Round Robin",
        _ => return raw.to_string(),
    };
    label.to_string()
}

pub fn level_label(raw: &str) -> String {
    let label = match raw.trim().to_uppercase().as_str() {
        "C" => "Challenger",
        "A" => "ATP 250/500",
        "G" => "Grand Chelem",
        "M" => "Masters 1000",
        "I" => "WTA 250",
        "P" => "WTA 500",
        "PM" => "WTA 1000",
        _ => return raw.to_string(),
    };
    label.to_string()
}

/// Competition shown title-cased: `Atp`, `Wta`, `Doubles`.
pub fn competition_label(category: Category) -> String {
    let code = category.code();
    let mut chars = code.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Labels of one bet leg, ready for display and grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetLabels {
    pub competition: String,
    pub level: Option<String>,
    pub round: Option<String>,
    pub surface: Option<String>,
}

impl BetLabels {
    pub fn for_record(rec: &BetRecord) -> Self {
        BetLabels {
            competition: competition_label(rec.category),
            level: rec.tourney_level.as_deref().map(level_label),
            round: rec.round.as_deref().map(round_label),
            surface: rec.surface.as_deref().map(surface_label),
        }
    }
}
