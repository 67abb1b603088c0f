//! Bet preparation pipeline: fetch → enrich (with voiding) → labels →
//! grouping → candles, plus value bets on upcoming matches.
//!
//! Every entry point is synchronous and works on its own freshly fetched
//! rows; nothing is cached here.

pub mod candle;
pub mod enrich;
pub mod group;
pub mod labels;
pub mod opportunity;
pub mod score;
pub mod summary;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::models::{BetRecord, BetStatus};
use crate::db::Database;
use crate::error::DashboardResult;

pub use candle::CandlePoint;
pub use enrich::{EnrichedBet, LegRow};
pub use group::{GroupedBet, GroupedBetRow, GROUPED_COLUMNS};
pub use opportunity::Opportunity;
pub use summary::Dimension;

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Rows plus their column names, so an empty result still carries its schema.
#[derive(Debug, Clone, Serialize)]
pub struct Table<T> {
    pub columns: Vec<&'static str>,
    pub rows: Vec<T>,
}

impl Table<GroupedBetRow> {
    pub fn grouped(groups: &[GroupedBet]) -> Self {
        Table {
            columns: GROUPED_COLUMNS.to_vec(),
            rows: groups.iter().map(GroupedBet::to_row).collect(),
        }
    }
}

impl Table<Tagged<GroupedBetRow>> {
    /// Grouped rows of several settlement states, one part after the other,
    /// each row tagged with its `Statut`.
    pub fn grouped_tagged(parts: &[(BetStatus, &[GroupedBet])]) -> Self {
        Table {
            columns: GROUPED_COLUMNS.iter().copied().chain([STATUS_COLUMN]).collect(),
            rows: parts
                .iter()
                .flat_map(|(status, groups)| {
                    groups.iter().map(move |g| Tagged::new(g.to_row(), *status))
                })
                .collect(),
        }
    }
}

pub const STATUS_COLUMN: &str = "Statut";

/// A display row with the settlement state it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tagged<T> {
    #[serde(flatten)]
    pub row: T,
    #[serde(rename = "Statut")]
    pub status: &'static str,
}

impl<T> Tagged<T> {
    pub fn new(row: T, status: BetStatus) -> Self {
        Tagged {
            row,
            status: status.label(),
        }
    }
}

/// Which bets a view covers: `true` (settled), `false` (pending) or `both`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum BetScope {
    #[default]
    #[serde(rename = "true")]
    Settled,
    #[serde(rename = "false")]
    Pending,
    #[serde(rename = "both")]
    Both,
}

impl BetScope {
    pub fn statuses(self) -> &'static [BetStatus] {
        match self {
            BetScope::Settled => &[BetStatus::Settled],
            BetScope::Pending => &[BetStatus::Unsettled],
            BetScope::Both => &[BetStatus::Settled, BetStatus::Unsettled],
        }
    }
}

/// Legs and groups computed from one fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub legs: Vec<EnrichedBet>,
    pub groups: Vec<GroupedBet>,
}

/// Raw legs of `user_id`, settled (`finished`) or still pending.
pub fn fetch_bets(db: &Database, user_id: i64, finished: bool) -> DashboardResult<Vec<BetRecord>> {
    db.fetch_bets(user_id, BetStatus::from_finished(finished))
}

/// Every enriched leg, voided ones included.
pub fn prepare_legs(db: &Database, user_id: i64, finished: bool) -> DashboardResult<Vec<EnrichedBet>> {
    let status = BetStatus::from_finished(finished);
    let records = db.fetch_bets(user_id, status)?;
    Ok(enrich::enrich(records, status))
}

/// Grouped bets for `user_id`, date-sorted with cumulative gains.
pub fn prepare_bets(db: &Database, user_id: i64, finished: bool) -> DashboardResult<Vec<GroupedBet>> {
    let status = BetStatus::from_finished(finished);
    let records = db.fetch_bets(user_id, status)?;
    Ok(prepare_records(records, status).groups)
}

/// Legs and groups for `user_id` from a single fetch.
pub fn prepare(db: &Database, user_id: i64, finished: bool) -> DashboardResult<Prepared> {
    let status = BetStatus::from_finished(finished);
    let records = db.fetch_bets(user_id, status)?;
    Ok(prepare_records(records, status))
}

/// Daily candles of the settled cumulative gain.
pub fn candle_series(db: &Database, user_id: i64) -> DashboardResult<Vec<CandlePoint>> {
    let groups = prepare_bets(db, user_id, true)?;
    Ok(candle_points(&groups))
}

/// Settled then pending grouped bets of `user_id`, tagged with their status.
/// Each part keeps its own cumulative gain.
pub fn prepare_tagged(db: &Database, user_id: i64) -> DashboardResult<Table<Tagged<GroupedBetRow>>> {
    let settled = prepare_bets(db, user_id, true)?;
    let pending = prepare_bets(db, user_id, false)?;
    Ok(Table::grouped_tagged(&[
        (BetStatus::Settled, settled.as_slice()),
        (BetStatus::Unsettled, pending.as_slice()),
    ]))
}

/// Value bets among every upcoming match.
pub fn upcoming_opportunities(db: &Database) -> DashboardResult<Vec<Opportunity>> {
    let matches = db.fetch_future_matches()?;
    Ok(opportunity::opportunities(&matches))
}

/// Per-leg rows of several settlement states, tagged with their status.
pub fn tagged_legs(parts: &[(BetStatus, &[EnrichedBet])]) -> Vec<Tagged<LegRow>> {
    parts
        .iter()
        .flat_map(|(status, legs)| legs.iter().map(move |l| Tagged::new(l.to_row(), *status)))
        .collect()
}

/// Pure part of [`prepare`].
pub fn prepare_records(records: Vec<BetRecord>, status: BetStatus) -> Prepared {
    let legs = enrich::enrich(records, status);
    let voided = legs.iter().filter(|l| l.voided).count();
    let groups = group::group_bets(&legs);
    debug!(
        "Pipeline: {} legs ({} voided) -> {} groups",
        legs.len(),
        voided,
        groups.len()
    );
    Prepared { legs, groups }
}

/// Rounded daily candles for already grouped bets.
pub fn candle_points(groups: &[GroupedBet]) -> Vec<CandlePoint> {
    candle::candles(groups)
        .iter()
        .map(CandlePoint::rounded)
        .collect()
}
