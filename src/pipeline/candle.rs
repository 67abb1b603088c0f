use chrono::NaiveDate;
use serde::Serialize;

use super::group::GroupedBet;
use super::round_to;

/// Daily open/high/low/close of the cumulative gain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandlePoint {
    /// ISO date, `YYYY-MM-DD`
    pub time: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl CandlePoint {
    pub fn rounded(&self) -> CandlePoint {
        CandlePoint {
            time: self.time.clone(),
            open: round_to(self.open, 2),
            high: round_to(self.high, 2),
            low: round_to(self.low, 2),
            close: round_to(self.close, 2),
        }
    }
}

/// Bucket the cumulative gain of date-sorted groups by calendar day.
///
/// Open and close are the first and last values of the day in row order.
/// Groups must be sorted by date (as [`group_bets`](super::group::group_bets)
/// returns them); each day then appears once.
pub fn candles(groups: &[GroupedBet]) -> Vec<CandlePoint> {
    let mut out: Vec<(NaiveDate, CandlePoint)> = Vec::new();
    for g in groups {
        let day = g.date.date();
        let value = g.cumulative_gain;
        match out.last_mut().filter(|(d, _)| *d == day) {
            Some((_, c)) => {
                c.high = c.high.max(value);
                c.low = c.low.min(value);
                c.close = value;
            }
            None => out.push((
                day,
                CandlePoint {
                    time: day.format("%Y-%m-%d").to_string(),
                    open: value,
                    high: value,
                    low: value,
                    close: value,
                },
            )),
        }
    }
    out.into_iter().map(|(_, c)| c).collect()
}
