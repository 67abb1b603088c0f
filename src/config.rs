use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;

use crate::error::{DashboardError, DashboardResult};
use crate::pipeline::{BetScope, Dimension};

/// Tennis betting performance dashboard
#[derive(Parser, Debug, Clone)]
#[command(name = "tennis-bets-dashboard", version, about)]
pub struct Config {
    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "tennet.db")]
    pub database_path: String,

    /// Dashboard listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080")]
    pub dashboard_addr: String,

    /// Settled bets on matches before this date (YYYY-MM-DD) are ignored
    #[arg(long, env = "SETTLED_CUTOFF", default_value = "2026-01-01")]
    pub settled_cutoff: String,

    /// How long a user's pipeline result is reused by the dashboard, in seconds
    #[arg(long, env = "CACHE_TTL_SECS", default_value = "300")]
    pub cache_ttl_secs: u64,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the pipeline once for a user and print JSON to stdout
    Report {
        /// User identifier
        #[arg(long)]
        user_id: i64,

        /// What to print
        #[arg(long, value_enum, default_value = "grouped")]
        kind: ReportKind,

        /// Use bets on matches that are not settled yet
        #[arg(long)]
        unsettled: bool,

        /// Settled and pending bets together, tagged with their status
        #[arg(long, conflicts_with = "unsettled")]
        both: bool,

        /// Dimension for `--kind breakdown`
        #[arg(long, value_enum, default_value = "competition")]
        by: DimensionArg,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Raw,
    Legs,
    Grouped,
    Candles,
    Summary,
    Breakdown,
    /// Value bets on upcoming matches (not user specific)
    Opportunities,
}

/// Bets covered by a report, from its `--unsettled` / `--both` flags.
pub fn report_scope(unsettled: bool, both: bool) -> BetScope {
    if both {
        BetScope::Both
    } else if unsettled {
        BetScope::Pending
    } else {
        BetScope::Settled
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionArg {
    Competition,
    Surface,
    Odds,
    Month,
    Day,
}

impl From<DimensionArg> for Dimension {
    fn from(arg: DimensionArg) -> Self {
        match arg {
            DimensionArg::Competition => Dimension::Competition,
            DimensionArg::Surface => Dimension::Surface,
            DimensionArg::Odds => Dimension::Odds,
            DimensionArg::Month => Dimension::Month,
            DimensionArg::Day => Dimension::Day,
        }
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.cutoff_date()?;
        if self.cache_ttl_secs == 0 {
            anyhow::bail!("cache_ttl_secs must be positive");
        }
        if self.command.is_none() {
            self.listen_addr()?;
        }
        Ok(())
    }

    pub fn cutoff_date(&self) -> DashboardResult<NaiveDate> {
        NaiveDate::parse_from_str(&self.settled_cutoff, "%Y-%m-%d").map_err(|e| {
            DashboardError::Config(format!(
                "settled_cutoff {:?} is not a YYYY-MM-DD date: {}",
                self.settled_cutoff, e
            ))
        })
    }

    pub fn listen_addr(&self) -> DashboardResult<SocketAddr> {
        self.dashboard_addr.parse().map_err(|e| {
            DashboardError::Config(format!(
                "dashboard_addr {:?} is not a socket address: {}",
                self.dashboard_addr, e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["tennis-bets-dashboard"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = parse(&[]);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.cutoff_date().unwrap(), NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert!(cfg.command.is_none());
    }

    #[test]
    fn rejects_bad_cutoff() {
        let cfg = parse(&["--settled-cutoff", "01/01/2026"]);
        assert!(cfg.validate().is_err());
        assert!(matches!(cfg.cutoff_date(), Err(DashboardError::Config(_))));
    }

    #[test]
    fn rejects_zero_ttl() {
        assert!(parse(&["--cache-ttl-secs", "0"]).validate().is_err());
    }

    #[test]
    fn rejects_bad_listen_address_only_when_serving() {
        assert!(parse(&["--dashboard-addr", "nowhere"]).validate().is_err());
        let report = parse(&["--dashboard-addr", "nowhere", "report", "--user-id", "3"]);
        assert!(report.validate().is_ok());
    }

    #[test]
    fn parses_report_subcommand() {
        let cfg = parse(&["report", "--user-id", "7", "--kind", "breakdown", "--by", "odds", "--unsettled"]);
        match cfg.command {
            Some(Command::Report { user_id, kind, unsettled, both, by }) => {
                assert_eq!(user_id, 7);
                assert_eq!(kind, ReportKind::Breakdown);
                assert!(unsettled);
                assert_eq!(report_scope(unsettled, both), BetScope::Pending);
                assert_eq!(Dimension::from(by), Dimension::Odds);
            }
            other => panic!("Expected report command, got {:?}", other),
        }
    }

    #[test]
    fn both_flag_selects_every_status_and_conflicts_with_unsettled() {
        let cfg = parse(&["report", "--user-id", "1", "--kind", "opportunities", "--both"]);
        match cfg.command {
            Some(Command::Report { kind, unsettled, both, .. }) => {
                assert_eq!(kind, ReportKind::Opportunities);
                assert_eq!(report_scope(unsettled, both), BetScope::Both);
            }
            other => panic!("Expected report command, got {:?}", other),
        }
        let argv = ["tennis-bets-dashboard", "report", "--user-id", "1", "--both", "--unsettled"];
        assert!(Config::try_parse_from(argv).is_err());
    }
}
