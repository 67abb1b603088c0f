use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing::info;

mod cache;
mod config;
mod dashboard;
mod db;
mod error;
mod pipeline;

use config::{report_scope, Command, Config, ReportKind};
use dashboard::AppState;
use db::Database;
use db::models::BetStatus;
use pipeline::{BetScope, Tagged};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    config.validate()?;

    let db = Database::open(&config.database_path, config.cutoff_date()?)?;
    info!(
        "Database opened: {} (settled cutoff {})",
        config.database_path,
        db.settled_cutoff()
    );

    if let Some(Command::Report {
        user_id,
        kind,
        unsettled,
        both,
        by,
    }) = &config.command
    {
        let scope = report_scope(*unsettled, *both);
        let out = run_report(&db, *user_id, *kind, scope, (*by).into())?;
        println!("{}", out);
        return Ok(());
    }

    let state = AppState::new(db, Duration::from_secs(config.cache_ttl_secs));
    let app = dashboard::router(state);
    let addr = config.listen_addr()?;
    info!("Dashboard API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run dashboard server (blocks until shutdown)
    axum::serve(listener, app).await?;

    Ok(())
}

/// One pipeline run rendered as pretty JSON.
fn run_report(
    db: &Database,
    user_id: i64,
    kind: ReportKind,
    scope: BetScope,
    by: pipeline::Dimension,
) -> Result<String> {
    let json = match kind {
        ReportKind::Raw => {
            let mut rows = Vec::new();
            for status in scope.statuses() {
                let records = db.fetch_bets(user_id, *status)?;
                rows.extend(records.into_iter().map(|r| Tagged::new(r, *status)));
            }
            serde_json::to_string_pretty(&rows)?
        }
        ReportKind::Legs => {
            let mut parts = Vec::new();
            for status in scope.statuses() {
                let finished = *status == BetStatus::Settled;
                parts.push((*status, pipeline::prepare_legs(db, user_id, finished)?));
            }
            let parts: Vec<_> = parts.iter().map(|(s, legs)| (*s, legs.as_slice())).collect();
            serde_json::to_string_pretty(&pipeline::tagged_legs(&parts))?
        }
        ReportKind::Grouped => match scope {
            BetScope::Both => serde_json::to_string_pretty(&pipeline::prepare_tagged(db, user_id)?)?,
            _ => {
                let groups = pipeline::prepare_bets(db, user_id, scope == BetScope::Settled)?;
                serde_json::to_string_pretty(&pipeline::Table::grouped(&groups))?
            }
        },
        ReportKind::Candles => serde_json::to_string_pretty(&pipeline::candle_series(db, user_id)?)?,
        ReportKind::Summary => {
            let groups = scoped_groups(db, user_id, scope)?;
            let bankroll = db.load_bankroll(user_id)?;
            serde_json::to_string_pretty(&pipeline::summary::summarize(&groups, bankroll))?
        }
        ReportKind::Breakdown => {
            let groups = scoped_groups(db, user_id, scope)?;
            serde_json::to_string_pretty(&pipeline::summary::breakdown(&groups, by))?
        }
        ReportKind::Opportunities => {
            serde_json::to_string_pretty(&pipeline::upcoming_opportunities(db)?)?
        }
    };
    Ok(json)
}

/// Grouped bets of every status in `scope`, settled first.
fn scoped_groups(db: &Database, user_id: i64, scope: BetScope) -> Result<Vec<pipeline::GroupedBet>> {
    let mut groups = Vec::new();
    for status in scope.statuses() {
        groups.extend(pipeline::prepare_bets(db, user_id, *status == BetStatus::Settled)?);
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::*;

    #[test]
    fn report_prints_grouped_table_json() {
        let db = temp_db();
        let m = MatchRow {
            id: "m1",
            a: "Medvedev",
            b: "Rune",
            settled: 2,
            score: Some("4-6 7-6(5) 6-3"),
            date: "2026-01-20",
        };
        insert_single(&db, "men_matchs", &m, (2.1, 1.8));
        insert_bet(&db, "m1", 4, 0, 20.0, 1.8);

        let out = run_report(&db, 4, ReportKind::Grouped, BetScope::Settled, pipeline::Dimension::Day).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["rows"][0]["player_bet"], "Rune");
        assert_eq!(value["rows"][0]["Round"], "Quart de finale");

        let raw = run_report(&db, 4, ReportKind::Raw, BetScope::Settled, pipeline::Dimension::Day).unwrap();
        assert!(raw.contains("\"match_id\": \"m1\""));
        assert!(raw.contains("\"Statut\": \"Terminé\""));
    }

    #[test]
    fn report_with_both_scope_tags_rows() {
        let db = temp_db();
        let done = MatchRow {
            id: "done",
            a: "Fritz",
            b: "Paul",
            settled: 1,
            score: Some("6-3 6-4"),
            date: "2026-02-10 18:00:00",
        };
        let live = MatchRow {
            id: "live",
            a: "Fritz",
            b: "Shelton",
            settled: 0,
            score: None,
            date: "2026-02-12 18:00:00",
        };
        insert_single(&db, "men_matchs", &done, (1.6, 2.4));
        insert_single(&db, "men_matchs", &live, (1.9, 1.9));
        insert_bet(&db, "done", 4, 1, 10.0, 1.7);
        insert_bet(&db, "live", 4, 0, 10.0, 2.0);

        let out = run_report(&db, 4, ReportKind::Grouped, BetScope::Both, pipeline::Dimension::Day).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["rows"][0]["Statut"], "Terminé");
        assert_eq!(value["rows"][1]["Statut"], "En cours");
        assert_eq!(value["rows"][1]["player_bet"], "Shelton");

        let legs = run_report(&db, 4, ReportKind::Legs, BetScope::Pending, pipeline::Dimension::Day).unwrap();
        let legs: serde_json::Value = serde_json::from_str(&legs).unwrap();
        assert_eq!(legs.as_array().unwrap().len(), 1);
        assert_eq!(legs[0]["Statut"], "En cours");

        let opps = run_report(&db, 4, ReportKind::Opportunities, BetScope::Settled, pipeline::Dimension::Day).unwrap();
        assert!(opps.contains("\"Joueur\": \"Shelton\""));
    }
}
