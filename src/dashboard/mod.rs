use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::cache::SessionCache;
use crate::db::models::BetStatus;
use crate::db::Database;
use crate::pipeline::{self, BetScope, Dimension, EnrichedBet, Prepared, Table};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Settled pipeline results per user
    pub settled: SessionCache<Arc<Prepared>>,
    /// Pending (unsettled) pipeline results per user
    pub pending: SessionCache<Arc<Prepared>>,
}

impl AppState {
    pub fn new(db: Database, cache_ttl: Duration) -> Self {
        AppState {
            db,
            settled: SessionCache::new(cache_ttl),
            pending: SessionCache::new(cache_ttl),
        }
    }

    fn cache(&self, finished: bool) -> &SessionCache<Arc<Prepared>> {
        if finished {
            &self.settled
        } else {
            &self.pending
        }
    }
}

/// Build the Axum router for the dashboard API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/session", get(current_session_handler))
        .route("/api/session/:id", post(session_handler))
        .route("/api/cache", delete(clear_cache_handler))
        .route("/api/opportunities", get(opportunities_handler))
        .route("/api/users/:id/bets", get(bets_handler))
        .route("/api/users/:id/legs", get(legs_handler))
        .route("/api/users/:id/candles", get(candles_handler))
        .route("/api/users/:id/summary", get(summary_handler))
        .route("/api/users/:id/breakdown", get(breakdown_handler))
        .route("/api/users/:id/refresh", post(refresh_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

type ApiError = (StatusCode, String);

fn internal(what: impl std::fmt::Display, e: impl std::fmt::Display) -> ApiError {
    error!("Failed to load {}: {}", what, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Unable to load bets right now".to_string(),
    )
}

/// Pipeline result for the user, from cache when fresh.
async fn load(state: &AppState, user_id: i64, finished: bool) -> Result<Arc<Prepared>, ApiError> {
    state
        .cache(finished)
        .get_or_try_insert(user_id, || {
            pipeline::prepare(&state.db, user_id, finished).map(Arc::new)
        })
        .await
        .map_err(|e| internal(format_args!("bets for user {}", user_id), e))
}

/// One pipeline result per status in `scope`, settled first.
async fn load_scoped(
    state: &AppState,
    user_id: i64,
    scope: BetScope,
) -> Result<Vec<(BetStatus, Arc<Prepared>)>, ApiError> {
    let mut parts = Vec::new();
    for status in scope.statuses() {
        let finished = *status == BetStatus::Settled;
        parts.push((*status, load(state, user_id, finished).await?));
    }
    Ok(parts)
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    #[serde(default)]
    finished: BetScope,
}

#[derive(Debug, Deserialize)]
struct BreakdownQuery {
    by: Option<Dimension>,
}

/// GET /health
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "cached_settled": state.settled.len().await,
        "cached_pending": state.pending.len().await,
    }))
}

/// GET /api/session
async fn current_session_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "user_id": state.settled.current_user().await }))
}

/// DELETE /api/cache – forget every cached user
async fn clear_cache_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.settled.clear().await;
    state.pending.clear().await;
    StatusCode::NO_CONTENT
}

/// POST /api/session/:id – point the session at a user, evicting the previous one
async fn session_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> impl IntoResponse {
    let previous = state.settled.switch_user(user_id).await;
    state.pending.switch_user(user_id).await;
    Json(json!({ "user_id": user_id, "previous": previous }))
}

/// GET /api/users/:id/bets?finished=true|false|both
async fn bets_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(q): Query<StatusQuery>,
) -> Result<Response, ApiError> {
    let parts = load_scoped(&state, user_id, q.finished).await?;
    let response = match q.finished {
        BetScope::Both => {
            let parts: Vec<_> = parts.iter().map(|(s, p)| (*s, p.groups.as_slice())).collect();
            Json(Table::grouped_tagged(&parts)).into_response()
        }
        _ => {
            let groups: Vec<_> = parts.iter().flat_map(|(_, p)| p.groups.iter().cloned()).collect();
            Json(Table::grouped(&groups)).into_response()
        }
    };
    Ok(response)
}

/// GET /api/users/:id/legs?finished=true|false|both
async fn legs_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(q): Query<StatusQuery>,
) -> Result<Response, ApiError> {
    let parts = load_scoped(&state, user_id, q.finished).await?;
    let response = match q.finished {
        BetScope::Both => {
            let parts: Vec<_> = parts.iter().map(|(s, p)| (*s, p.legs.as_slice())).collect();
            Json(pipeline::tagged_legs(&parts)).into_response()
        }
        _ => {
            let rows: Vec<_> = parts
                .iter()
                .flat_map(|(_, p)| p.legs.iter().map(EnrichedBet::to_row))
                .collect();
            Json(rows).into_response()
        }
    };
    Ok(response)
}

/// GET /api/opportunities – value bets on upcoming matches
async fn opportunities_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = pipeline::upcoming_opportunities(&state.db)
        .map_err(|e| internal("upcoming matches", e))?;
    Ok(Json(rows))
}

/// GET /api/users/:id/candles
async fn candles_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let prepared = load(&state, user_id, true).await?;
    Ok(Json(pipeline::candle_points(&prepared.groups)))
}

/// GET /api/users/:id/summary
async fn summary_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let prepared = load(&state, user_id, true).await?;
    let bankroll = state
        .db
        .load_bankroll(user_id)
        .map_err(|e| internal(format_args!("bankroll of user {}", user_id), e))?;
    Ok(Json(pipeline::summary::summarize(&prepared.groups, bankroll)))
}

/// GET /api/users/:id/breakdown?by=competition
async fn breakdown_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(q): Query<BreakdownQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let prepared = load(&state, user_id, true).await?;
    let dimension = q.by.unwrap_or(Dimension::Competition);
    Ok(Json(pipeline::summary::breakdown(&prepared.groups, dimension)))
}

/// POST /api/users/:id/refresh – drop cached results so the next read refetches
async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> impl IntoResponse {
    state.settled.invalidate(user_id).await;
    state.pending.invalidate(user_id).await;
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    fn seeded_state() -> (TestDb, AppState) {
        let db = temp_db();
        let m = MatchRow {
            id: "m1",
            a: "Swiatek",
            b: "Gauff",
            settled: 1,
            score: Some("6-2 6-1"),
            date: "2026-03-01 13:00:00",
        };
        insert_single(&db, "women_matchs", &m, (1.4, 3.2));
        insert_bet(&db, "m1", 5, 1, 10.0, 2.0);
        insert_user(&db, 5, 1000.0);
        let state = AppState::new(db.handle(), Duration::from_secs(60));
        (db, state)
    }

    async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn bets_endpoint_returns_display_table() {
        let (_db, state) = seeded_state();
        let app = router(state);
        let (status, body) = send(app, Method::GET, "/api/users/5/bets").await;
        assert_eq!(status, StatusCode::OK);
        let rows = body["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["player_bet"], "Swiatek");
        assert_eq!(rows[0]["Compétition"], "Wta");
        assert_eq!(rows[0]["Gains net"], 9.7);
        assert_eq!(rows[0]["Cumulative Gains"], 9.7);
    }

    #[tokio::test]
    async fn empty_user_still_gets_columns() {
        let (_db, state) = seeded_state();
        let app = router(state);
        let (status, body) = send(app, Method::GET, "/api/users/99/bets?finished=false").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["columns"].as_array().unwrap().len(), 15);
        assert!(body["rows"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn summary_includes_bankroll() {
        let (_db, state) = seeded_state();
        let app = router(state);
        let (status, body) = send(app, Method::GET, "/api/users/5/summary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["bankroll"], 1000.0);
        assert_eq!(body["total_bets"], 1);
        assert_eq!(body["roi"], 97.0);
    }

    #[tokio::test]
    async fn candles_and_breakdown() {
        let (_db, state) = seeded_state();
        let (_, candles) = send(router(state.clone()), Method::GET, "/api/users/5/candles").await;
        assert_eq!(candles[0]["time"], "2026-03-01");
        assert_eq!(candles[0]["close"], 9.7);

        let (_, rows) = send(router(state), Method::GET, "/api/users/5/breakdown?by=surface").await;
        assert_eq!(rows[0]["key"], "Dur");
        assert_eq!(rows[0]["Nb Paris"], 1);
    }

    #[tokio::test]
    async fn refresh_invalidates_cached_results() {
        let (_db, state) = seeded_state();
        send(router(state.clone()), Method::GET, "/api/users/5/bets").await;
        assert_eq!(state.settled.len().await, 1);

        let (status, _) = send(router(state.clone()), Method::POST, "/api/users/5/refresh").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.settled.len().await, 0);
    }

    #[tokio::test]
    async fn session_switch_evicts_previous_user() {
        let (_db, state) = seeded_state();
        send(router(state.clone()), Method::POST, "/api/session/5").await;
        send(router(state.clone()), Method::GET, "/api/users/5/legs").await;
        assert!(state.settled.get(5).await.is_some());

        let (_, body) = send(router(state.clone()), Method::POST, "/api/session/6").await;
        assert_eq!(body["previous"], 5);
        assert!(state.settled.get(5).await.is_none());

        let (_, body) = send(router(state), Method::GET, "/api/session").await;
        assert_eq!(body["user_id"], 6);
    }

    #[tokio::test]
    async fn health_reports_cache_usage_and_clear_empties_it() {
        let (_db, state) = seeded_state();
        send(router(state.clone()), Method::GET, "/api/users/5/bets?finished=false").await;
        let (status, body) = send(router(state.clone()), Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cached_pending"], 1);

        let (status, _) = send(router(state.clone()), Method::DELETE, "/api/cache").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.pending.len().await, 0);
    }

    #[tokio::test]
    async fn both_scope_returns_tagged_rows() {
        let (db, state) = seeded_state();
        let live = MatchRow {
            id: "w2",
            a: "Sabalenka",
            b: "Rybakina",
            settled: 0,
            score: None,
            date: "2026-03-05 15:00:00",
        };
        insert_single(&db, "women_matchs", &live, (1.7, 2.3));
        insert_bet(&db, "w2", 5, 0, 5.0, 2.4);

        let (status, body) =
            send(router(state.clone()), Method::GET, "/api/users/5/bets?finished=both").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["columns"].as_array().unwrap().last().unwrap(), "Statut");
        let rows = body["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Statut"], "Terminé");
        assert_eq!(rows[1]["Statut"], "En cours");
        assert_eq!(rows[1]["player_bet"], "Rybakina");

        let (_, legs) = send(router(state), Method::GET, "/api/users/5/legs?finished=both").await;
        assert_eq!(legs.as_array().unwrap().len(), 2);
        assert_eq!(legs[1]["Statut"], "En cours");
    }

    #[tokio::test]
    async fn opportunities_endpoint_flags_value_sides() {
        let (db, state) = seeded_state();
        let upcoming = MatchRow {
            id: "w3",
            a: "Pegula",
            b: "Keys",
            settled: 0,
            score: None,
            date: "2026-03-06 19:00:00",
        };
        insert_single(&db, "women_matchs", &upcoming, (1.6, 2.5));
        insert_odds(&db, "w3", (1.5, 2.8), Some("https://odds.example/w3"));

        let (status, body) = send(router(state), Method::GET, "/api/opportunities").await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Joueur"], "Pegula");
        assert_eq!(rows[0]["Parier ?"], false);
        assert_eq!(rows[1]["Joueur"], "Keys");
        assert_eq!(rows[1]["Parier ?"], true);
        assert_eq!(rows[1]["EV_pct"], 12.0);
        assert_eq!(rows[1]["Lien"], "https://odds.example/w3");
    }
}
