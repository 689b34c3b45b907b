//! HTTP handlers. Authentication happens at the reverse proxy; requests
//! arrive with `x-user` and `x-role` headers already verified, and the
//! handlers only translate them into an [`AuthContext`].

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;

use crate::{
    error::AppError,
    model::{
        AuthContext, ContestEntry, EntriesPage, EntriesQuery, EntryId, LeaderboardQuery,
        LeaderboardRow, ModerationRequest, NewEntry, VoteReceipt, VoteRequest,
    },
    state::AppState,
};

fn auth_context(headers: &HeaderMap) -> AuthContext {
    let user = headers
        .get("x-user")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);
    let admin = headers
        .get("x-role")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|role| role.eq_ignore_ascii_case("admin"));
    AuthContext { user, admin }
}

pub async fn votes_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<VoteReceipt>, AppError> {
    let ctx = auth_context(&headers);
    let receipt = state
        .engine
        .cast_vote(
            &ctx,
            payload.entry_id,
            payload.direction,
            payload.seq,
            Utc::now(),
        )
        .await?;
    Ok(Json(receipt))
}

pub async fn entries_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<EntriesQuery>,
) -> Result<Json<EntriesPage>, AppError> {
    let ctx = auth_context(&headers);
    let page = state.engine.entries(&ctx, &query, Utc::now()).await?;
    Ok(Json(page))
}

pub async fn submit_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<NewEntry>,
) -> Result<Json<ContestEntry>, AppError> {
    let ctx = auth_context(&headers);
    let entry = state.engine.submit(&ctx, payload, Utc::now()).await?;
    Ok(Json(entry))
}

pub async fn leaderboard_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardRow>>, AppError> {
    let rows = state.engine.leaderboard(query.at, Utc::now()).await?;
    Ok(Json(rows))
}

pub async fn moderate_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(entry_id): Path<EntryId>,
    Json(payload): Json<ModerationRequest>,
) -> Result<Json<ContestEntry>, AppError> {
    let ctx = auth_context(&headers);
    let entry = state.engine.moderate(&ctx, entry_id, payload).await?;
    Ok(Json(entry))
}
