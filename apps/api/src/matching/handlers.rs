//! Axum route handlers for candidate inspection and match listings.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::items::store::get_item;
use crate::matching::scanner::{self, Candidate};
use crate::matching::lifecycle;
use crate::models::item::ItemSummary;
use crate::models::matching::MatchRow;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct CandidateListResponse {
    pub item_id: Uuid,
    pub candidates: Vec<Candidate>,
}

/// GET /api/v1/items/:id/candidates
///
/// Diagnostic, read-only view of the ranked candidate list for an item.
/// Nothing is promoted here.
pub async fn handle_get_candidates(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<CandidateListResponse>, AppError> {
    let item = get_item(&state.db, item_id).await?;
    let candidates = scanner::scan(&state.db, &item, &state.weights).await?;
    Ok(Json(CandidateListResponse {
        item_id,
        candidates,
    }))
}

#[derive(Serialize)]
pub struct MatchWithItems {
    #[serde(rename = "match")]
    pub match_row: MatchRow,
    pub lost_item: ItemSummary,
    pub found_item: ItemSummary,
}

#[derive(Serialize)]
pub struct MatchListResponse {
    pub matches: Vec<MatchWithItems>,
}

/// GET /api/v1/matches?user_id=...
///
/// Matches where the user reports either bound item, newest first, with both
/// items' summaries attached.
pub async fn handle_list_matches(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<MatchListResponse>, AppError> {
    let rows: Vec<MatchRow> = sqlx::query_as(
        "SELECT m.* FROM matches m
         JOIN items li ON li.id = m.lost_item_id
         JOIN items fi ON fi.id = m.found_item_id
         WHERE li.reported_by = $1 OR fi.reported_by = $1
         ORDER BY m.created_at DESC",
    )
    .bind(params.user_id)
    .fetch_all(&state.db)
    .await?;

    let mut matches = Vec::with_capacity(rows.len());
    for row in rows {
        let lost = get_item(&state.db, row.lost_item_id).await?;
        let found = get_item(&state.db, row.found_item_id).await?;
        matches.push(MatchWithItems {
            lost_item: ItemSummary::from(&lost),
            found_item: ItemSummary::from(&found),
            match_row: row,
        });
    }

    Ok(Json(MatchListResponse { matches }))
}

#[derive(Deserialize)]
pub struct RejectRequest {
    pub user_id: Uuid,
}

/// POST /api/v1/matches/:id/reject
///
/// Explicit dispute by a participant. The bound items re-enter the scan pool.
pub async fn handle_reject_match(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<MatchRow>, AppError> {
    let rejected = lifecycle::reject(&state.db, match_id, Some(request.user_id)).await?;
    Ok(Json(rejected))
}
