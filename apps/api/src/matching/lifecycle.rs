//! Match Lifecycle Manager — the sole writer of match rows and item status.
//!
//! Promotion turns a scored candidate pair into a pending match, atomically:
//! both items are re-read and flipped `active -> matched` inside one
//! transaction, guarded by per-item optimistic version checks, with partial
//! unique indexes on live matches as the backstop. Two near-simultaneous
//! promotions of the same pair yield exactly one match; unrelated pairs
//! never contend.

use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::item::{ItemRow, ItemStatus, ItemType};
use crate::models::matching::{MatchRow, MatchStatus};
use crate::notify::{emit, NotificationIntent, NotificationSink};

/// Initial attempt plus one retry of the read-decide-write cycle after a
/// lost version race.
const PROMOTE_ATTEMPTS: u32 = 2;

enum PromoteOutcome {
    Created(MatchRow),
    /// Preconditions no longer hold (item missing, resolved, or already
    /// bound to a live match); retrying cannot help.
    Ineligible,
    /// Lost an optimistic version race; a fresh read may still succeed.
    Raced,
}

/// Rejects pairs that are not one lost plus one found item. Such calls are
/// caller bugs and must never mutate state.
pub fn validate_pair(lost: &ItemRow, found: &ItemRow) -> Result<(), AppError> {
    if lost.item_type != ItemType::Lost || found.item_type != ItemType::Found {
        return Err(AppError::Validation(
            "A match requires exactly one lost item and one found item".to_string(),
        ));
    }
    Ok(())
}

pub fn meets_threshold(score: f64, threshold: f64) -> bool {
    score >= threshold
}

/// Promotes a scored pair to a pending match, or no-ops when a precondition
/// fails. Safe to call redundantly and concurrently.
pub async fn promote(
    pool: &PgPool,
    notifier: &dyn NotificationSink,
    lost: &ItemRow,
    found: &ItemRow,
    score: f64,
    threshold: f64,
) -> Result<Option<MatchRow>, AppError> {
    validate_pair(lost, found)?;
    if !meets_threshold(score, threshold) {
        return Ok(None);
    }

    for attempt in 0..PROMOTE_ATTEMPTS {
        match try_promote(pool, lost.id, found.id, score).await? {
            PromoteOutcome::Created(created) => {
                info!(
                    "Created match {} for pair ({}, {}) at confidence {:.2}",
                    created.id, lost.id, found.id, created.confidence
                );
                emit(
                    notifier,
                    NotificationIntent::MatchCreated {
                        match_id: created.id,
                        lost_item_id: lost.id,
                        found_item_id: found.id,
                        confidence: created.confidence,
                        recipients: vec![lost.reported_by, found.reported_by],
                    },
                )
                .await;
                return Ok(Some(created));
            }
            PromoteOutcome::Ineligible => return Ok(None),
            PromoteOutcome::Raced => {
                warn!(
                    "Promotion of pair ({}, {}) lost a version race (attempt {})",
                    lost.id,
                    found.id,
                    attempt + 1
                );
            }
        }
    }
    Ok(None)
}

/// One read-decide-write cycle. Early returns drop the transaction, rolling
/// back any partial item flips.
async fn try_promote(
    pool: &PgPool,
    lost_id: Uuid,
    found_id: Uuid,
    score: f64,
) -> Result<PromoteOutcome, AppError> {
    let mut tx = pool.begin().await?;

    // Fresh reads inside the transaction; the caller's rows may be stale.
    let Some(lost) = fetch_item(&mut tx, lost_id).await? else {
        return Ok(PromoteOutcome::Ineligible);
    };
    let Some(found) = fetch_item(&mut tx, found_id).await? else {
        return Ok(PromoteOutcome::Ineligible);
    };
    if lost.status != ItemStatus::Active || found.status != ItemStatus::Active {
        return Ok(PromoteOutcome::Ineligible);
    }

    for item in [&lost, &found] {
        let updated = sqlx::query(
            "UPDATE items SET status = 'matched', version = version + 1
             WHERE id = $1 AND version = $2 AND status = 'active'",
        )
        .bind(item.id)
        .bind(item.version)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() != 1 {
            return Ok(PromoteOutcome::Raced);
        }
    }

    let inserted = sqlx::query_as::<_, MatchRow>(
        "INSERT INTO matches (id, lost_item_id, found_item_id, confidence, status)
         VALUES ($1, $2, $3, $4, 'pending')
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(lost_id)
    .bind(found_id)
    .bind(score.clamp(0.0, 1.0))
    .fetch_one(&mut *tx)
    .await;

    let created = match inserted {
        Ok(row) => row,
        // A live match already exists for this pair or one of the items —
        // the partial unique indexes say this promotion is moot.
        Err(sqlx::Error::Database(e)) if e.constraint().is_some() => {
            return Ok(PromoteOutcome::Ineligible);
        }
        Err(e) => return Err(e.into()),
    };

    tx.commit().await?;
    Ok(PromoteOutcome::Created(created))
}

/// Rejects a match on explicit dispute. When `by_user` is given it must be a
/// reporter on one of the two bound items. Bound items still `matched`
/// revert to `active`; deleted items stay deleted.
pub async fn reject(
    pool: &PgPool,
    match_id: Uuid,
    by_user: Option<Uuid>,
) -> Result<MatchRow, AppError> {
    let mut tx = pool.begin().await?;

    let existing: Option<MatchRow> = sqlx::query_as("SELECT * FROM matches WHERE id = $1")
        .bind(match_id)
        .fetch_optional(&mut *tx)
        .await?;
    let existing =
        existing.ok_or_else(|| AppError::NotFound(format!("Match {match_id} not found")))?;
    if !existing.status.can_transition_to(MatchStatus::Rejected) {
        return Err(AppError::Conflict("Match is already rejected".to_string()));
    }

    if let Some(user) = by_user {
        let lost = fetch_item(&mut tx, existing.lost_item_id).await?;
        let found = fetch_item(&mut tx, existing.found_item_id).await?;
        let is_participant = lost.iter().chain(found.iter()).any(|i| i.reported_by == user);
        if !is_participant {
            return Err(AppError::Forbidden);
        }
    }

    let rejected: Option<MatchRow> = sqlx::query_as(
        "UPDATE matches SET status = 'rejected' WHERE id = $1 AND status <> 'rejected' RETURNING *",
    )
    .bind(match_id)
    .fetch_optional(&mut *tx)
    .await?;
    let rejected =
        rejected.ok_or_else(|| AppError::Conflict("Match is already rejected".to_string()))?;

    revert_items(&mut tx, existing.lost_item_id, existing.found_item_id).await?;

    tx.commit().await?;
    info!("Match {match_id} rejected");
    Ok(rejected)
}

/// Deletes an item on behalf of its reporter. Any live match bound to the
/// item is rejected in the same transaction and the counterpart item
/// re-enters the scan pool.
pub async fn delete_item(pool: &PgPool, item_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let item = fetch_item(&mut tx, item_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item {item_id} not found")))?;
    if item.reported_by != user_id {
        return Err(AppError::Forbidden);
    }
    if !item.status.can_transition_to(ItemStatus::Deleted) {
        return Err(match item.status {
            ItemStatus::Deleted => AppError::Conflict("Item is already deleted".to_string()),
            _ => AppError::Validation("A returned item cannot be deleted".to_string()),
        });
    }

    let updated = sqlx::query(
        "UPDATE items SET status = 'deleted', version = version + 1
         WHERE id = $1 AND version = $2",
    )
    .bind(item.id)
    .bind(item.version)
    .execute(&mut *tx)
    .await?;
    if updated.rows_affected() != 1 {
        return Err(AppError::Conflict(
            "Item was modified concurrently".to_string(),
        ));
    }

    let live: Option<MatchRow> = sqlx::query_as(
        "SELECT * FROM matches WHERE (lost_item_id = $1 OR found_item_id = $1) AND status <> 'rejected'",
    )
    .bind(item_id)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(bound) = &live {
        sqlx::query("UPDATE matches SET status = 'rejected' WHERE id = $1")
            .bind(bound.id)
            .execute(&mut *tx)
            .await?;
        revert_items(&mut tx, bound.lost_item_id, bound.found_item_id).await?;
    }

    tx.commit().await?;
    match live {
        Some(bound) => info!("Item {item_id} deleted; match {} rejected", bound.id),
        None => info!("Item {item_id} deleted"),
    }
    Ok(())
}

/// First message on a pending match confirms it. Returns the status the
/// match ends up with; a concurrent rejection surfaces as a conflict so the
/// caller can roll the message back.
pub async fn confirm_on_message(
    tx: &mut Transaction<'_, Postgres>,
    existing: &MatchRow,
) -> Result<MatchStatus, AppError> {
    match existing.status {
        MatchStatus::Confirmed => return Ok(MatchStatus::Confirmed),
        MatchStatus::Rejected => {
            return Err(AppError::Conflict(
                "Cannot message on a rejected match".to_string(),
            ))
        }
        MatchStatus::Pending => {}
    }

    let updated =
        sqlx::query("UPDATE matches SET status = 'confirmed' WHERE id = $1 AND status = 'pending'")
            .bind(existing.id)
            .execute(&mut **tx)
            .await?;
    if updated.rows_affected() == 1 {
        return Ok(MatchStatus::Confirmed);
    }

    // The guard missed: someone else moved the match first.
    let current: MatchRow = sqlx::query_as("SELECT * FROM matches WHERE id = $1")
        .bind(existing.id)
        .fetch_one(&mut **tx)
        .await?;
    match current.status {
        MatchStatus::Rejected => Err(AppError::Conflict(
            "Cannot message on a rejected match".to_string(),
        )),
        status => Ok(status),
    }
}

pub async fn get_match(pool: &PgPool, match_id: Uuid) -> Result<MatchRow, AppError> {
    let found: Option<MatchRow> = sqlx::query_as("SELECT * FROM matches WHERE id = $1")
        .bind(match_id)
        .fetch_optional(pool)
        .await?;
    found.ok_or_else(|| AppError::NotFound(format!("Match {match_id} not found")))
}

/// Reverts still-`matched` members of a pair to `active`. The status guard
/// keeps deleted items deleted.
async fn revert_items(
    tx: &mut Transaction<'_, Postgres>,
    lost_item_id: Uuid,
    found_item_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE items SET status = 'active', version = version + 1
         WHERE id = ANY($1) AND status = 'matched'",
    )
    .bind(vec![lost_item_id, found_item_id])
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn fetch_item(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<ItemRow>, AppError> {
    Ok(sqlx::query_as("SELECT * FROM items WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?)
}
