//! Candidate Scanner — enumerates opposite-type items eligible for
//! comparison and ranks them by score.
//!
//! Pure read over the item store: nothing is mutated, so a scan can be
//! re-run (or abandoned mid-flight) at any time. Every submission triggers a
//! scan for the new item, which is what lets a found item posted after a
//! lost item still produce a match.

use serde::Serialize;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::matching::scoring::{score_pair, ScoringWeights};
use crate::models::item::{ItemRow, ItemStatus};

/// Zero-relevance cutoff: candidates scoring at or below this are dropped to
/// bound downstream work.
const SCORE_FLOOR: f64 = 0.0;

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub item: ItemRow,
    pub score: f64,
}

/// Returns the ranked candidate list for `item`: active opposite-type items,
/// best score first.
pub async fn scan(
    pool: &PgPool,
    item: &ItemRow,
    weights: &ScoringWeights,
) -> Result<Vec<Candidate>, AppError> {
    if item.status != ItemStatus::Active {
        return Err(AppError::Validation(format!(
            "Item {} is not active and cannot be scanned",
            item.id
        )));
    }

    let eligible: Vec<ItemRow> = sqlx::query_as(
        "SELECT * FROM items WHERE item_type = $1 AND status = 'active' AND id <> $2",
    )
    .bind(item.item_type.opposite())
    .bind(item.id)
    .fetch_all(pool)
    .await?;

    Ok(rank(item, eligible, weights))
}

/// Scores and orders candidates: descending score, ties broken by earliest
/// report date — the older unmatched report is more likely the real
/// counterpart and surfaces first. Item id as the final key keeps the order
/// total.
pub fn rank(item: &ItemRow, eligible: Vec<ItemRow>, weights: &ScoringWeights) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = eligible
        .into_iter()
        .map(|candidate| {
            let score = score_pair(item, &candidate, weights);
            Candidate {
                item: candidate,
                score,
            }
        })
        .filter(|c| c.score > SCORE_FLOOR)
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.item.date_reported.cmp(&b.item.date_reported))
            .then_with(|| a.item.id.cmp(&b.item.id))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::ItemType;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn make_item(item_type: ItemType, category: &str, description: &str, day: u32) -> ItemRow {
        ItemRow {
            id: Uuid::new_v4(),
            item_type,
            title: "test".to_string(),
            description: description.to_string(),
            category: category.to_string(),
            location: "Science Block".to_string(),
            image_url: None,
            date_reported: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            status: ItemStatus::Active,
            reported_by: Uuid::new_v4(),
            reporter_name: None,
            reporter_roll_no: None,
            reporter_institution: None,
            analysis: None,
            version: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_rank_orders_by_score_descending() {
        let item = make_item(ItemType::Lost, "bag", "blue backpack white stripe", 10);
        let weak = make_item(ItemType::Found, "bag", "umbrella", 10);
        let strong = make_item(ItemType::Found, "bag", "blue backpack found here", 10);

        let ranked = rank(
            &item,
            vec![weak.clone(), strong.clone()],
            &ScoringWeights::default(),
        );
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].item.id, strong.id);
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn test_rank_tie_broken_by_earlier_report_date() {
        let item = make_item(ItemType::Lost, "bag", "plain", 15);
        let newer = make_item(ItemType::Found, "bag", "nothing shared", 20);
        let older = make_item(ItemType::Found, "bag", "nothing shared", 5);

        // Both candidates score exactly the category weight.
        let ranked = rank(
            &item,
            vec![newer.clone(), older.clone()],
            &ScoringWeights::default(),
        );
        assert_eq!(ranked[0].item.id, older.id);
        assert_eq!(ranked[1].item.id, newer.id);
        assert_eq!(ranked[0].score, ranked[1].score);
    }

    #[test]
    fn test_rank_drops_zero_scores() {
        let item = make_item(ItemType::Lost, "bag", "blue backpack", 10);
        let unrelated = make_item(ItemType::Found, "electronics", "charger", 10);

        let ranked = rank(&item, vec![unrelated], &ScoringWeights::default());
        assert!(ranked.is_empty());
    }
}
