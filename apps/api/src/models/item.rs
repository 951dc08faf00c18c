use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ItemType {
    Lost,
    Found,
}

impl ItemType {
    pub fn opposite(self) -> Self {
        match self {
            ItemType::Lost => ItemType::Found,
            ItemType::Found => ItemType::Lost,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ItemStatus {
    Active,
    Matched,
    Returned,
    Deleted,
}

impl ItemStatus {
    /// Forward-only status machine. `Matched -> Active` is the single revert,
    /// and only the match lifecycle performs it (on rejection).
    /// `Returned` and `Deleted` are terminal.
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (ItemStatus::Active, ItemStatus::Matched)
                | (ItemStatus::Active, ItemStatus::Deleted)
                | (ItemStatus::Matched, ItemStatus::Returned)
                | (ItemStatus::Matched, ItemStatus::Deleted)
                | (ItemStatus::Matched, ItemStatus::Active)
        )
    }
}

/// Structured output of the image analyzer, attached to an item at submission
/// time and immutable afterwards. Absence is legal: items reported without a
/// photo (or while the analyzer is down) carry no analysis and simply skip
/// the analysis-derived scoring signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub item_type: String,
    #[serde(default)]
    pub detected_text: Vec<String>,
    pub confidence: f64,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub brands: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ItemRow {
    pub id: Uuid,
    pub item_type: ItemType,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub image_url: Option<String>,
    pub date_reported: NaiveDate,
    pub status: ItemStatus,
    pub reported_by: Uuid,
    pub reporter_name: Option<String>,
    pub reporter_roll_no: Option<String>,
    pub reporter_institution: Option<String>,
    pub analysis: Option<Json<Analysis>>,
    /// Optimistic concurrency counter. Every status flip goes through
    /// `UPDATE ... WHERE version = $n`, so racing promotions lose cleanly.
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

/// Compact item view embedded in match listings.
#[derive(Debug, Clone, Serialize)]
pub struct ItemSummary {
    pub id: Uuid,
    pub item_type: ItemType,
    pub title: String,
    pub category: String,
    pub location: String,
    pub status: ItemStatus,
    pub date_reported: NaiveDate,
    pub reported_by: Uuid,
    pub reporter_name: Option<String>,
}

impl From<&ItemRow> for ItemSummary {
    fn from(item: &ItemRow) -> Self {
        ItemSummary {
            id: item.id,
            item_type: item.item_type,
            title: item.title.clone(),
            category: item.category.clone(),
            location: item.location.clone(),
            status: item.status,
            date_reported: item.date_reported,
            reported_by: item.reported_by,
            reporter_name: item.reporter_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_can_match_or_delete() {
        assert!(ItemStatus::Active.can_transition_to(ItemStatus::Matched));
        assert!(ItemStatus::Active.can_transition_to(ItemStatus::Deleted));
        assert!(!ItemStatus::Active.can_transition_to(ItemStatus::Returned));
    }

    #[test]
    fn test_matched_reverts_only_to_active_returned_or_deleted() {
        assert!(ItemStatus::Matched.can_transition_to(ItemStatus::Active));
        assert!(ItemStatus::Matched.can_transition_to(ItemStatus::Returned));
        assert!(ItemStatus::Matched.can_transition_to(ItemStatus::Deleted));
        assert!(!ItemStatus::Matched.can_transition_to(ItemStatus::Matched));
    }

    #[test]
    fn test_deleted_and_returned_are_terminal() {
        for next in [
            ItemStatus::Active,
            ItemStatus::Matched,
            ItemStatus::Returned,
            ItemStatus::Deleted,
        ] {
            assert!(!ItemStatus::Deleted.can_transition_to(next));
            assert!(!ItemStatus::Returned.can_transition_to(next));
        }
    }

    #[test]
    fn test_opposite_type() {
        assert_eq!(ItemType::Lost.opposite(), ItemType::Found);
        assert_eq!(ItemType::Found.opposite(), ItemType::Lost);
    }
}
