use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl MatchStatus {
    /// `Pending -> Confirmed` on the first message; `Pending|Confirmed ->
    /// Rejected` on dispute or bound-item deletion. `Rejected` is never left
    /// and `Confirmed` is never re-opened.
    pub fn can_transition_to(self, next: MatchStatus) -> bool {
        matches!(
            (self, next),
            (MatchStatus::Pending, MatchStatus::Confirmed)
                | (MatchStatus::Pending, MatchStatus::Rejected)
                | (MatchStatus::Confirmed, MatchStatus::Rejected)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MatchRow {
    pub id: Uuid,
    pub lost_item_id: Uuid,
    pub found_item_id: Uuid,
    /// Score at creation time, in [0, 1]. Frozen — later re-scoring never
    /// touches an existing match.
    pub confidence: f64,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_confirms_or_rejects() {
        assert!(MatchStatus::Pending.can_transition_to(MatchStatus::Confirmed));
        assert!(MatchStatus::Pending.can_transition_to(MatchStatus::Rejected));
    }

    #[test]
    fn test_confirmed_only_rejects() {
        assert!(MatchStatus::Confirmed.can_transition_to(MatchStatus::Rejected));
        assert!(!MatchStatus::Confirmed.can_transition_to(MatchStatus::Pending));
    }

    #[test]
    fn test_rejected_is_terminal() {
        assert!(!MatchStatus::Rejected.can_transition_to(MatchStatus::Pending));
        assert!(!MatchStatus::Rejected.can_transition_to(MatchStatus::Confirmed));
        assert!(!MatchStatus::Rejected.can_transition_to(MatchStatus::Rejected));
    }
}
