//! Pair scoring — a pure function over two items' stored attributes and
//! analyses.
//!
//! Additive weighted signals instead of a learned model: scores must be
//! explainable, auditable, and exactly reproducible in tests. Deterministic
//! and symmetric — swapping the two arguments never changes the result.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::item::ItemRow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Analyzer item-type agreement. Skipped when either side lacks analysis.
    pub item_type: f64,
    /// Shared extracted identifiers — the strongest signal, identifiers are
    /// near-unique.
    pub identifiers: f64,
    /// Shared extracted person names.
    pub names: f64,
    /// Declared category equality.
    pub category: f64,
    /// Per shared description token, capped at `token_cap`.
    pub token_step: f64,
    pub token_cap: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            item_type: 0.3,
            identifiers: 0.5,
            names: 0.4,
            category: 0.2,
            token_step: 0.1,
            token_cap: 0.3,
        }
    }
}

/// Description tokens must be strictly longer than this to count as overlap;
/// anything shorter ("the", "red", "bag") carries no signal.
const MIN_TOKEN_LEN: usize = 3;

/// Scores one (lost, found) pair into [0, 1]. Pure and symmetric: the roles
/// of the two arguments never affect the result.
pub fn score_pair(a: &ItemRow, b: &ItemRow, weights: &ScoringWeights) -> f64 {
    let mut score = 0.0;

    if let (Some(left), Some(right)) = (&a.analysis, &b.analysis) {
        if !left.item_type.is_empty() && left.item_type.eq_ignore_ascii_case(&right.item_type) {
            score += weights.item_type;
        }
        if any_shared_exact(&left.ids, &right.ids) {
            score += weights.identifiers;
        }
        if any_shared_ci(&left.names, &right.names) {
            score += weights.names;
        }
    }

    if !a.category.is_empty() && a.category.eq_ignore_ascii_case(&b.category) {
        score += weights.category;
    }

    let shared = shared_description_tokens(&a.description, &b.description);
    score += (weights.token_step * shared as f64).min(weights.token_cap);

    score.clamp(0.0, 1.0)
}

fn any_shared_exact(left: &[String], right: &[String]) -> bool {
    left.iter()
        .filter(|l| !l.is_empty())
        .any(|l| right.iter().any(|r| l == r))
}

fn any_shared_ci(left: &[String], right: &[String]) -> bool {
    left.iter()
        .filter(|l| !l.is_empty())
        .any(|l| right.iter().any(|r| l.eq_ignore_ascii_case(r)))
}

fn shared_description_tokens(a: &str, b: &str) -> usize {
    let left = description_tokens(a);
    let right = description_tokens(b);
    left.intersection(&right).count()
}

fn description_tokens(text: &str) -> BTreeSet<String> {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|token| token.len() > MIN_TOKEN_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::{Analysis, ItemStatus, ItemType};
    use chrono::{NaiveDate, Utc};
    use sqlx::types::Json;
    use uuid::Uuid;

    fn make_item(
        item_type: ItemType,
        category: &str,
        description: &str,
        analysis: Option<Analysis>,
    ) -> ItemRow {
        ItemRow {
            id: Uuid::new_v4(),
            item_type,
            title: "test item".to_string(),
            description: description.to_string(),
            category: category.to_string(),
            location: "Main Library".to_string(),
            image_url: None,
            date_reported: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            status: ItemStatus::Active,
            reported_by: Uuid::new_v4(),
            reporter_name: None,
            reporter_roll_no: None,
            reporter_institution: None,
            analysis: analysis.map(Json),
            version: 0,
            created_at: Utc::now(),
        }
    }

    fn make_analysis(item_type: &str, names: Vec<&str>, ids: Vec<&str>) -> Analysis {
        Analysis {
            item_type: item_type.to_string(),
            detected_text: vec![],
            confidence: 0.9,
            names: names.into_iter().map(String::from).collect(),
            ids: ids.into_iter().map(String::from).collect(),
            brands: vec![],
        }
    }

    #[test]
    fn test_category_and_lexical_overlap_only() {
        // "blue" and "backpack" shared (len > 3) → 0.2; category → 0.2
        let lost = make_item(
            ItemType::Lost,
            "bag",
            "blue backpack white stripe",
            Some(make_analysis("", vec![], vec![])),
        );
        let found = make_item(
            ItemType::Found,
            "bag",
            "found blue backpack near library",
            Some(make_analysis("", vec![], vec![])),
        );
        let score = score_pair(&lost, &found, &ScoringWeights::default());
        assert!((score - 0.4).abs() < 1e-9, "Score was {score}");
    }

    #[test]
    fn test_shared_identifier_dominates() {
        // identifier (0.5) + category (0.2) + lexical (0.2) = 0.9
        let lost = make_item(
            ItemType::Lost,
            "bag",
            "blue backpack white stripe",
            Some(make_analysis("", vec![], vec!["12345678"])),
        );
        let found = make_item(
            ItemType::Found,
            "bag",
            "found blue backpack near library",
            Some(make_analysis("", vec![], vec!["12345678"])),
        );
        let score = score_pair(&lost, &found, &ScoringWeights::default());
        assert!((score - 0.9).abs() < 1e-9, "Score was {score}");
    }

    #[test]
    fn test_identifier_and_category_clear_threshold() {
        // No description overlap: identifier (0.5) + category (0.2) = 0.7
        let lost = make_item(
            ItemType::Lost,
            "bag",
            "navy rucksack",
            Some(make_analysis("", vec![], vec!["12345678"])),
        );
        let found = make_item(
            ItemType::Found,
            "bag",
            "picked up outside cafeteria",
            Some(make_analysis("", vec![], vec!["12345678"])),
        );
        let score = score_pair(&lost, &found, &ScoringWeights::default());
        assert!((score - 0.7).abs() < 1e-9, "Score was {score}");
    }

    #[test]
    fn test_symmetric() {
        let lost = make_item(
            ItemType::Lost,
            "electronics",
            "black iphone cracked screen",
            Some(make_analysis("Mobile Phone", vec!["John Doe"], vec![])),
        );
        let found = make_item(
            ItemType::Found,
            "electronics",
            "iphone with cracked glass",
            Some(make_analysis("Mobile Phone", vec!["john doe"], vec![])),
        );
        let weights = ScoringWeights::default();
        assert_eq!(
            score_pair(&lost, &found, &weights),
            score_pair(&found, &lost, &weights)
        );
    }

    #[test]
    fn test_deterministic() {
        let lost = make_item(ItemType::Lost, "keys", "silver keys keychain", None);
        let found = make_item(ItemType::Found, "keys", "bunch of keys on keychain", None);
        let weights = ScoringWeights::default();
        let first = score_pair(&lost, &found, &weights);
        for _ in 0..10 {
            assert_eq!(score_pair(&lost, &found, &weights), first);
        }
    }

    #[test]
    fn test_clamped_to_one() {
        // All signals firing sums to 1.7 before the clamp.
        let lost = make_item(
            ItemType::Lost,
            "documents",
            "student card holder with lanyard",
            Some(make_analysis("ID Card", vec!["Jane Smith"], vec!["987654"])),
        );
        let found = make_item(
            ItemType::Found,
            "documents",
            "student card holder with lanyard",
            Some(make_analysis("ID Card", vec!["Jane Smith"], vec!["987654"])),
        );
        assert_eq!(score_pair(&lost, &found, &ScoringWeights::default()), 1.0);
    }

    #[test]
    fn test_missing_analysis_skips_analysis_signals() {
        let lost = make_item(ItemType::Lost, "bag", "blue backpack", None);
        let found = make_item(
            ItemType::Found,
            "bag",
            "blue backpack",
            Some(make_analysis("Backpack", vec!["John"], vec!["111"])),
        );
        // category (0.2) + shared tokens "blue"? no — "blue" is 4 chars → counts.
        // "blue" + "backpack" shared → 0.2; total 0.4, no analysis contribution.
        let score = score_pair(&lost, &found, &ScoringWeights::default());
        assert!((score - 0.4).abs() < 1e-9, "Score was {score}");
    }

    #[test]
    fn test_no_analysis_no_overlap_scores_zero() {
        let lost = make_item(ItemType::Lost, "bag", "red tote", None);
        let found = make_item(ItemType::Found, "electronics", "laptop charger", None);
        assert_eq!(score_pair(&lost, &found, &ScoringWeights::default()), 0.0);
    }

    #[test]
    fn test_short_tokens_ignored() {
        let lost = make_item(ItemType::Lost, "a", "red bag the one", None);
        let found = make_item(ItemType::Found, "b", "red bag the two", None);
        // "red", "bag", "the", "one"/"two" are all ≤ 3 chars
        assert_eq!(score_pair(&lost, &found, &ScoringWeights::default()), 0.0);
    }

    #[test]
    fn test_token_overlap_capped() {
        let text = "distinctive leather satchel brown strap buckle monogram";
        let lost = make_item(ItemType::Lost, "x", text, None);
        let found = make_item(ItemType::Found, "y", text, None);
        // 7 shared tokens × 0.1 would be 0.7 uncapped
        let score = score_pair(&lost, &found, &ScoringWeights::default());
        assert!((score - 0.3).abs() < 1e-9, "Score was {score}");
    }

    #[test]
    fn test_duplicate_tokens_count_once() {
        let lost = make_item(ItemType::Lost, "x", "wallet wallet wallet", None);
        let found = make_item(ItemType::Found, "y", "brown wallet", None);
        let score = score_pair(&lost, &found, &ScoringWeights::default());
        assert!((score - 0.1).abs() < 1e-9, "Score was {score}");
    }

    #[test]
    fn test_punctuation_trimmed_from_tokens() {
        let lost = make_item(ItemType::Lost, "x", "left near library.", None);
        let found = make_item(ItemType::Found, "y", "found at the library", None);
        let score = score_pair(&lost, &found, &ScoringWeights::default());
        assert!((score - 0.1).abs() < 1e-9, "Score was {score}");
    }

    #[test]
    fn test_names_match_case_insensitive() {
        let lost = make_item(
            ItemType::Lost,
            "x",
            "aaaa",
            Some(make_analysis("", vec!["JANE SMITH"], vec![])),
        );
        let found = make_item(
            ItemType::Found,
            "y",
            "bbbb",
            Some(make_analysis("", vec!["jane smith"], vec![])),
        );
        let score = score_pair(&lost, &found, &ScoringWeights::default());
        assert!((score - 0.4).abs() < 1e-9, "Score was {score}");
    }
}
