use crate::{
    config::scoring::SimilarityConfig,
    error::AppResult,
    models::{feedback, Feedback, FeedbackModel, FeedbackState},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use utoipa::ToSchema;

/// Dice/Sørensen coefficient over character bigram sets, in [0, 1].
///
/// Comparison is case-insensitive. Equality is checked before the
/// empty/short cases, so two identical strings (including two empty
/// ones) always score exactly 1.0.
pub fn dice_coefficient(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a_bigrams = bigrams(&a);
    let b_bigrams = bigrams(&b);
    // Not equal, and at least one side too short to form a bigram.
    if a_bigrams.is_empty() || b_bigrams.is_empty() {
        return 0.0;
    }

    let overlap = a_bigrams.intersection(&b_bigrams).count();
    2.0 * overlap as f64 / (a_bigrams.len() + b_bigrams.len()) as f64
}

fn bigrams(s: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Normalized Levenshtein similarity, in [0, 1]. Drop-in alternative to
/// [`dice_coefficient`] when edit-distance semantics fit better than
/// bigram overlap; same contract and edge ordering.
pub fn normalized_levenshtein(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    if a == b {
        return 1.0;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let max_len = a_chars.len().max(b_chars.len());

    1.0 - levenshtein(&a_chars, &b_chars) as f64 / max_len as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();

    for (i, &ca) in a.iter().enumerate() {
        let mut cur = Vec::with_capacity(b.len() + 1);
        cur.push(i + 1);
        for (j, &cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            let deletion = prev[j + 1] + 1;
            let insertion = cur[j] + 1;
            cur.push(substitution.min(deletion).min(insertion));
        }
        prev = cur;
    }

    prev[b.len()]
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DuplicateMatch {
    pub feedback_id: i32,
    pub title: String,
    pub similarity: f64,
}

/// Score `title` against each candidate title and keep matches at or
/// above `threshold`, most similar first.
pub fn rank_duplicates(
    title: &str,
    candidates: &[FeedbackModel],
    exclude_id: Option<i32>,
    threshold: f64,
) -> Vec<DuplicateMatch> {
    let mut matches: Vec<DuplicateMatch> = candidates
        .iter()
        .filter(|f| exclude_id != Some(f.id))
        .map(|f| DuplicateMatch {
            feedback_id: f.id,
            title: f.title.clone(),
            similarity: dice_coefficient(title, &f.title),
        })
        .filter(|m| m.similarity >= threshold)
        .collect();

    matches.sort_by(|x, y| {
        y.similarity
            .partial_cmp(&x.similarity)
            .unwrap_or(Ordering::Equal)
    });
    matches
}

pub struct SimilarityService {
    db: DatabaseConnection,
    config: SimilarityConfig,
}

impl SimilarityService {
    pub fn new(db: DatabaseConnection, config: SimilarityConfig) -> Self {
        Self { db, config }
    }

    /// Duplicate candidates for a (possibly draft) title. Merged items
    /// are skipped: their votes already flowed to the canonical item.
    pub async fn find_duplicates(
        &self,
        title: &str,
        exclude_id: Option<i32>,
        threshold: Option<f64>,
    ) -> AppResult<Vec<DuplicateMatch>> {
        let threshold = threshold.unwrap_or(self.config.duplicate_threshold);

        let candidates = Feedback::find()
            .filter(feedback::Column::State.ne(FeedbackState::Merged))
            .all(&self.db)
            .await?;

        Ok(rank_duplicates(title, &candidates, exclude_id, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::feedback::{FeedbackState, ModerationStatus};

    fn feedback(id: i32, title: &str) -> FeedbackModel {
        let now = chrono::Utc::now().naive_utc();
        FeedbackModel {
            id,
            author_id: 1,
            village_id: None,
            feature_id: None,
            title: title.to_string(),
            body: String::new(),
            state: FeedbackState::New,
            moderation_status: ModerationStatus::Approved,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(dice_coefficient("hello", "hello"), 1.0);
    }

    #[test]
    fn identical_after_lowercasing_score_one() {
        assert_eq!(dice_coefficient("Dark Mode", "dark mode"), 1.0);
    }

    #[test]
    fn empty_against_anything_scores_zero() {
        assert_eq!(dice_coefficient("", "anything"), 0.0);
        assert_eq!(dice_coefficient("anything", ""), 0.0);
    }

    #[test]
    fn both_empty_score_one() {
        assert_eq!(dice_coefficient("", ""), 1.0);
    }

    #[test]
    fn single_char_equal_or_nothing() {
        assert_eq!(dice_coefficient("a", "A"), 1.0);
        assert_eq!(dice_coefficient("a", "b"), 0.0);
        assert_eq!(dice_coefficient("a", "ab"), 0.0);
    }

    #[test]
    fn known_bigram_overlap() {
        // night/nacht share exactly one bigram (ht) of four each.
        let score = dice_coefficient("night", "nacht");
        assert!((score - 0.25).abs() < 1e-9);
    }

    #[test]
    fn symmetric() {
        let pairs = [("night", "nacht"), ("dark mode", "dark modes"), ("", "x")];
        for (a, b) in pairs {
            assert_eq!(dice_coefficient(a, b), dice_coefficient(b, a));
        }
    }

    #[test]
    fn bounded_zero_to_one() {
        let pairs = [
            ("night", "nacht"),
            ("completely", "different"),
            ("same", "same"),
            ("", ""),
        ];
        for (a, b) in pairs {
            let s = dice_coefficient(a, b);
            assert!((0.0..=1.0).contains(&s), "{a} vs {b} scored {s}");
        }
    }

    #[test]
    fn levenshtein_known_distance() {
        // kitten -> sitting is 3 edits over max length 7.
        let score = normalized_levenshtein("kitten", "sitting");
        assert!((score - (1.0 - 3.0 / 7.0)).abs() < 1e-9);
    }

    #[test]
    fn levenshtein_same_contract_edges() {
        assert_eq!(normalized_levenshtein("", ""), 1.0);
        assert_eq!(normalized_levenshtein("", "abc"), 0.0);
        assert_eq!(normalized_levenshtein("Hello", "hello"), 1.0);
    }

    #[test]
    fn rank_filters_below_threshold() {
        let candidates = vec![
            feedback(1, "dark mode support"),
            feedback(2, "export to csv"),
        ];
        let matches = rank_duplicates("dark mode support", &candidates, None, 0.86);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].feedback_id, 1);
    }

    #[test]
    fn rank_sorts_descending() {
        let candidates = vec![
            feedback(1, "dark mode for dashboard"),
            feedback(2, "dark mode"),
        ];
        let matches = rank_duplicates("dark mode", &candidates, None, 0.1);
        assert_eq!(matches[0].feedback_id, 2);
        assert!(matches[0].similarity >= matches[1].similarity);
    }

    #[test]
    fn rank_excludes_requested_id() {
        let candidates = vec![feedback(1, "dark mode"), feedback(2, "dark mode")];
        let matches = rank_duplicates("dark mode", &candidates, Some(1), 0.86);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].feedback_id, 2);
    }
}
