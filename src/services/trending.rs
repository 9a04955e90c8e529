use crate::{
    config::scoring::{TrendingConfig, WeightConfig},
    error::AppResult,
    models::{feedback, vote, Feedback, FeedbackModel, FeedbackState, ModerationStatus, Vote,
        VoteModel},
    services::{cache::CacheService, vote::aggregate, weight::days_between},
};
use chrono::{Duration, NaiveDateTime};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use utoipa::ToSchema;

/// Per-request overrides of the configured trending defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendingQuery {
    pub max_age_days: Option<f64>,
    pub limit: Option<u64>,
    pub min_votes: Option<u64>,
    pub feature_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrendingItem {
    pub feedback: FeedbackModel,
    pub vote_count: u64,
    pub total_decayed_weight: f64,
    pub score: f64,
}

/// Score and order candidate items. Items with fewer than `min_votes`
/// votes are dropped outright, not merely ranked low. Ordering is
/// score descending, then newer first, then id — an explicit total
/// order, independent of the candidate query's row order.
pub fn rank(
    candidates: Vec<FeedbackModel>,
    votes_by_item: &HashMap<i32, Vec<VoteModel>>,
    now: NaiveDateTime,
    half_life_days: f64,
    age_floor_days: f64,
    min_votes: u64,
    limit: usize,
) -> Vec<TrendingItem> {
    let mut items: Vec<TrendingItem> = candidates
        .into_iter()
        .filter_map(|f| {
            let votes = votes_by_item
                .get(&f.id)
                .map(|v| v.as_slice())
                .unwrap_or(&[]);
            let stats = aggregate(votes, now, half_life_days);
            if stats.count < min_votes {
                return None;
            }

            let age = days_between(f.created_at, now).max(age_floor_days);
            Some(TrendingItem {
                vote_count: stats.count,
                total_decayed_weight: stats.total_decayed_weight,
                score: stats.total_decayed_weight / age,
                feedback: f,
            })
        })
        .collect();

    items.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.feedback.created_at.cmp(&a.feedback.created_at))
            .then_with(|| a.feedback.id.cmp(&b.feedback.id))
    });
    items.truncate(limit);
    items
}

pub const TRENDING_CACHE_PREFIX: &str = "trending";
const CACHE_TTL_TRENDING: u64 = 30; // seconds; votes land quickly

pub struct TrendingService {
    db: DatabaseConnection,
    weight: WeightConfig,
    defaults: TrendingConfig,
    cache: Option<CacheService>,
}

impl TrendingService {
    pub fn new(db: DatabaseConnection, weight: WeightConfig, defaults: TrendingConfig) -> Self {
        Self {
            db,
            weight,
            defaults,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: CacheService) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Ranked list of currently-hot feedback: approved items in a
    /// rankable state, created within the age window, scored by decayed
    /// vote weight per day of age. Reflects store state as of this
    /// query; an empty list is a normal outcome.
    pub async fn trending(&self, query: TrendingQuery) -> AppResult<Vec<TrendingItem>> {
        let max_age_days = query.max_age_days.unwrap_or(self.defaults.max_age_days);
        let limit = query.limit.unwrap_or(self.defaults.limit);
        let min_votes = query.min_votes.unwrap_or(self.defaults.min_votes);

        let cache_key = format!(
            "{TRENDING_CACHE_PREFIX}:{max_age_days}:{limit}:{min_votes}:{}",
            query.feature_id.map_or_else(|| "all".to_string(), |id| id.to_string()),
        );
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get::<Vec<TrendingItem>>(&cache_key).await {
                return Ok(cached);
            }
        }

        let now = chrono::Utc::now().naive_utc();
        let cutoff = now - Duration::milliseconds((max_age_days * 86_400_000.0) as i64);

        let mut find = Feedback::find()
            .filter(feedback::Column::CreatedAt.gte(cutoff))
            .filter(feedback::Column::ModerationStatus.eq(ModerationStatus::Approved))
            .filter(feedback::Column::State.is_in([
                FeedbackState::New,
                FeedbackState::Triaged,
                FeedbackState::InRoadmap,
            ]));

        if let Some(feature_id) = query.feature_id {
            find = find.filter(feedback::Column::FeatureId.eq(feature_id));
        }

        let candidates = find.all(&self.db).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = candidates.iter().map(|f| f.id).collect();
        let votes = Vote::find()
            .filter(vote::Column::FeedbackId.is_in(ids))
            .all(&self.db)
            .await?;

        let mut votes_by_item: HashMap<i32, Vec<VoteModel>> = HashMap::new();
        for v in votes {
            votes_by_item.entry(v.feedback_id).or_default().push(v);
        }

        let ranked = rank(
            candidates,
            &votes_by_item,
            now,
            self.weight.half_life_days,
            self.defaults.age_floor_days,
            min_votes,
            limit as usize,
        );

        if let Some(cache) = &self.cache {
            cache.set(&cache_key, &ranked, CACHE_TTL_TRENDING).await;
        }

        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HALF_LIFE: f64 = 180.0;
    const AGE_FLOOR: f64 = 0.1;

    fn feedback(id: i32, created_days_ago: i64, now: NaiveDateTime) -> FeedbackModel {
        FeedbackModel {
            id,
            author_id: 1,
            village_id: None,
            feature_id: None,
            title: format!("feedback {id}"),
            body: String::new(),
            state: FeedbackState::New,
            moderation_status: ModerationStatus::Approved,
            created_at: now - Duration::days(created_days_ago),
            updated_at: now,
        }
    }

    fn vote(id: i32, feedback_id: i32, weight: f64, cast_days_ago: i64, now: NaiveDateTime) -> VoteModel {
        VoteModel {
            id,
            feedback_id,
            user_id: id,
            weight,
            decayed_weight: None,
            created_at: now - Duration::days(cast_days_ago),
        }
    }

    fn votes_map(votes: Vec<VoteModel>) -> HashMap<i32, Vec<VoteModel>> {
        let mut map: HashMap<i32, Vec<VoteModel>> = HashMap::new();
        for v in votes {
            map.entry(v.feedback_id).or_default().push(v);
        }
        map
    }

    #[test]
    fn higher_score_ranks_first() {
        let now = chrono::Utc::now().naive_utc();
        // Same age, different weight: 5.0 vs 3.0 total.
        let candidates = vec![feedback(1, 2, now), feedback(2, 2, now)];
        let votes = votes_map(vec![
            vote(1, 1, 3.0, 0, now),
            vote(2, 2, 5.0, 0, now),
        ]);

        let ranked = rank(candidates, &votes, now, HALF_LIFE, AGE_FLOOR, 1, 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].feedback.id, 2);
        assert_eq!(ranked[1].feedback.id, 1);
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn below_min_votes_is_excluded_regardless_of_weight() {
        let now = chrono::Utc::now().naive_utc();
        let candidates = vec![feedback(1, 1, now), feedback(2, 1, now)];
        // Item 1: one enormous vote. Item 2: two small votes.
        let votes = votes_map(vec![
            vote(1, 1, 100.0, 0, now),
            vote(2, 2, 1.0, 0, now),
            vote(3, 2, 1.0, 0, now),
        ]);

        let ranked = rank(candidates, &votes, now, HALF_LIFE, AGE_FLOOR, 2, 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].feedback.id, 2);
    }

    #[test]
    fn unvoted_items_are_excluded_at_default_min() {
        let now = chrono::Utc::now().naive_utc();
        let candidates = vec![feedback(1, 1, now)];
        let ranked = rank(candidates, &HashMap::new(), now, HALF_LIFE, AGE_FLOOR, 1, 10);
        assert!(ranked.is_empty());
    }

    #[test]
    fn min_votes_zero_includes_unvoted_items() {
        let now = chrono::Utc::now().naive_utc();
        let candidates = vec![feedback(1, 1, now)];
        let ranked = rank(candidates, &HashMap::new(), now, HALF_LIFE, AGE_FLOOR, 0, 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, 0.0);
    }

    #[test]
    fn age_floor_bounds_fresh_item_scores() {
        let now = chrono::Utc::now().naive_utc();
        // Created "now": age clamps to the floor instead of ~zero.
        let candidates = vec![feedback(1, 0, now)];
        let votes = votes_map(vec![vote(1, 1, 1.0, 0, now)]);

        let ranked = rank(candidates, &votes, now, HALF_LIFE, AGE_FLOOR, 1, 10);
        assert!((ranked[0].score - 1.0 / AGE_FLOOR).abs() < 1e-6);
    }

    #[test]
    fn equal_scores_break_ties_by_recency() {
        let now = chrono::Utc::now().naive_utc();
        // Both items sit under the age floor, so their ages clamp to
        // the same divisor and equal weights give exactly equal scores.
        let mut older = feedback(1, 0, now);
        older.created_at = now - Duration::seconds(30);
        let newer = feedback(2, 0, now);

        let votes = votes_map(vec![vote(1, 1, 1.0, 0, now), vote(2, 2, 1.0, 0, now)]);
        let ranked = rank(vec![older, newer], &votes, now, HALF_LIFE, AGE_FLOOR, 1, 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].score, ranked[1].score);
        // More recently created wins the tie.
        assert_eq!(ranked[0].feedback.id, 2);
    }

    #[test]
    fn full_ties_fall_back_to_id_order() {
        let now = chrono::Utc::now().naive_utc();
        let a = feedback(2, 0, now);
        let b = feedback(1, 0, now);

        let votes = votes_map(vec![vote(1, 1, 1.0, 0, now), vote(2, 2, 1.0, 0, now)]);
        let ranked = rank(vec![a, b], &votes, now, HALF_LIFE, AGE_FLOOR, 1, 10);
        assert_eq!(ranked[0].feedback.id, 1);
    }

    #[test]
    fn limit_truncates_results() {
        let now = chrono::Utc::now().naive_utc();
        let candidates: Vec<FeedbackModel> = (1..=5).map(|id| feedback(id, 1, now)).collect();
        let votes = votes_map(
            (1..=5)
                .map(|id| vote(id, id, id as f64, 0, now))
                .collect(),
        );

        let ranked = rank(candidates, &votes, now, HALF_LIFE, AGE_FLOOR, 1, 3);
        assert_eq!(ranked.len(), 3);
        // Highest weights survive the cut.
        assert_eq!(ranked[0].feedback.id, 5);
        assert_eq!(ranked[2].feedback.id, 3);
    }

    #[test]
    fn empty_candidates_rank_empty() {
        let now = chrono::Utc::now().naive_utc();
        let ranked = rank(Vec::new(), &HashMap::new(), now, HALF_LIFE, AGE_FLOOR, 1, 10);
        assert!(ranked.is_empty());
    }
}
