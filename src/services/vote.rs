use crate::{
    config::scoring::WeightConfig,
    error::{AppError, AppResult},
    models::{vote, Feedback, Vote, VoteModel},
    services::{
        cache::CacheService,
        trending::TRENDING_CACHE_PREFIX,
        weight::{decayed_weight, VoteWeightService},
    },
};
use chrono::NaiveDateTime;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use serde::Serialize;
use utoipa::ToSchema;

/// Aggregated voting state of one feedback item. `total_decayed_weight`
/// is evaluated at call time from the frozen base weights, not read
/// from the display cache.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct VoteStats {
    pub count: u64,
    pub total_weight: f64,
    pub total_decayed_weight: f64,
}

/// Fold a set of vote rows into stats, decaying each vote from its own
/// cast time to `now`.
pub fn aggregate(votes: &[VoteModel], now: NaiveDateTime, half_life_days: f64) -> VoteStats {
    VoteStats {
        count: votes.len() as u64,
        total_weight: votes.iter().map(|v| v.weight).sum(),
        total_decayed_weight: votes
            .iter()
            .map(|v| decayed_weight(v.weight, v.created_at, now, half_life_days))
            .sum(),
    }
}

pub struct VoteService {
    db: DatabaseConnection,
    config: WeightConfig,
    weights: VoteWeightService,
    cache: Option<CacheService>,
}

impl VoteService {
    pub fn new(db: DatabaseConnection, config: WeightConfig) -> Self {
        let weights = VoteWeightService::new(db.clone(), config);
        Self {
            db,
            config,
            weights,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: CacheService) -> Self {
        self.cache = Some(cache);
        self
    }

    async fn invalidate_trending_cache(&self) {
        if let Some(cache) = &self.cache {
            cache
                .invalidate_pattern(&format!("{TRENDING_CACHE_PREFIX}:*"))
                .await;
        }
    }

    /// Cast the user's vote, freezing its base weight at this instant.
    /// A second cast by the same user is a conflict; the store's unique
    /// (feedback_id, user_id) constraint backstops the racy case.
    pub async fn cast(&self, user_id: i32, feedback_id: i32) -> AppResult<VoteStats> {
        // Resolves both ids; unknown user or feedback surfaces NotFound here.
        let weight = self.weights.base_weight(user_id, feedback_id).await?;

        if self.has_voted(user_id, feedback_id).await? {
            return Err(AppError::Conflict(
                "Already voted on this feedback".to_string(),
            ));
        }

        let now = chrono::Utc::now().naive_utc();
        vote::ActiveModel {
            feedback_id: Set(feedback_id),
            user_id: Set(user_id),
            weight: Set(weight),
            decayed_weight: Set(Some(weight)),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        tracing::debug!(user_id, feedback_id, weight, "Vote cast");
        self.invalidate_trending_cache().await;

        self.stats(feedback_id).await
    }

    /// Remove the user's vote. NotFound when there is nothing to
    /// retract.
    pub async fn retract(&self, user_id: i32, feedback_id: i32) -> AppResult<VoteStats> {
        let result = Vote::delete_many()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::FeedbackId.eq(feedback_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }

        tracing::debug!(user_id, feedback_id, "Vote retracted");
        self.invalidate_trending_cache().await;

        self.stats(feedback_id).await
    }

    /// Current stats for one feedback item, decay evaluated at call
    /// time. Unknown feedback id is NotFound.
    pub async fn stats(&self, feedback_id: i32) -> AppResult<VoteStats> {
        Feedback::find_by_id(feedback_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let votes = Vote::find()
            .filter(vote::Column::FeedbackId.eq(feedback_id))
            .all(&self.db)
            .await?;

        Ok(aggregate(
            &votes,
            chrono::Utc::now().naive_utc(),
            self.config.half_life_days,
        ))
    }

    /// Existence check on the unique (feedback_id, user_id) pair.
    pub async fn has_voted(&self, user_id: i32, feedback_id: i32) -> AppResult<bool> {
        let count = Vote::find()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::FeedbackId.eq(feedback_id))
            .count(&self.db)
            .await?;

        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const HALF_LIFE: f64 = 180.0;

    fn vote(id: i32, weight: f64, cast_days_ago: i64, now: NaiveDateTime) -> VoteModel {
        VoteModel {
            id,
            feedback_id: 1,
            user_id: id,
            weight,
            decayed_weight: None,
            created_at: now - Duration::days(cast_days_ago),
        }
    }

    #[test]
    fn empty_votes_aggregate_to_zero() {
        let now = chrono::Utc::now().naive_utc();
        let stats = aggregate(&[], now, HALF_LIFE);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.total_weight, 0.0);
        assert_eq!(stats.total_decayed_weight, 0.0);
    }

    #[test]
    fn fresh_votes_keep_full_weight() {
        let now = chrono::Utc::now().naive_utc();
        let votes = vec![vote(1, 1.0, 0, now), vote(2, 1.0, 0, now)];
        let stats = aggregate(&votes, now, HALF_LIFE);
        assert_eq!(stats.count, 2);
        assert!((stats.total_weight - 2.0).abs() < 1e-9);
        assert!((stats.total_decayed_weight - 2.0).abs() < 1e-9);
    }

    #[test]
    fn each_vote_decays_from_its_own_cast_time() {
        let now = chrono::Utc::now().naive_utc();
        // One fresh vote and one a full half-life old.
        let votes = vec![vote(1, 2.0, 0, now), vote(2, 2.0, 180, now)];
        let stats = aggregate(&votes, now, HALF_LIFE);
        assert_eq!(stats.count, 2);
        assert!((stats.total_weight - 4.0).abs() < 1e-9);
        assert!((stats.total_decayed_weight - 3.0).abs() < 1e-6);
    }

    #[test]
    fn total_weight_ignores_decay() {
        let now = chrono::Utc::now().naive_utc();
        let votes = vec![vote(1, 3.0, 500, now)];
        let stats = aggregate(&votes, now, HALF_LIFE);
        assert!((stats.total_weight - 3.0).abs() < 1e-9);
        assert!(stats.total_decayed_weight < 3.0);
    }
}
