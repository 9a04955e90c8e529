use crate::{
    config::scoring::WeightConfig,
    error::{AppError, AppResult},
    models::{
        panel_membership, vote, Feedback, PanelMembership, User, UserRole, Village, VillagePriority,
        Vote,
    },
};
use chrono::NaiveDateTime;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use serde::Serialize;
use utoipa::ToSchema;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Real-valued days elapsed from `from` to `to`, clamped at zero so a
/// skewed clock can never inflate a weight.
pub fn days_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    ((to - from).num_milliseconds() as f64 / MS_PER_DAY).max(0.0)
}

/// Continuous exponential decay: `base * 2^(-days / half_life)`.
pub fn decayed_weight(
    base: f64,
    voted_at: NaiveDateTime,
    now: NaiveDateTime,
    half_life_days: f64,
) -> f64 {
    base * (-days_between(voted_at, now) / half_life_days).exp2()
}

/// Base weight of a vote at cast time: role multiplier times the
/// feedback village's priority multiplier, plus the panel bonus at
/// most once.
pub fn compute_base_weight(
    config: &WeightConfig,
    role: UserRole,
    village_priority: Option<VillagePriority>,
    has_panel_seat: bool,
) -> f64 {
    let mut weight = config.role_multiplier(role) * config.village_multiplier(village_priority);
    if has_panel_seat {
        weight += config.panel_boost;
    }
    weight
}

/// Result of a cached-decayed-weight refresh run.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct RefreshOutcome {
    pub refreshed: u64,
    pub failed: u64,
}

pub struct VoteWeightService {
    db: DatabaseConnection,
    config: WeightConfig,
}

impl VoteWeightService {
    pub fn new(db: DatabaseConnection, config: WeightConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &WeightConfig {
        &self.config
    }

    /// Current base weight the given user's vote on the given feedback
    /// would carry. Unknown ids are an error, never a silent zero.
    pub async fn base_weight(&self, user_id: i32, feedback_id: i32) -> AppResult<f64> {
        let user = User::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let feedback = Feedback::find_by_id(feedback_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        // Missing village row degrades to the medium multiplier.
        let village_priority = match feedback.village_id {
            Some(village_id) => Village::find_by_id(village_id)
                .one(&self.db)
                .await?
                .map(|v| v.priority),
            None => None,
        };

        let has_panel_seat = PanelMembership::find()
            .filter(panel_membership::Column::UserId.eq(user_id))
            .filter(panel_membership::Column::Active.eq(true))
            .count(&self.db)
            .await?
            > 0;

        Ok(compute_base_weight(
            &self.config,
            user.role,
            village_priority,
            has_panel_seat,
        ))
    }

    /// Recompute and persist the cached `decayed_weight` of every vote
    /// on one feedback item, all evaluated at a single instant. A vote
    /// that fails to write is logged and counted; the rest of the
    /// batch proceeds. A vote cast mid-run may or may not be included.
    pub async fn refresh_decayed_weights(&self, feedback_id: i32) -> AppResult<RefreshOutcome> {
        Feedback::find_by_id(feedback_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let now = chrono::Utc::now().naive_utc();
        let votes = Vote::find()
            .filter(vote::Column::FeedbackId.eq(feedback_id))
            .all(&self.db)
            .await?;

        let mut outcome = RefreshOutcome {
            refreshed: 0,
            failed: 0,
        };

        for v in votes {
            let decayed = decayed_weight(v.weight, v.created_at, now, self.config.half_life_days);
            let update = vote::ActiveModel {
                id: Set(v.id),
                decayed_weight: Set(Some(decayed)),
                ..Default::default()
            };

            match update.update(&self.db).await {
                Ok(_) => outcome.refreshed += 1,
                Err(e) => {
                    tracing::warn!(
                        vote_id = v.id,
                        feedback_id,
                        "Failed to refresh decayed weight: {}",
                        e
                    );
                    outcome.failed += 1;
                }
            }
        }

        tracing::debug!(
            feedback_id,
            refreshed = outcome.refreshed,
            failed = outcome.failed,
            "Decayed weight refresh complete"
        );

        Ok(outcome)
    }
}
