//! End-to-end checks of the ranking pipeline through the public API:
//! base weight -> decay -> aggregation -> trending order, plus the
//! quota rollup. No database required; every step here is pure.

use std::collections::HashMap;

use chrono::Duration;
use pulse::config::scoring::{QuotaConfig, ScoringConfig, TrendingConfig, WeightConfig};
use pulse::models::feedback::{FeedbackState, ModerationStatus};
use pulse::models::{FeedbackModel, PanelMembershipModel, PanelQuotaModel, UserRole, VoteModel};
use pulse::services::quota::{health_summary, quota_progress, QuotaStatus};
use pulse::services::trending::rank;
use pulse::services::vote::aggregate;
use pulse::services::weight::{compute_base_weight, decayed_weight};
use pulse::models::VillagePriority;

fn feedback(id: i32, created_days_ago: i64, now: chrono::NaiveDateTime) -> FeedbackModel {
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

fn vote(
    id: i32,
    feedback_id: i32,
    weight: f64,
    cast_days_ago: i64,
    now: chrono::NaiveDateTime,
) -> VoteModel {
    VoteModel {
        id,
        feedback_id,
        user_id: id,
        weight,
        decayed_weight: None,
        created_at: now - Duration::days(cast_days_ago),
    }
}

#[test]
fn cast_weights_flow_through_aggregation_into_trending_order() {
    let cfg = ScoringConfig::default();
    let now = chrono::Utc::now().naive_utc();

    // A PO and a PM vote on item 1; two plain users vote on item 2.
    let po_weight = compute_base_weight(&cfg.weight, UserRole::Po, None, false);
    let pm_weight = compute_base_weight(&cfg.weight, UserRole::Pm, None, false);
    let user_weight = compute_base_weight(&cfg.weight, UserRole::User, None, false);

    let candidates = vec![feedback(1, 3, now), feedback(2, 3, now)];
    let mut votes_by_item: HashMap<i32, Vec<VoteModel>> = HashMap::new();
    votes_by_item.insert(
        1,
        vec![vote(1, 1, po_weight, 0, now), vote(2, 1, pm_weight, 0, now)],
    );
    votes_by_item.insert(
        2,
        vec![
            vote(3, 2, user_weight, 0, now),
            vote(4, 2, user_weight, 0, now),
        ],
    );

    let ranked = rank(
        candidates,
        &votes_by_item,
        now,
        cfg.weight.half_life_days,
        cfg.trending.age_floor_days,
        1,
        10,
    );

    // 5.0 total weight beats 2.0 at equal age.
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].feedback.id, 1);
    assert_eq!(ranked[0].vote_count, 2);
    assert!(ranked[0].score > ranked[1].score);
}

#[test]
fn aggregation_matches_sum_of_individually_decayed_votes() {
    let now = chrono::Utc::now().naive_utc();
    let half_life = WeightConfig::default().half_life_days;

    let votes = vec![
        vote(1, 1, 2.0, 0, now),
        vote(2, 1, 1.5, 90, now),
        vote(3, 1, 3.0, 180, now),
    ];

    let expected: f64 = votes
        .iter()
        .map(|v| decayed_weight(v.weight, v.created_at, now, half_life))
        .sum();

    let stats = aggregate(&votes, now, half_life);
    assert_eq!(stats.count, 3);
    assert!((stats.total_weight - 6.5).abs() < 1e-9);
    assert!((stats.total_decayed_weight - expected).abs() < 1e-9);
}

#[test]
fn old_heavily_voted_items_lose_to_fresh_active_ones() {
    let cfg = ScoringConfig::default();
    let now = chrono::Utc::now().naive_utc();

    // Item 1 is 13 days old with one heavy early vote; item 2 is a day
    // old with a modest fresh vote.
    let candidates = vec![feedback(1, 13, now), feedback(2, 1, now)];
    let mut votes_by_item: HashMap<i32, Vec<VoteModel>> = HashMap::new();
    votes_by_item.insert(1, vec![vote(1, 1, 3.0, 13, now)]);
    votes_by_item.insert(2, vec![vote(2, 2, 1.0, 0, now)]);

    let ranked = rank(
        candidates,
        &votes_by_item,
        now,
        cfg.weight.half_life_days,
        cfg.trending.age_floor_days,
        1,
        10,
    );

    // ~3/13 per day vs ~1/1 per day.
    assert_eq!(ranked[0].feedback.id, 2);
}

#[test]
fn village_priority_and_panel_seat_shift_the_base_weight() {
    let cfg = WeightConfig::default();

    let plain = compute_base_weight(&cfg, UserRole::Pm, None, false);
    let high = compute_base_weight(&cfg, UserRole::Pm, Some(VillagePriority::High), false);
    let boosted = compute_base_weight(&cfg, UserRole::Pm, Some(VillagePriority::High), true);

    assert!((plain - 2.0).abs() < 1e-9);
    assert!((high - 3.0).abs() < 1e-9);
    assert!((boosted - 3.3).abs() < 1e-9);
}

#[test]
fn panel_quota_rollup_worked_example() {
    let now = chrono::Utc::now().naive_utc();
    let member = |id: i32, role: UserRole| PanelMembershipModel {
        id,
        panel_id: 1,
        user_id: id,
        role,
        village_id: None,
        employee_id: format!("E{id:04}"),
        department: None,
        active: true,
        created_at: now,
    };
    let quota = |id: i32, expected: &str, target: f64| PanelQuotaModel {
        id,
        panel_id: 1,
        key: "role".to_string(),
        expected_value: expected.to_string(),
        target_percentage: target,
    };

    // 2 PMs and 1 researcher against 40/30/30 targets.
    let members = vec![
        member(1, UserRole::Pm),
        member(2, UserRole::Pm),
        member(3, UserRole::Researcher),
    ];
    let quotas = vec![
        quota(1, "pm", 40.0),
        quota(2, "researcher", 30.0),
        quota(3, "user", 30.0),
    ];

    let progress = quota_progress(&quotas, &members, &QuotaConfig::default());
    assert_eq!(progress.len(), 3);
    assert_eq!(progress[0].status, QuotaStatus::Critical); // 66.67 vs 40
    assert_eq!(progress[1].status, QuotaStatus::OnTrack); // 33.33 vs 30
    assert_eq!(progress[2].status, QuotaStatus::Critical); // 0 vs 30

    let summary = health_summary(&progress);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.on_track, 1);
    assert_eq!(summary.critical, 2);
    assert!((summary.health_score - 33.33).abs() < 1e-9);
    // Signed deviations: 26.67 + 3.33 - 30.0.
    assert!((summary.avg_deviation - 0.0).abs() < 1e-9);
}

#[test]
fn trending_defaults_are_the_documented_widget_contract() {
    let cfg = TrendingConfig::default();
    assert_eq!(cfg.max_age_days, 14.0);
    assert_eq!(cfg.limit, 10);
    assert_eq!(cfg.min_votes, 1);
}
