use crate::{
    config::scoring::QuotaConfig,
    error::{AppError, AppResult},
    models::{
        panel_membership, panel_quota, Panel, PanelMembership, PanelMembershipModel, PanelModel,
        PanelQuota, PanelQuotaModel,
    },
};
use sea_orm::{ActiveEnum, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuotaStatus {
    OnTrack,
    Warning,
    Critical,
}

/// How one quota's actual share compares to its target.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuotaProgress {
    pub quota_id: i32,
    pub key: String,
    pub expected_value: String,
    pub target_percentage: f64,
    pub current_count: u64,
    pub current_percentage: f64,
    /// Signed: positive means over-represented.
    pub deviation: f64,
    pub status: QuotaStatus,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct HealthSummary {
    pub total: u64,
    pub on_track: u64,
    pub warning: u64,
    pub critical: u64,
    /// Mean of the signed deviations.
    pub avg_deviation: f64,
    pub health_score: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PanelHealth {
    pub panel: PanelModel,
    pub quotas: Vec<QuotaProgress>,
    pub summary: HealthSummary,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// The member attribute a quota key counts against. Unknown keys match
/// nothing.
fn member_attribute(member: &PanelMembershipModel, key: &str) -> Option<String> {
    match key {
        "role" => Some(member.role.to_value()),
        "village_id" => member.village_id.map(|id| id.to_string()),
        "department" => member.department.clone(),
        "employee_id" => Some(member.employee_id.clone()),
        _ => None,
    }
}

pub fn classify(deviation: f64, config: &QuotaConfig) -> QuotaStatus {
    let magnitude = deviation.abs();
    if magnitude <= config.on_track_margin {
        QuotaStatus::OnTrack
    } else if magnitude <= config.warning_margin {
        QuotaStatus::Warning
    } else {
        QuotaStatus::Critical
    }
}

/// Compare actual member composition against each configured quota.
/// With no members or no quotas there is nothing to report and the
/// result is empty, never an error.
pub fn quota_progress(
    quotas: &[PanelQuotaModel],
    members: &[PanelMembershipModel],
    config: &QuotaConfig,
) -> Vec<QuotaProgress> {
    if quotas.is_empty() || members.is_empty() {
        return Vec::new();
    }

    let total = members.len() as f64;

    quotas
        .iter()
        .map(|quota| {
            let current_count = members
                .iter()
                .filter(|m| {
                    member_attribute(m, &quota.key)
                        .is_some_and(|v| v.eq_ignore_ascii_case(&quota.expected_value))
                })
                .count() as u64;

            let current_percentage = round2(current_count as f64 / total * 100.0);
            let deviation = round2(current_percentage - quota.target_percentage);

            QuotaProgress {
                quota_id: quota.id,
                key: quota.key.clone(),
                expected_value: quota.expected_value.clone(),
                target_percentage: quota.target_percentage,
                current_count,
                current_percentage,
                deviation,
                status: classify(deviation, config),
            }
        })
        .collect()
}

/// Panel-level rollup. A panel with zero tracked quotas is vacuously
/// healthy.
pub fn health_summary(progress: &[QuotaProgress]) -> HealthSummary {
    let total = progress.len() as u64;
    if total == 0 {
        return HealthSummary {
            total: 0,
            on_track: 0,
            warning: 0,
            critical: 0,
            avg_deviation: 0.0,
            health_score: 100.0,
        };
    }

    let on_track = progress
        .iter()
        .filter(|p| p.status == QuotaStatus::OnTrack)
        .count() as u64;
    let warning = progress
        .iter()
        .filter(|p| p.status == QuotaStatus::Warning)
        .count() as u64;
    let critical = progress
        .iter()
        .filter(|p| p.status == QuotaStatus::Critical)
        .count() as u64;

    let avg_deviation = round2(progress.iter().map(|p| p.deviation).sum::<f64>() / total as f64);
    let health_score = round2(on_track as f64 / total as f64 * 100.0);

    HealthSummary {
        total,
        on_track,
        warning,
        critical,
        avg_deviation,
        health_score,
    }
}

pub struct QuotaService {
    db: DatabaseConnection,
    config: QuotaConfig,
}

impl QuotaService {
    pub fn new(db: DatabaseConnection, config: QuotaConfig) -> Self {
        Self { db, config }
    }

    /// Quota progress and health rollup for one panel, counting only
    /// active memberships.
    pub async fn panel_health(&self, panel_id: i32) -> AppResult<PanelHealth> {
        let panel = Panel::find_by_id(panel_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let quotas = PanelQuota::find()
            .filter(panel_quota::Column::PanelId.eq(panel_id))
            .all(&self.db)
            .await?;

        let members = PanelMembership::find()
            .filter(panel_membership::Column::PanelId.eq(panel_id))
            .filter(panel_membership::Column::Active.eq(true))
            .all(&self.db)
            .await?;

        let progress = quota_progress(&quotas, &members, &self.config);
        let summary = health_summary(&progress);

        Ok(PanelHealth {
            panel,
            quotas: progress,
            summary,
        })
    }
}
