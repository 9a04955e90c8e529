use crate::config::scoring::ScoringConfig;
use crate::error::AppResult;
use crate::response::ApiResponse;
use crate::services::quota::QuotaService;
use axum::{extract::Path, response::IntoResponse, Extension};
use sea_orm::DatabaseConnection;

#[utoipa::path(
    get,
    path = "/api/v1/panels/{id}/health",
    params(("id" = i32, Path, description = "Panel ID")),
    responses(
        (status = 200, description = "Per-quota progress and health summary", body = crate::services::quota::PanelHealth),
        (status = 404, description = "Panel not found", body = crate::error::AppError),
    ),
    tag = "panels"
)]
pub async fn panel_health(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<ScoringConfig>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let service = QuotaService::new(db, config.quota);
    let health = service.panel_health(id).await?;

    Ok(ApiResponse::ok(health))
}
