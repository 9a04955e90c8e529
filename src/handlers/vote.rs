use crate::config::scoring::ScoringConfig;
use crate::error::AppResult;
use crate::middleware::auth::require_moderator;
use crate::middleware::AuthUser;
use crate::response::ApiResponse;
use crate::services::cache::CacheService;
use crate::services::vote::VoteService;
use crate::services::weight::VoteWeightService;
use axum::{extract::Path, response::IntoResponse, Extension};
use sea_orm::DatabaseConnection;

fn make_vote_service(
    db: DatabaseConnection,
    config: &ScoringConfig,
    cache: Option<CacheService>,
) -> VoteService {
    let service = VoteService::new(db, config.weight);
    match cache {
        Some(c) => service.with_cache(c),
        None => service,
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/feedback/{id}/vote",
    security(("gateway_identity" = [])),
    params(("id" = i32, Path, description = "Feedback ID")),
    responses(
        (status = 200, description = "Vote cast, updated stats returned", body = crate::services::vote::VoteStats),
        (status = 401, description = "Unauthorized", body = crate::error::AppError),
        (status = 404, description = "Feedback or user not found", body = crate::error::AppError),
        (status = 409, description = "Already voted", body = crate::error::AppError),
    ),
    tag = "votes"
)]
pub async fn cast_vote(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<ScoringConfig>,
    cache: Option<Extension<CacheService>>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let service = make_vote_service(db, &config, cache.map(|c| c.0));
    let stats = service.cast(auth_user.user_id, id).await?;

    Ok(ApiResponse::ok(stats))
}

#[utoipa::path(
    delete,
    path = "/api/v1/feedback/{id}/vote",
    security(("gateway_identity" = [])),
    params(("id" = i32, Path, description = "Feedback ID")),
    responses(
        (status = 200, description = "Vote retracted, updated stats returned", body = crate::services::vote::VoteStats),
        (status = 401, description = "Unauthorized", body = crate::error::AppError),
        (status = 404, description = "No vote to retract", body = crate::error::AppError),
    ),
    tag = "votes"
)]
pub async fn retract_vote(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<ScoringConfig>,
    cache: Option<Extension<CacheService>>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let service = make_vote_service(db, &config, cache.map(|c| c.0));
    let stats = service.retract(auth_user.user_id, id).await?;

    Ok(ApiResponse::ok(stats))
}

#[utoipa::path(
    get,
    path = "/api/v1/feedback/{id}/votes",
    params(("id" = i32, Path, description = "Feedback ID")),
    responses(
        (status = 200, description = "Aggregated vote stats", body = crate::services::vote::VoteStats),
        (status = 404, description = "Feedback not found", body = crate::error::AppError),
    ),
    tag = "votes"
)]
pub async fn vote_stats(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<ScoringConfig>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let service = VoteService::new(db, config.weight);
    let stats = service.stats(id).await?;

    Ok(ApiResponse::ok(stats))
}

#[utoipa::path(
    post,
    path = "/api/v1/feedback/{id}/votes/refresh",
    security(("gateway_identity" = [])),
    params(("id" = i32, Path, description = "Feedback ID")),
    responses(
        (status = 200, description = "Cached decayed weights recomputed", body = crate::services::weight::RefreshOutcome),
        (status = 401, description = "Unauthorized", body = crate::error::AppError),
        (status = 403, description = "Moderator role required", body = crate::error::AppError),
        (status = 404, description = "Feedback not found", body = crate::error::AppError),
    ),
    tag = "votes"
)]
pub async fn refresh_decayed_weights(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<ScoringConfig>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    require_moderator(&db, &auth_user).await?;

    let service = VoteWeightService::new(db, config.weight);
    let outcome = service.refresh_decayed_weights(id).await?;

    Ok(ApiResponse::with_message(
        outcome,
        format!(
            "Refreshed {} votes ({} failed)",
            outcome.refreshed, outcome.failed
        ),
    ))
}
