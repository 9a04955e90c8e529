use crate::config::scoring::ScoringConfig;
use crate::error::{AppError, AppResult};
use crate::response::ApiResponse;
use crate::services::cache::CacheService;
use crate::services::similarity::SimilarityService;
use crate::services::trending::{TrendingQuery, TrendingService};
use axum::{extract::Query, response::IntoResponse, Extension};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TrendingParams {
    /// Only consider feedback created within this many days
    #[validate(range(min = 0.1, max = 365.0))]
    pub max_age_days: Option<f64>,
    /// Maximum number of items to return
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    /// Exclude items with fewer votes than this
    pub min_votes: Option<u64>,
    /// Restrict to one product area
    pub feature_id: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/v1/feedback/trending",
    params(
        ("max_age_days" = Option<f64>, Query, description = "Only consider feedback created within this many days"),
        ("limit" = Option<u64>, Query, description = "Maximum number of items to return"),
        ("min_votes" = Option<u64>, Query, description = "Exclude items with fewer votes than this"),
        ("feature_id" = Option<i32>, Query, description = "Restrict to one product area"),
    ),
    responses(
        (status = 200, description = "Ranked trending feedback", body = Vec<crate::services::trending::TrendingItem>),
        (status = 400, description = "Validation error", body = crate::error::AppError),
    ),
    tag = "feedback"
)]
pub async fn trending_feedback(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<ScoringConfig>,
    cache: Option<Extension<CacheService>>,
    Query(params): Query<TrendingParams>,
) -> AppResult<impl IntoResponse> {
    params
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let mut service = TrendingService::new(db, config.weight, config.trending);
    if let Some(Extension(cache)) = cache {
        service = service.with_cache(cache);
    }

    let items = service
        .trending(TrendingQuery {
            max_age_days: params.max_age_days,
            limit: params.limit,
            min_votes: params.min_votes,
            feature_id: params.feature_id,
        })
        .await?;

    Ok(ApiResponse::ok(items))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DuplicateParams {
    /// Candidate title to match against existing feedback
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    /// Feedback id to leave out of the scan (the item being edited)
    pub exclude_id: Option<i32>,
    /// Override the configured similarity threshold
    #[validate(range(min = 0.0, max = 1.0))]
    pub threshold: Option<f64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/feedback/duplicates",
    params(
        ("title" = String, Query, description = "Candidate title to match against existing feedback"),
        ("exclude_id" = Option<i32>, Query, description = "Feedback id to leave out of the scan"),
        ("threshold" = Option<f64>, Query, description = "Override the configured similarity threshold"),
    ),
    responses(
        (status = 200, description = "Similar existing feedback, most similar first", body = Vec<crate::services::similarity::DuplicateMatch>),
        (status = 400, description = "Validation error", body = crate::error::AppError),
    ),
    tag = "feedback"
)]
pub async fn find_duplicates(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<ScoringConfig>,
    Query(params): Query<DuplicateParams>,
) -> AppResult<impl IntoResponse> {
    params
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let service = SimilarityService::new(db, config.similarity);
    let matches = service
        .find_duplicates(&params.title, params.exclude_id, params.threshold)
        .await?;

    Ok(ApiResponse::ok(matches))
}
