use crate::{
    error::{AppError, AppResult},
    models::{User, UserRole},
};
use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use sea_orm::{DatabaseConnection, EntityTrait};

/// Header the product gateway sets after authenticating the session.
/// This service is never exposed directly; it trusts the gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Identity of the authenticated caller, as forwarded by the gateway.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: i32,
}

/// Requires a forwarded identity on the request and stashes it in the
/// request extensions for handlers to extract.
pub async fn auth_middleware(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = extract_user_id(&headers).ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(AuthUser { user_id });

    Ok(next.run(request).await)
}

fn extract_user_id(headers: &HeaderMap) -> Option<i32> {
    headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or(AppError::Unauthorized)
    }
}

/// Verify the caller holds a moderation-capable role.
pub async fn require_moderator(db: &DatabaseConnection, auth_user: &AuthUser) -> AppResult<()> {
    let user = User::find_by_id(auth_user.user_id)
        .one(db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    match user.role {
        UserRole::Moderator | UserRole::Admin => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}
