//! Axum extractor for authenticated requests (spec §6.1): `Authorization:
//! Bearer <token>` plus the fingerprint cookie; 401 on any auth failure.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;

use crate::auth::fingerprint::FINGERPRINT_COOKIE;
use crate::auth::Claims;
use crate::error::AppError;
use crate::state::AppState;

pub struct AuthenticatedUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthenticated("missing bearer token".into()))?;

        let jar = CookieJar::from_headers(&parts.headers);
        let fingerprint = jar
            .get(FINGERPRINT_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| AppError::Unauthenticated("missing fingerprint cookie".into()))?;

        let claims = state.token_service.verify(bearer.token(), &fingerprint).await?;
        Ok(AuthenticatedUser(claims))
    }
}

/// Role check helper (spec §6.1: 403 on role violation).
pub fn require_role(user: &AuthenticatedUser, role: &str) -> Result<(), AppError> {
    if user.0.role == role {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
