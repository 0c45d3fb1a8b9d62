use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use bson::oid::ObjectId;
use unical_services::policy::Denial;

use crate::{error::ApiError, state::AppState};

/// The caller identified by the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: ObjectId,
    pub email: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(Denial::Unauthenticated("Authentication required"))?;

        let claims = app_state
            .auth
            .verify_token(token)
            .ok_or(Denial::Unauthenticated("Invalid or expired token"))?;
        let user_id = claims.user_id()?;

        Ok(AuthUser {
            user_id,
            email: claims.email,
        })
    }
}
