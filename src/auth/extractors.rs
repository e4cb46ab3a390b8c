use axum::{extract::FromRequestParts, http::request::Parts};

use crate::session::{Session, SessionUser};
use crate::utils::AppError;

/// A logged-in user, any role.
pub struct AuthUser(pub SessionUser);

/// A logged-in staff member.
pub struct StaffUser(pub SessionUser);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        session.user().map(AuthUser).ok_or(AppError::Unauthorized)
    }
}

impl<S> FromRequestParts<S> for StaffUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;

        if !user.is_staff() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "staff-only route refused");
            return Err(AppError::Forbidden);
        }

        Ok(StaffUser(user))
    }
}
