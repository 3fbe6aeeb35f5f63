//! Axum extractors for authentication

use atlascrm_shared::auth::authorization::{AccessContext, LOGIN_PATH};
use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;

use crate::app::AppState;
use crate::cookies::session_token;
use crate::error::ApiError;

/// Authenticated caller with resolved entitlements
///
/// Rejects with a redirect to the login page when there is no live session,
/// and to the user dashboard when the caller has no usable membership.
#[derive(Debug, Clone)]
pub struct CurrentAccess(pub AccessContext);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentAccess
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let Some(token) = session_token(&parts.headers) else {
            return Err(ApiError::Redirect(LOGIN_PATH));
        };

        match app_state.auth.authenticate(&token).await? {
            Some(ctx) => Ok(CurrentAccess(ctx)),
            None => {
                tracing::debug!("Session missing or expired");
                Err(ApiError::Redirect(LOGIN_PATH))
            }
        }
    }
}

/// Admin-tier caller; everyone else is sent to the user dashboard
#[derive(Debug, Clone)]
pub struct AdminAccess(pub AccessContext);

#[async_trait]
impl<S> FromRequestParts<S> for AdminAccess
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentAccess(ctx) = CurrentAccess::from_request_parts(parts, state).await?;
        ctx.require_admin()?;
        Ok(AdminAccess(ctx))
    }
}
