/// Authentication endpoints
///
/// Session-cookie based sign-in, registration, logout, password reset and
/// activation code redemption.
///
/// # Endpoints
///
/// - `POST /v1/auth/login` - Sign in with email and password
/// - `POST /v1/auth/register` - Create an account in the default tenant
/// - `POST /v1/auth/logout` - End the current session
/// - `POST /v1/auth/forgot-password` - Request a reset link
/// - `POST /v1/auth/reset-password` - Set a new password with a reset token
/// - `POST /v1/auth/redeem-code` - Sign in with an activation code
///
/// Every endpoint that starts a session answers with `Set-Cookie` and the
/// role-dependent `redirect_to` path.

use crate::{
    app::AppState,
    cookies::{cleared_session_cookie, session_cookie, session_token},
    error::ApiResult,
};
use atlascrm_shared::auth::authorization::LOGIN_PATH;
use atlascrm_shared::auth::service::SignedIn;
use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{AppendHeaders, IntoResponse},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address (format checked by the service)
    pub email: String,

    /// Password (strength checked by the service)
    pub password: String,

    /// Optional display name
    #[validate(length(max = 120, message = "Name must be at most 120 characters"))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct RedeemCodeRequest {
    pub code: String,
}

/// Where the client should go next
#[derive(Debug, Serialize)]
pub struct RedirectResponse {
    pub redirect_to: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Session cookie plus landing page
fn signed_in_response(state: &AppState, signed_in: SignedIn) -> impl IntoResponse {
    let cookie = session_cookie(
        &signed_in.session.token,
        signed_in.session.expires_at,
        state.config.api.production,
    );

    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(RedirectResponse {
            redirect_to: signed_in.redirect_to,
        }),
    )
}

/// Login endpoint
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/login
/// Content-Type: application/json
///
/// { "email": "user@example.com", "password": "atlas2024" }
/// ```
///
/// # Response
///
/// ```json
/// { "redirect_to": "/app/dashboard" }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email or wrong password (one message for both)
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let signed_in = state.auth.login(&req.email, &req.password).await?;
    Ok(signed_in_response(&state, signed_in))
}

/// Register endpoint
///
/// Creates the user with an ACTIVE USER membership in the default tenant and
/// signs them in.
///
/// # Errors
///
/// - `409 Conflict`: Email already registered
/// - `422 Unprocessable Entity`: Invalid email or weak password
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let signed_in = state
        .auth
        .register(&req.email, &req.password, req.name)
        .await?;
    Ok(signed_in_response(&state, signed_in))
}

/// Logout endpoint
///
/// Idempotent: succeeds without a session and always clears the cookie.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let token = session_token(&headers);
    state.auth.logout(token.as_deref()).await?;

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            cleared_session_cookie(state.config.api.production),
        )]),
        Json(RedirectResponse {
            redirect_to: LOGIN_PATH,
        }),
    ))
}

/// Forgot-password endpoint
///
/// Always `200` with the same message, whether or not the email belongs to an
/// account.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let message = state.auth.forgot_password(&req.email).await?;
    Ok(Json(MessageResponse { message }))
}

/// Reset-password endpoint
///
/// # Errors
///
/// - `400 Bad Request`: Token unknown, used or expired
/// - `422 Unprocessable Entity`: Passwords differ or are too weak
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<RedirectResponse>> {
    state
        .auth
        .reset_password(&req.token, &req.new_password, &req.confirm_password)
        .await?;

    Ok(Json(RedirectResponse {
        redirect_to: LOGIN_PATH,
    }))
}

/// Activation code redemption endpoint
///
/// # Errors
///
/// - `400 Bad Request`: Code malformed, unknown, already redeemed or expired
pub async fn redeem_code(
    State(state): State<AppState>,
    Json(req): Json<RedeemCodeRequest>,
) -> ApiResult<impl IntoResponse> {
    let signed_in = state.auth.redeem_code(&req.code).await?;
    Ok(signed_in_response(&state, signed_in))
}
