use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{instrument, warn};

use crate::auth::claims::{CurrentUser, TokenPair};
use crate::auth::cookie;
use crate::auth::dto::{
    AuthResponse, GenerateOtpRequest, LoginRequest, MessageResponse, PublicUser, RegisterRequest,
    ResetPasswordRequest, VerifyOtpRequest,
};
use crate::auth::middleware::{authenticate, require_admin};
use crate::auth::otp::OtpAction;
use crate::error::AuthError;
use crate::state::AppState;

/// Shortest password accepted on registration and reset.
pub const MIN_PASSWORD_LEN: usize = 6;

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/login/refresh-token", get(refresh))
        .route("/auth/generate-otp", post(generate_otp))
        .route("/auth/forgot-password/generate-otp", post(forgot_password_otp))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/reset-password", post(reset_password))
}

pub fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(me))
        .route_layer(middleware::from_fn_with_state(state, authenticate))
}

pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/users", get(list_users))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state, authenticate))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalized_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::Validation("Invalid email".into()));
    }
    Ok(email)
}

fn check_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AuthError::Validation("Password too short".into()));
    }
    Ok(())
}

/// Status, refresh cookie and access token body in one response.
fn session_response(
    status: StatusCode,
    pair: TokenPair,
    state: &AppState,
) -> (StatusCode, [(HeaderName, String); 1], Json<AuthResponse>) {
    let cookie = cookie::refresh_cookie(
        &pair.refresh_token,
        state.config.jwt.refresh_ttl_minutes,
        state.config.production,
    );
    (
        status,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            access_token: pair.access_token,
        }),
    )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let email = normalized_email(&payload.email)?;
    check_password(&payload.password)?;
    let pair = state.auth.register(&email, &payload.password).await?;
    Ok(session_response(StatusCode::CREATED, pair, &state))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let email = normalized_email(&payload.email)?;
    let pair = state.auth.login(&email, &payload.password).await?;
    Ok(session_response(StatusCode::OK, pair, &state))
}

/// Reissue an access token from the refresh cookie set at login.
#[instrument(skip(state, headers))]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AuthResponse>, AuthError> {
    let token = cookie::read_refresh_cookie(&headers).ok_or(AuthError::Unauthorized)?;
    let access_token = state.auth.refresh(&token).await?;
    Ok(Json(AuthResponse { access_token }))
}

#[instrument(skip(state, payload))]
pub async fn generate_otp(
    State(state): State<AppState>,
    Json(payload): Json<GenerateOtpRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let email = normalized_email(&payload.email)?;
    state
        .auth
        .generate_otp(&email, OtpAction::EmailVerification)
        .await?;
    Ok(Json(MessageResponse {
        message: "OTP sent".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password_otp(
    State(state): State<AppState>,
    Json(payload): Json<GenerateOtpRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let email = normalized_email(&payload.email)?;
    state
        .auth
        .generate_otp(&email, OtpAction::PasswordReset)
        .await?;
    Ok(Json(MessageResponse {
        message: "OTP sent".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let email = normalized_email(&payload.email)?;
    let pair = state.auth.verify_otp(&email, payload.otp.trim()).await?;
    Ok(session_response(StatusCode::OK, pair, &state))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let email = normalized_email(&payload.email)?;
    check_password(&payload.new_password)?;
    state.auth.reset_password(&email, &payload.new_password).await?;
    Ok(Json(MessageResponse {
        message: "Password reset successfully".into(),
    }))
}

/// Echo the identity carried by the access token.
#[instrument]
pub async fn me(user: CurrentUser) -> Json<CurrentUser> {
    Json(user)
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicUser>>, AuthError> {
    let users = state.auth.list_users().await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}
