//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.
//!
//! Signing up or logging in is where an anonymous visitor becomes a user, so
//! both fold the visitor's usage cookie into the profile and reset it.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_aid_core::ports::PortError;
use tracing::{error, info, warn};
use uuid::Uuid;
use utoipa::ToSchema;

use crate::error::HttpError;
use crate::web::{
    cookies::{self, SESSION_COOKIE, SESSION_DAYS},
    state::AppState,
};

/// Shortest accepted password.
pub const MIN_PASSWORD_LEN: usize = 8;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorBody),
        (status = 500, description = "Internal server error", body = crate::error::ErrorBody)
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(PortError::InvalidInput("A valid email is required".to_string()).into());
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PortError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ))
        .into());
    }

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            PortError::Unexpected("Failed to hash password".to_string())
        })?
        .to_string();

    // 2. Create user in database
    let user = state.db.create_user_with_email(&email, &password_hash).await?;
    info!("Created user {}", user.user_id);

    // 3. Open a session and carry over anonymous usage
    let set_cookies = start_session(&state, &headers, user.user_id).await?;

    let response = AuthResponse {
        user_id: user.user_id,
        email: user.email.unwrap_or(email),
    };
    Ok((StatusCode::CREATED, AppendHeaders(set_cookies), Json(response)))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorBody),
        (status = 500, description = "Internal server error", body = crate::error::ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let email = req.email.trim().to_lowercase();

    // 1. Get user by email
    let user_creds = state.db.get_user_by_email(&email).await.map_err(|e| {
        warn!("Login failed for unknown email: {:?}", e);
        PortError::Unauthorized
    })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        PortError::Unexpected("Authentication error".to_string())
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err(PortError::Unauthorized.into());
    }

    // 3. Open a session and carry over anonymous usage
    let set_cookies = start_session(&state, &headers, user_creds.user_id).await?;

    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: user_creds.email,
    };
    Ok((StatusCode::OK, AppendHeaders(set_cookies), Json(response)))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session", body = crate::error::ErrorBody)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    let auth_session_id =
        cookies::cookie_value(&headers, SESSION_COOKIE).ok_or(PortError::Unauthorized)?;

    state.db.delete_auth_session(auth_session_id).await?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookies::clear_session_cookie())],
    ))
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Merges the visitor's usage cookie into the profile, creates the auth
/// session, and returns the `Set-Cookie` values to send back.
///
/// The merge runs first and its failure fails the request with no session
/// opened and the usage cookie untouched, so signing in again retries it.
async fn start_session(
    state: &AppState,
    headers: &HeaderMap,
    user_id: Uuid,
) -> Result<Vec<(HeaderName, String)>, HttpError> {
    let local = cookies::read_usage(headers, state.study.today());
    let reset = state.study.merge_local_usage(user_id, local).await.map_err(|e| {
        error!("Failed to merge anonymous usage for {}: {:?}", user_id, e);
        e
    })?;

    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_DAYS);
    state
        .db
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await?;

    Ok(vec![
        (header::SET_COOKIE, cookies::session_cookie(&auth_session_id)),
        (header::SET_COOKIE, cookies::usage_cookie(reset)),
    ])
}
