//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use study_aid_core::domain::Viewer;
use tracing::{debug, error};

use crate::web::{
    cookies::{cookie_value, SESSION_COOKIE},
    state::AppState,
};

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_session_id =
        cookie_value(req.headers(), SESSION_COOKIE).ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = state
        .db
        .validate_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to validate auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}

/// Middleware for routes open to anonymous visitors.
///
/// Always inserts a `Viewer`: the signed-in user when the session cookie is
/// valid, `Viewer::Anonymous` otherwise.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let viewer = match cookie_value(req.headers(), SESSION_COOKIE) {
        Some(session_id) => match state.db.validate_auth_session(session_id).await {
            Ok(user_id) => Viewer::User(user_id),
            Err(e) => {
                debug!("Ignoring invalid session cookie: {:?}", e);
                Viewer::Anonymous
            }
        },
        None => Viewer::Anonymous,
    };

    req.extensions_mut().insert(viewer);
    next.run(req).await
}
