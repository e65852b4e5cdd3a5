pub mod auth;
pub mod cookies;
pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::{optional_auth, require_auth};
pub use rest::ApiDoc;

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

use auth::{login_handler, logout_handler, signup_handler};
use rest::{
    delete_concept_handler, dismiss_milestone_handler, generate_explanation_handler,
    generate_flashcards_handler, get_concept_handler, get_streak_handler, get_usage_handler,
    list_concepts_handler, list_flashcards_handler, save_concept_handler,
    update_flashcard_handler,
};
use state::AppState;

/// Builds the API routes. CORS, body limits and the docs UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/flashcards/generate", post(generate_flashcards_handler));

    // Routes that behave differently for signed-in users and anonymous visitors
    let viewer_routes = Router::new()
        .route("/usage", get(get_usage_handler))
        .route("/explanations", post(generate_explanation_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            optional_auth,
        ));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/concepts",
            get(list_concepts_handler).post(save_concept_handler),
        )
        .route(
            "/concepts/{id}",
            get(get_concept_handler).delete(delete_concept_handler),
        )
        .route("/concepts/{id}/flashcards", get(list_flashcards_handler))
        .route("/flashcards/{id}", patch(update_flashcard_handler))
        .route("/streak", get(get_streak_handler))
        .route("/streak/milestone/dismiss", post(dismiss_milestone_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(viewer_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
