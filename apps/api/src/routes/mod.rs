pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::sessions::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Sessions API
        .route("/api/v1/sessions", post(handlers::handle_open_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_close_session),
        )
        .route(
            "/api/v1/sessions/:id/suggestions",
            post(handlers::handle_generate_suggestions),
        )
        .route(
            "/api/v1/sessions/:id/suggestions/:sid/apply",
            post(handlers::handle_apply),
        )
        .route(
            "/api/v1/sessions/:id/suggestions/:sid/undo",
            post(handlers::handle_undo),
        )
        .route(
            "/api/v1/sessions/:id/apply-all",
            post(handlers::handle_apply_all),
        )
        .route(
            "/api/v1/sessions/:id/undo-all",
            post(handlers::handle_undo_all),
        )
        .route(
            "/api/v1/sessions/:id/cover-letter",
            post(handlers::handle_cover_letter),
        )
        .with_state(state)
}
