pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::conversation::handlers as message_handlers;
use crate::items::handlers as item_handlers;
use crate::matching::handlers as match_handlers;
use crate::state::AppState;

/// Item photos up to 10 MB, matching what the web client accepts.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Items
        .route(
            "/api/v1/items",
            post(item_handlers::handle_submit_item).get(item_handlers::handle_list_items),
        )
        .route(
            "/api/v1/items/:id",
            get(item_handlers::handle_get_item).delete(item_handlers::handle_delete_item),
        )
        // Matching
        .route(
            "/api/v1/items/:id/candidates",
            get(match_handlers::handle_get_candidates),
        )
        .route("/api/v1/matches", get(match_handlers::handle_list_matches))
        .route(
            "/api/v1/matches/:id/reject",
            post(match_handlers::handle_reject_match),
        )
        // Messages
        .route(
            "/api/v1/messages",
            post(message_handlers::handle_send_message).get(message_handlers::handle_list_messages),
        )
        .route(
            "/api/v1/messages/:id/read",
            patch(message_handlers::handle_mark_read),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
