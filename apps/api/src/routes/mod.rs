pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::layout::handlers as layout_handlers;
use crate::narrative::handlers as narrative_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Layout API
        .route(
            "/api/v1/layout/optimize",
            post(layout_handlers::handle_optimize),
        )
        // Narrative API
        .route("/api/v1/narrative/flow", post(narrative_handlers::handle_flow))
        .route(
            "/api/v1/narrative/journeys",
            get(narrative_handlers::handle_list_journeys),
        )
        .route(
            "/api/v1/narrative/arcs",
            get(narrative_handlers::handle_list_arcs),
        )
        .with_state(state)
}
