pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::orchestration::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Scoring API
        .route("/api/v1/scores", post(handlers::handle_score))
        .route("/api/v1/scores/:run_id", get(handlers::handle_get_run))
        .route(
            "/api/v1/jobs/:job_id/rankings",
            get(handlers::handle_job_rankings),
        )
        // Context API
        .route(
            "/api/v1/contexts/health",
            get(handlers::handle_context_health),
        )
        .route("/api/v1/contexts/:id", get(handlers::handle_get_context))
        .with_state(state)
}
