use std::sync::Arc;

use axum::{routing::get, Router};

use scheduling_cell::handlers::AppState;
use scheduling_cell::router::{appointment_routes, waitlist_routes};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Practice scheduling API is running!" }))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/waitlist", waitlist_routes(state))
}
