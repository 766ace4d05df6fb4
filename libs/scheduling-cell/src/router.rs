// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::handlers::{self, AppState};

pub fn appointment_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/",
            post(handlers::create_appointment).get(handlers::search_appointments),
        )
        .route("/recurring", post(handlers::create_recurring_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route(
            "/{appointment_id}/status",
            patch(handlers::update_appointment_status),
        )
        .route(
            "/{appointment_id}/reschedule",
            patch(handlers::reschedule_appointment),
        )
        .with_state(state)
}

pub fn waitlist_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/",
            post(handlers::create_waitlist_entry).get(handlers::list_waitlist),
        )
        .route("/candidates", get(handlers::get_waitlist_candidates))
        .route("/{entry_id}/fulfill", post(handlers::fulfill_waitlist_entry))
        .with_state(state)
}
