// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{
    AppointmentSearchQuery, CreateAppointmentRequest, CreateRecurringRequest,
    CreateWaitlistRequest, FreedWindow, RescheduleRequest, SchedulingError, TransitionRequest,
};
use crate::services::lifecycle::TransitionPayload;
use crate::services::scheduling::SchedulingService;
use crate::store::InMemoryCommitmentStore;

/// Shared state for the scheduling routes: the configuration and one
/// scheduling service over the process-wide commitment store.
pub struct AppState {
    pub config: AppConfig,
    pub scheduling: SchedulingService<InMemoryCommitmentStore>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(InMemoryCommitmentStore::new());
        let scheduling = SchedulingService::new(store, &config);
        Self { config, scheduling }
    }
}

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct WaitlistCandidatesQuery {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: Option<i32>,
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .scheduling
        .create_single(request)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn create_recurring_appointments(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateRecurringRequest>,
) -> Result<Json<Value>, AppError> {
    let result = state
        .scheduling
        .create_recurring(request)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "created": result.created,
        "skipped": result.skipped
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .scheduling
        .get_appointment(appointment_id)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({ "appointment": appointment })))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = state
        .scheduling
        .search_appointments(query)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "count": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Value>, AppError> {
    let payload = TransitionPayload::from(&request);
    let outcome = state
        .scheduling
        .transition(appointment_id, request.status, payload)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "waitlist_candidates": outcome.waitlist_candidates
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .scheduling
        .reschedule(appointment_id, request)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

// ==============================================================================
// WAITLIST HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_waitlist_entry(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateWaitlistRequest>,
) -> Result<Json<Value>, AppError> {
    let entry = state
        .scheduling
        .create_waitlist_entry(request)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "entry": entry
    })))
}

#[axum::debug_handler]
pub async fn list_waitlist(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let entries = state
        .scheduling
        .unfulfilled_waitlist()
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "entries": entries,
        "count": entries.len()
    })))
}

#[axum::debug_handler]
pub async fn get_waitlist_candidates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WaitlistCandidatesQuery>,
) -> Result<Json<Value>, AppError> {
    let freed = FreedWindow {
        date: query.date,
        start_time: query.time,
        duration_minutes: query.duration_minutes.unwrap_or(0),
    };
    let candidates = state
        .scheduling
        .waitlist_candidates(query.provider_id, freed)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "candidates": candidates,
        "count": candidates.len()
    })))
}

#[axum::debug_handler]
pub async fn fulfill_waitlist_entry(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let entry = state
        .scheduling
        .fulfill_waitlist_entry(entry_id)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "entry": entry
    })))
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

fn map_scheduling_error(err: SchedulingError) -> AppError {
    match err {
        SchedulingError::Validation(msg) => AppError::BadRequest(msg),
        SchedulingError::Conflict {
            conflicts_with: Some(id),
        } => AppError::Conflict(format!("Appointment conflicts with existing booking {}", id)),
        SchedulingError::Conflict {
            conflicts_with: None,
        } => AppError::Conflict("Appointment slot no longer available".to_string()),
        SchedulingError::InvalidTransition { from, requested } => AppError::BadRequest(format!(
            "Invalid status transition from {} to {}",
            from, requested
        )),
        SchedulingError::NotFound(id) => AppError::NotFound(format!("Record {} not found", id)),
        SchedulingError::Unavailable(msg) => AppError::Unavailable(msg),
    }
}
