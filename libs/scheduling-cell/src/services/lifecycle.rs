// libs/scheduling-cell/src/services/lifecycle.rs
//
// The appointment status state machine. Transitions are checked against
// one central table, never compared inline at call sites, and every
// transition that requires side-effect fields validates them before the
// status changes.
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{Appointment, AppointmentStatus, SchedulingError, TransitionRequest};

/// Side-effect fields accompanying a transition request.
#[derive(Debug, Clone, Default)]
pub struct TransitionPayload {
    pub cancelled_by: Option<uuid::Uuid>,
    pub cancellation_reason: Option<String>,
    pub no_show_reason: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&TransitionRequest> for TransitionPayload {
    fn from(req: &TransitionRequest) -> Self {
        Self {
            cancelled_by: req.cancelled_by,
            cancellation_reason: req.cancellation_reason.clone(),
            no_show_reason: req.no_show_reason.clone(),
            checked_in_at: req.checked_in_at,
            completed_at: req.completed_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionApplied {
    Changed,
    /// Permitted repeat of the current state; nothing was modified.
    NoOp,
}

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// All valid next statuses for a given current status. Cancellation
    /// is legal from every non-terminal state; terminal states admit
    /// nothing.
    pub fn valid_transitions(&self, current: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Pending => {
                vec![AppointmentStatus::Scheduled, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::CheckedIn,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Scheduled => {
                vec![AppointmentStatus::Confirmed, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::CheckedIn => {
                vec![AppointmentStatus::Completed, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::NoShow => vec![],
        }
    }

    /// Only Pending and Scheduled may be requested at creation time.
    pub fn validate_initial_status(
        &self,
        status: &AppointmentStatus,
    ) -> Result<(), SchedulingError> {
        match status {
            AppointmentStatus::Pending | AppointmentStatus::Scheduled => Ok(()),
            other => Err(SchedulingError::Validation(format!(
                "appointments cannot be created in status {}",
                other
            ))),
        }
    }

    /// Apply a transition to the appointment in place. Re-cancelling an
    /// already-cancelled appointment is a no-op success (no duplicate
    /// reason churn); repeating the current non-terminal state is a
    /// no-op; everything outside the table fails with both states named.
    pub fn apply(
        &self,
        appointment: &mut Appointment,
        new_status: AppointmentStatus,
        payload: &TransitionPayload,
        now: DateTime<Utc>,
    ) -> Result<TransitionApplied, SchedulingError> {
        let current = appointment.status;
        debug!(
            "Transition requested for appointment {}: {} -> {}",
            appointment.id, current, new_status
        );

        if current == AppointmentStatus::Cancelled && new_status == AppointmentStatus::Cancelled {
            return Ok(TransitionApplied::NoOp);
        }
        if current == new_status && !current.is_terminal() {
            return Ok(TransitionApplied::NoOp);
        }
        if !self.valid_transitions(&current).contains(&new_status) {
            warn!(
                "Invalid transition attempted for appointment {}: {} -> {}",
                appointment.id, current, new_status
            );
            return Err(SchedulingError::InvalidTransition {
                from: current,
                requested: new_status,
            });
        }

        match new_status {
            AppointmentStatus::Cancelled => {
                let cancelled_by = payload.cancelled_by.ok_or_else(|| {
                    SchedulingError::Validation("cancellation requires cancelled_by".into())
                })?;
                let reason = payload
                    .cancellation_reason
                    .as_deref()
                    .filter(|r| !r.trim().is_empty())
                    .ok_or_else(|| {
                        SchedulingError::Validation(
                            "cancellation requires a cancellation_reason".into(),
                        )
                    })?;
                appointment.cancelled_at = Some(now);
                appointment.cancelled_by = Some(cancelled_by);
                appointment.cancellation_reason = Some(reason.to_string());
            }
            AppointmentStatus::NoShow => {
                let reason = payload
                    .no_show_reason
                    .as_deref()
                    .filter(|r| !r.trim().is_empty())
                    .ok_or_else(|| {
                        SchedulingError::Validation("no-show requires a no_show_reason".into())
                    })?;
                appointment.no_show_reason = Some(reason.to_string());
            }
            AppointmentStatus::CheckedIn => {
                appointment.checked_in_at = Some(payload.checked_in_at.unwrap_or(now));
            }
            AppointmentStatus::Completed => {
                let completed_at = payload.completed_at.unwrap_or(now);
                if completed_at < appointment.start_time {
                    return Err(SchedulingError::Validation(
                        "completed_at cannot precede the appointment start".into(),
                    ));
                }
                appointment.completed_at = Some(completed_at);
            }
            AppointmentStatus::Scheduled
            | AppointmentStatus::Confirmed
            | AppointmentStatus::Pending => {}
        }

        appointment.status = new_status;
        appointment.updated_at = now;
        Ok(TransitionApplied::Changed)
    }
}
