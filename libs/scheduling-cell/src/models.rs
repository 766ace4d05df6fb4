// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub appointment_type: AppointmentType,
    pub cpt_code: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub location: Option<String>,
    pub room_number: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub no_show_reason: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Shared by every instance generated from one recurring request.
    pub recurrence_group_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Scheduled end of the appointment. Intervals are half-open, so an
    /// appointment ending exactly when another starts does not overlap it.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + chrono::Duration::minutes(self.duration_minutes as i64)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Scheduled,
    Confirmed,
    CheckedIn,
    Cancelled,
    Completed,
    NoShow,
}

impl AppointmentStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Cancelled | AppointmentStatus::Completed | AppointmentStatus::NoShow
        )
    }

    /// Whether an appointment in this status still occupies provider time.
    /// Cancelled and no-show appointments free their slot.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::NoShow)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::CheckedIn => write!(f, "checked_in"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "PascalCase")]
pub enum AppointmentType {
    #[serde(alias = "intake_session", alias = "intake")]
    IntakeSession,

    #[serde(alias = "follow_up", alias = "followup")]
    FollowUp,

    #[serde(alias = "therapy_session", alias = "therapy")]
    TherapySession,

    #[serde(alias = "group_therapy", alias = "group")]
    GroupTherapy,

    #[serde(alias = "assessment")]
    Assessment,

    #[serde(alias = "medication_management", alias = "med_management")]
    MedicationManagement,

    #[serde(alias = "crisis_intervention", alias = "crisis")]
    CrisisIntervention,

    #[serde(alias = "other")]
    Other,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::IntakeSession => write!(f, "IntakeSession"),
            AppointmentType::FollowUp => write!(f, "FollowUp"),
            AppointmentType::TherapySession => write!(f, "TherapySession"),
            AppointmentType::GroupTherapy => write!(f, "GroupTherapy"),
            AppointmentType::Assessment => write!(f, "Assessment"),
            AppointmentType::MedicationManagement => write!(f, "MedicationManagement"),
            AppointmentType::CrisisIntervention => write!(f, "CrisisIntervention"),
            AppointmentType::Other => write!(f, "Other"),
        }
    }
}

// ==============================================================================
// RECURRENCE MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrencePattern::Daily => write!(f, "daily"),
            RecurrencePattern::Weekly => write!(f, "weekly"),
            RecurrencePattern::Monthly => write!(f, "monthly"),
            RecurrencePattern::Yearly => write!(f, "yearly"),
        }
    }
}

/// One configured time slot of a recurrence. Which optional fields are
/// required depends on the pattern; a mismatch is a validation error,
/// never a silent default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceTimeSlot {
    pub time: NaiveTime,
    /// 0 = Sunday .. 6 = Saturday. Required for weekly patterns.
    pub day_of_week: Option<u8>,
    /// 1-31. Required for monthly and yearly patterns.
    pub day_of_month: Option<u8>,
    /// 1-12. Required for yearly patterns.
    pub month: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceSpec {
    pub pattern: RecurrencePattern,
    /// Inclusive bound on generated instances. Required for every
    /// pattern; absence would mean unbounded generation.
    pub end_date: Option<NaiveDate>,
    pub time_slots: Vec<RecurrenceTimeSlot>,
    #[serde(default)]
    pub is_business_day_only: bool,
}

impl RecurrenceSpec {
    /// Validate the slot/pattern field matrix before any expansion work.
    pub fn validate(&self) -> Result<(), SchedulingError> {
        if self.end_date.is_none() {
            return Err(SchedulingError::Validation(format!(
                "{} recurrence requires an end_date",
                self.pattern
            )));
        }

        for (idx, slot) in self.time_slots.iter().enumerate() {
            self.validate_slot(idx, slot)?;
        }

        Ok(())
    }

    fn validate_slot(&self, idx: usize, slot: &RecurrenceTimeSlot) -> Result<(), SchedulingError> {
        let mismatch = |field: &str| {
            SchedulingError::Validation(format!(
                "time slot {} does not match {} pattern: {}",
                idx, self.pattern, field
            ))
        };

        match self.pattern {
            RecurrencePattern::Daily => {
                if slot.day_of_week.is_some() || slot.day_of_month.is_some() || slot.month.is_some()
                {
                    return Err(mismatch("daily slots take only a time"));
                }
            }
            RecurrencePattern::Weekly => {
                match slot.day_of_week {
                    Some(d) if d <= 6 => {}
                    Some(d) => return Err(mismatch(&format!("day_of_week {} out of range 0-6", d))),
                    None => return Err(mismatch("day_of_week is required")),
                }
                if slot.day_of_month.is_some() || slot.month.is_some() {
                    return Err(mismatch("weekly slots take only day_of_week"));
                }
            }
            RecurrencePattern::Monthly => {
                match slot.day_of_month {
                    Some(d) if (1..=31).contains(&d) => {}
                    Some(d) => {
                        return Err(mismatch(&format!("day_of_month {} out of range 1-31", d)))
                    }
                    None => return Err(mismatch("day_of_month is required")),
                }
                if slot.day_of_week.is_some() || slot.month.is_some() {
                    return Err(mismatch("monthly slots take only day_of_month"));
                }
            }
            RecurrencePattern::Yearly => {
                match slot.day_of_month {
                    Some(d) if (1..=31).contains(&d) => {}
                    Some(d) => {
                        return Err(mismatch(&format!("day_of_month {} out of range 1-31", d)))
                    }
                    None => return Err(mismatch("day_of_month is required")),
                }
                match slot.month {
                    Some(m) if (1..=12).contains(&m) => {}
                    Some(m) => return Err(mismatch(&format!("month {} out of range 1-12", m))),
                    None => return Err(mismatch("month is required")),
                }
                if slot.day_of_week.is_some() {
                    return Err(mismatch("yearly slots take no day_of_week"));
                }
            }
        }

        Ok(())
    }
}

// ==============================================================================
// WAITLIST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub id: Uuid,
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub preferred_date: NaiveDate,
    pub preferred_time_start: Option<NaiveTime>,
    pub preferred_time_end: Option<NaiveTime>,
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
    /// 1-5, 5 is most urgent.
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub is_fulfilled: bool,
}

/// The time range vacated by a cancellation, used to search the waitlist.
#[derive(Debug, Clone, Copy)]
pub struct FreedWindow {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
}

impl FreedWindow {
    pub fn from_appointment(appointment: &Appointment) -> Self {
        Self {
            date: appointment.start_time.date_naive(),
            start_time: appointment.start_time.time(),
            duration_minutes: appointment.duration_minutes,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub appointment_type: AppointmentType,
    pub cpt_code: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub location: Option<String>,
    pub room_number: Option<String>,
    pub created_by: Option<Uuid>,
    /// Pending when omitted. Only Pending and Scheduled are accepted.
    pub initial_status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecurringRequest {
    pub template: CreateAppointmentRequest,
    pub recurrence: RecurrenceSpec,
}

/// Outcome of a recurring creation. Partial success is the normal shape:
/// conflicting occurrences are reported, never silently dropped, and the
/// caller decides whether a partial series is acceptable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringCreateResult {
    pub created: Vec<Appointment>,
    pub skipped: Vec<SkippedOccurrence>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedOccurrence {
    pub start_time: DateTime<Utc>,
    pub conflicts_with: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub status: AppointmentStatus,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub no_show_reason: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub new_start_time: DateTime<Utc>,
    pub new_duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub client_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub appointment_type: Option<AppointmentType>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWaitlistRequest {
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub preferred_date: NaiveDate,
    pub preferred_time_start: Option<NaiveTime>,
    pub preferred_time_end: Option<NaiveTime>,
    pub appointment_type: AppointmentType,
    pub notes: Option<String>,
    pub priority: Option<i32>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Scheduling conflict")]
    Conflict { conflicts_with: Option<Uuid> },

    #[error("Invalid status transition from {from} to {requested}")]
    InvalidTransition {
        from: AppointmentStatus,
        requested: AppointmentStatus,
    },

    #[error("Record {0} not found")]
    NotFound(Uuid),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
