#![allow(dead_code)]
//
// Shared fixtures for the scheduling-cell test suites.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use scheduling_cell::models::{
    Appointment, AppointmentStatus, AppointmentType, CreateAppointmentRequest, RecurrenceSpec,
    RecurrenceTimeSlot, WaitlistEntry,
};
use scheduling_cell::services::scheduling::SchedulingService;
use scheduling_cell::store::InMemoryCommitmentStore;
use shared_config::AppConfig;

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

pub fn date(y: i32, mo: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, mo, d).unwrap()
}

pub fn time(h: u32, mi: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, mi, 0).unwrap()
}

pub fn slot(t: NaiveTime) -> RecurrenceTimeSlot {
    RecurrenceTimeSlot {
        time: t,
        day_of_week: None,
        day_of_month: None,
        month: None,
    }
}

pub fn weekly_slot(t: NaiveTime, day_of_week: u8) -> RecurrenceTimeSlot {
    RecurrenceTimeSlot {
        time: t,
        day_of_week: Some(day_of_week),
        day_of_month: None,
        month: None,
    }
}

pub fn monthly_slot(t: NaiveTime, day_of_month: u8) -> RecurrenceTimeSlot {
    RecurrenceTimeSlot {
        time: t,
        day_of_week: None,
        day_of_month: Some(day_of_month),
        month: None,
    }
}

pub fn yearly_slot(t: NaiveTime, month: u8, day_of_month: u8) -> RecurrenceTimeSlot {
    RecurrenceTimeSlot {
        time: t,
        day_of_week: None,
        day_of_month: Some(day_of_month),
        month: Some(month),
    }
}

pub fn appointment(
    provider_id: Uuid,
    start_time: DateTime<Utc>,
    duration_minutes: i32,
) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        client_id: Uuid::new_v4(),
        provider_id,
        appointment_type: AppointmentType::TherapySession,
        cpt_code: None,
        title: Some("Session".to_string()),
        description: None,
        start_time,
        duration_minutes,
        status: AppointmentStatus::Scheduled,
        location: None,
        room_number: None,
        cancelled_at: None,
        cancelled_by: None,
        cancellation_reason: None,
        no_show_reason: None,
        checked_in_at: None,
        completed_at: None,
        recurrence_group_id: None,
        created_by: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn create_request(
    client_id: Uuid,
    provider_id: Uuid,
    start_time: DateTime<Utc>,
    duration_minutes: i32,
) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        client_id,
        provider_id,
        appointment_type: AppointmentType::TherapySession,
        cpt_code: None,
        title: Some("Session".to_string()),
        description: None,
        start_time,
        duration_minutes,
        location: None,
        room_number: None,
        created_by: None,
        initial_status: Some(AppointmentStatus::Scheduled),
    }
}

pub fn waitlist_entry(
    provider_id: Uuid,
    preferred_date: NaiveDate,
    priority: i32,
    created_at: DateTime<Utc>,
) -> WaitlistEntry {
    WaitlistEntry {
        id: Uuid::new_v4(),
        client_id: Uuid::new_v4(),
        provider_id,
        preferred_date,
        preferred_time_start: None,
        preferred_time_end: None,
        appointment_type: AppointmentType::TherapySession,
        notes: None,
        priority,
        created_at,
        is_fulfilled: false,
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        bind_port: 0,
        store_timeout_ms: 1000,
        conflict_retry_attempts: 3,
    }
}

pub fn scheduling_setup() -> (
    SchedulingService<InMemoryCommitmentStore>,
    Arc<InMemoryCommitmentStore>,
) {
    let store = Arc::new(InMemoryCommitmentStore::new());
    let service = SchedulingService::new(Arc::clone(&store), &test_config());
    (service, store)
}

pub fn weekly_spec(slots: Vec<RecurrenceTimeSlot>, end_date: NaiveDate) -> RecurrenceSpec {
    RecurrenceSpec {
        pattern: scheduling_cell::models::RecurrencePattern::Weekly,
        end_date: Some(end_date),
        time_slots: slots,
        is_business_day_only: false,
    }
}
