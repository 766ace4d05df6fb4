// libs/scheduling-cell/tests/scheduling_test.rs
mod common;

use assert_matches::assert_matches;
use uuid::Uuid;

use common::{
    create_request, date, scheduling_setup, time, utc, waitlist_entry, weekly_slot, weekly_spec,
};
use scheduling_cell::models::{
    AppointmentStatus, CreateRecurringRequest, RescheduleRequest, SchedulingError,
};
use scheduling_cell::services::lifecycle::TransitionPayload;
use scheduling_cell::store::CommitmentStore;

fn cancel_payload() -> TransitionPayload {
    TransitionPayload {
        cancelled_by: Some(Uuid::new_v4()),
        cancellation_reason: Some("client request".to_string()),
        ..Default::default()
    }
}

// ==============================================================================
// SINGLE CREATION
// ==============================================================================

#[tokio::test]
async fn create_single_persists_a_bookable_appointment() {
    let (service, _store) = scheduling_setup();
    let provider = Uuid::new_v4();

    let created = service
        .create_single(create_request(
            Uuid::new_v4(),
            provider,
            utc(2025, 6, 2, 10, 0),
            60,
        ))
        .await
        .unwrap();

    assert_eq!(created.provider_id, provider);
    assert_eq!(created.status, AppointmentStatus::Scheduled);
    assert_eq!(created.end_time(), utc(2025, 6, 2, 11, 0));

    let reloaded = service.get_appointment(created.id).await.unwrap();
    assert_eq!(reloaded.id, created.id);
}

#[tokio::test]
async fn create_single_rejects_non_positive_duration() {
    let (service, _store) = scheduling_setup();

    let result = service
        .create_single(create_request(
            Uuid::new_v4(),
            Uuid::new_v4(),
            utc(2025, 6, 2, 10, 0),
            0,
        ))
        .await;

    assert_matches!(result, Err(SchedulingError::Validation(_)));
}

#[tokio::test]
async fn create_single_surfaces_the_colliding_appointment() {
    let (service, _store) = scheduling_setup();
    let provider = Uuid::new_v4();

    let existing = service
        .create_single(create_request(
            Uuid::new_v4(),
            provider,
            utc(2025, 6, 2, 10, 0),
            60,
        ))
        .await
        .unwrap();

    let result = service
        .create_single(create_request(
            Uuid::new_v4(),
            provider,
            utc(2025, 6, 2, 10, 30),
            60,
        ))
        .await;

    assert_matches!(
        result,
        Err(SchedulingError::Conflict { conflicts_with: Some(id) }) if id == existing.id
    );
}

#[tokio::test]
async fn back_to_back_bookings_succeed() {
    let (service, _store) = scheduling_setup();
    let provider = Uuid::new_v4();

    service
        .create_single(create_request(
            Uuid::new_v4(),
            provider,
            utc(2025, 6, 2, 10, 0),
            60,
        ))
        .await
        .unwrap();

    service
        .create_single(create_request(
            Uuid::new_v4(),
            provider,
            utc(2025, 6, 2, 11, 0),
            60,
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn concurrent_creates_for_one_slot_book_exactly_once() {
    let (service, _store) = scheduling_setup();
    let provider = Uuid::new_v4();

    let first = service.create_single(create_request(
        Uuid::new_v4(),
        provider,
        utc(2025, 6, 2, 10, 0),
        60,
    ));
    let second = service.create_single(create_request(
        Uuid::new_v4(),
        provider,
        utc(2025, 6, 2, 10, 0),
        60,
    ));

    let (a, b) = tokio::join!(first, second);
    let outcomes = [a, b];
    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(SchedulingError::Conflict { .. })))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);
}

// ==============================================================================
// RECURRING CREATION
// ==============================================================================

#[tokio::test]
async fn recurring_creation_reports_partial_success() {
    let (service, _store) = scheduling_setup();
    let provider = Uuid::new_v4();

    // Pre-existing appointment colliding with the third weekly instance.
    let blocker = service
        .create_single(create_request(
            Uuid::new_v4(),
            provider,
            utc(2025, 6, 16, 10, 0),
            60,
        ))
        .await
        .unwrap();

    // Mondays at 10:00 for four weeks starting Monday June 2nd.
    let template = create_request(Uuid::new_v4(), provider, utc(2025, 6, 2, 10, 0), 60);
    let result = service
        .create_recurring(CreateRecurringRequest {
            template,
            recurrence: weekly_spec(vec![weekly_slot(time(10, 0), 1)], date(2025, 6, 23)),
        })
        .await
        .unwrap();

    assert_eq!(result.created.len(), 3);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].start_time, utc(2025, 6, 16, 10, 0));
    assert_eq!(result.skipped[0].conflicts_with, blocker.id);

    // All created instances share one recurrence group.
    let group = result.created[0].recurrence_group_id.unwrap();
    for apt in &result.created {
        assert_eq!(apt.recurrence_group_id, Some(group));
    }

    let starts: Vec<_> = result.created.iter().map(|a| a.start_time).collect();
    assert_eq!(
        starts,
        vec![
            utc(2025, 6, 2, 10, 0),
            utc(2025, 6, 9, 10, 0),
            utc(2025, 6, 23, 10, 0),
        ]
    );
}

#[tokio::test]
async fn recurring_duplicate_slots_self_conflict_within_the_batch() {
    let (service, _store) = scheduling_setup();
    let provider = Uuid::new_v4();

    let template = create_request(Uuid::new_v4(), provider, utc(2025, 6, 2, 10, 0), 60);
    let result = service
        .create_recurring(CreateRecurringRequest {
            template,
            recurrence: weekly_spec(
                vec![weekly_slot(time(10, 0), 1), weekly_slot(time(10, 0), 1)],
                date(2025, 6, 8),
            ),
        })
        .await
        .unwrap();

    // One Monday in range, declared twice: first wins, duplicate skipped.
    assert_eq!(result.created.len(), 1);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].conflicts_with, result.created[0].id);
}

#[tokio::test]
async fn recurring_with_empty_expansion_creates_nothing() {
    let (service, _store) = scheduling_setup();

    let template = create_request(
        Uuid::new_v4(),
        Uuid::new_v4(),
        utc(2025, 6, 2, 10, 0),
        60,
    );
    let result = service
        .create_recurring(CreateRecurringRequest {
            template,
            recurrence: weekly_spec(vec![weekly_slot(time(10, 0), 1)], date(2025, 5, 1)),
        })
        .await
        .unwrap();

    assert!(result.created.is_empty());
    assert!(result.skipped.is_empty());
}

#[tokio::test]
async fn recurring_with_invalid_spec_touches_nothing() {
    let (service, store) = scheduling_setup();
    let provider = Uuid::new_v4();

    let mut recurrence = weekly_spec(vec![weekly_slot(time(10, 0), 1)], date(2025, 6, 30));
    recurrence.end_date = None;

    let template = create_request(Uuid::new_v4(), provider, utc(2025, 6, 2, 10, 0), 60);
    let result = service
        .create_recurring(CreateRecurringRequest {
            template,
            recurrence,
        })
        .await;

    assert_matches!(result, Err(SchedulingError::Validation(_)));
    let commitments = store
        .commitments_in_range(provider, utc(2025, 1, 1, 0, 0), utc(2026, 1, 1, 0, 0))
        .await
        .unwrap();
    assert!(commitments.appointments.is_empty());
}

// ==============================================================================
// TRANSITIONS
// ==============================================================================

#[tokio::test]
async fn cancelling_frees_the_slot_and_proposes_waitlist_candidates() {
    let (service, store) = scheduling_setup();
    let provider = Uuid::new_v4();

    let appointment = service
        .create_single(create_request(
            Uuid::new_v4(),
            provider,
            utc(2025, 6, 2, 10, 0),
            60,
        ))
        .await
        .unwrap();

    let urgent = waitlist_entry(provider, date(2025, 6, 2), 5, utc(2025, 5, 1, 0, 0));
    let routine = waitlist_entry(provider, date(2025, 6, 2), 2, utc(2025, 4, 1, 0, 0));
    store.insert_waitlist_entry(urgent.clone()).await.unwrap();
    store.insert_waitlist_entry(routine.clone()).await.unwrap();

    let outcome = service
        .transition(appointment.id, AppointmentStatus::Cancelled, cancel_payload())
        .await
        .unwrap();

    assert_eq!(outcome.appointment.status, AppointmentStatus::Cancelled);
    assert!(outcome.appointment.cancelled_at.is_some());
    assert_eq!(outcome.waitlist_candidates.len(), 2);
    assert_eq!(outcome.waitlist_candidates[0].id, urgent.id);
    assert_eq!(outcome.waitlist_candidates[1].id, routine.id);

    // The freed slot is bookable again.
    service
        .create_single(create_request(
            Uuid::new_v4(),
            provider,
            utc(2025, 6, 2, 10, 0),
            60,
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn transition_cancel_twice_is_idempotent() {
    let (service, _store) = scheduling_setup();
    let provider = Uuid::new_v4();

    let appointment = service
        .create_single(create_request(
            Uuid::new_v4(),
            provider,
            utc(2025, 6, 2, 10, 0),
            60,
        ))
        .await
        .unwrap();

    let first = service
        .transition(appointment.id, AppointmentStatus::Cancelled, cancel_payload())
        .await
        .unwrap();
    let second = service
        .transition(appointment.id, AppointmentStatus::Cancelled, cancel_payload())
        .await
        .unwrap();

    assert_eq!(
        first.appointment.cancelled_at,
        second.appointment.cancelled_at
    );
    assert_eq!(
        first.appointment.cancellation_reason,
        second.appointment.cancellation_reason
    );
    // The no-op does not re-run waitlist matching.
    assert!(second.waitlist_candidates.is_empty());
}

#[tokio::test]
async fn invalid_transition_leaves_the_appointment_unchanged() {
    let (service, _store) = scheduling_setup();
    let provider = Uuid::new_v4();

    let appointment = service
        .create_single(create_request(
            Uuid::new_v4(),
            provider,
            utc(2025, 6, 2, 10, 0),
            60,
        ))
        .await
        .unwrap();

    let result = service
        .transition(
            appointment.id,
            AppointmentStatus::Completed,
            TransitionPayload::default(),
        )
        .await;

    assert_matches!(result, Err(SchedulingError::InvalidTransition { .. }));
    let reloaded = service.get_appointment(appointment.id).await.unwrap();
    assert_eq!(reloaded.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn transition_of_unknown_appointment_is_not_found() {
    let (service, _store) = scheduling_setup();
    let missing = Uuid::new_v4();

    let result = service
        .transition(missing, AppointmentStatus::Confirmed, TransitionPayload::default())
        .await;

    assert_matches!(result, Err(SchedulingError::NotFound(id)) if id == missing);
}

// ==============================================================================
// RESCHEDULING
// ==============================================================================

#[tokio::test]
async fn reschedule_moves_the_slot_and_preserves_identity() {
    let (service, _store) = scheduling_setup();
    let provider = Uuid::new_v4();

    let appointment = service
        .create_single(create_request(
            Uuid::new_v4(),
            provider,
            utc(2025, 6, 2, 10, 0),
            60,
        ))
        .await
        .unwrap();

    let moved = service
        .reschedule(
            appointment.id,
            RescheduleRequest {
                new_start_time: utc(2025, 6, 3, 14, 0),
                new_duration_minutes: Some(45),
            },
        )
        .await
        .unwrap();

    assert_eq!(moved.id, appointment.id);
    assert_eq!(moved.start_time, utc(2025, 6, 3, 14, 0));
    assert_eq!(moved.duration_minutes, 45);
}

#[tokio::test]
async fn reschedule_into_own_slot_is_not_a_conflict() {
    let (service, _store) = scheduling_setup();
    let provider = Uuid::new_v4();

    let appointment = service
        .create_single(create_request(
            Uuid::new_v4(),
            provider,
            utc(2025, 6, 2, 10, 0),
            60,
        ))
        .await
        .unwrap();

    // Shift by 15 minutes into a window overlapping the prior slot.
    let moved = service
        .reschedule(
            appointment.id,
            RescheduleRequest {
                new_start_time: utc(2025, 6, 2, 10, 15),
                new_duration_minutes: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(moved.start_time, utc(2025, 6, 2, 10, 15));
}

#[tokio::test]
async fn reschedule_into_another_appointment_conflicts() {
    let (service, _store) = scheduling_setup();
    let provider = Uuid::new_v4();

    let blocker = service
        .create_single(create_request(
            Uuid::new_v4(),
            provider,
            utc(2025, 6, 2, 12, 0),
            60,
        ))
        .await
        .unwrap();
    let appointment = service
        .create_single(create_request(
            Uuid::new_v4(),
            provider,
            utc(2025, 6, 2, 10, 0),
            60,
        ))
        .await
        .unwrap();

    let result = service
        .reschedule(
            appointment.id,
            RescheduleRequest {
                new_start_time: utc(2025, 6, 2, 12, 30),
                new_duration_minutes: None,
            },
        )
        .await;

    assert_matches!(
        result,
        Err(SchedulingError::Conflict { conflicts_with: Some(id) }) if id == blocker.id
    );
}

#[tokio::test]
async fn cancelled_appointments_cannot_be_rescheduled() {
    let (service, _store) = scheduling_setup();
    let provider = Uuid::new_v4();

    let appointment = service
        .create_single(create_request(
            Uuid::new_v4(),
            provider,
            utc(2025, 6, 2, 10, 0),
            60,
        ))
        .await
        .unwrap();
    service
        .transition(appointment.id, AppointmentStatus::Cancelled, cancel_payload())
        .await
        .unwrap();

    let result = service
        .reschedule(
            appointment.id,
            RescheduleRequest {
                new_start_time: utc(2025, 6, 3, 10, 0),
                new_duration_minutes: None,
            },
        )
        .await;

    assert_matches!(result, Err(SchedulingError::Validation(_)));
}
