// libs/scheduling-cell/src/services/scheduling.rs
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatus, CreateAppointmentRequest,
    CreateRecurringRequest, CreateWaitlistRequest, FreedWindow, RecurringCreateResult,
    RescheduleRequest, SchedulingError, SkippedOccurrence, WaitlistEntry,
};
use crate::services::conflict::{ConflictDetector, ConflictOutcome};
use crate::services::lifecycle::{
    AppointmentLifecycleService, TransitionApplied, TransitionPayload,
};
use crate::services::recurrence::RecurrenceExpander;
use crate::services::waitlist::WaitlistMatcher;
use crate::store::{CommitmentStore, StoreError};

/// Result of a status transition: the updated appointment plus, when the
/// transition freed a slot, the ranked waitlist entries proposed for it.
/// Notification delivery for those proposals is the caller's concern.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub appointment: Appointment,
    pub waitlist_candidates: Vec<WaitlistEntry>,
}

/// Orchestrates expansion, conflict detection and the status state
/// machine against the commitment store. Stateless apart from the store
/// handle, so it can be invoked concurrently by many request handlers.
pub struct SchedulingService<S: CommitmentStore> {
    store: Arc<S>,
    expander: RecurrenceExpander,
    conflict: ConflictDetector,
    lifecycle: AppointmentLifecycleService,
    matcher: WaitlistMatcher,
    store_timeout: Duration,
    retry_attempts: u32,
}

impl<S: CommitmentStore> SchedulingService<S> {
    pub fn new(store: Arc<S>, config: &AppConfig) -> Self {
        Self {
            store,
            expander: RecurrenceExpander::new(),
            conflict: ConflictDetector::new(),
            lifecycle: AppointmentLifecycleService::new(),
            matcher: WaitlistMatcher::new(),
            store_timeout: Duration::from_millis(config.store_timeout_ms),
            retry_attempts: config.conflict_retry_attempts,
        }
    }

    /// Run one store operation under the configured timeout. A timed-out
    /// store reports `Unavailable`; the operation performed no partial
    /// write because every store write is atomic.
    async fn store_call<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .unwrap_or_else(|_| Err(StoreError::Unavailable("commitment store timed out".into())))
    }

    // ==========================================================================
    // CREATION
    // ==========================================================================

    /// Create a single appointment. The provider's commitments are
    /// re-read and re-checked on every optimistic retry, so losing the
    /// version race never books over a competing appointment.
    pub async fn create_single(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, SchedulingError> {
        self.validate_create_request(&request)?;
        info!(
            "Creating appointment for client {} with provider {} at {}",
            request.client_id, request.provider_id, request.start_time
        );

        let appointment = self.appointment_from_request(&request, None)?;
        let start = appointment.start_time;
        let end = appointment.end_time();

        for attempt in 0..=self.retry_attempts {
            let commitments = self
                .store_call(self.store.commitments_in_range(request.provider_id, start, end))
                .await
                .map_err(map_store_error)?;

            if let ConflictOutcome::ConflictsWith(id) = self.conflict.check(
                request.provider_id,
                start,
                end,
                None,
                &commitments.appointments,
            ) {
                warn!(
                    "Appointment conflict for provider {}: candidate {} collides with {}",
                    request.provider_id, start, id
                );
                return Err(SchedulingError::Conflict {
                    conflicts_with: Some(id),
                });
            }

            match self
                .store_call(self.store.insert_appointments(
                    request.provider_id,
                    commitments.version,
                    vec![appointment.clone()],
                ))
                .await
            {
                Ok(mut inserted) => {
                    return inserted.pop().ok_or_else(|| {
                        SchedulingError::Unavailable("store returned an empty batch".into())
                    })
                }
                Err(StoreError::VersionConflict(_)) if attempt < self.retry_attempts => {
                    debug!(
                        "Version race on provider {} (attempt {}), re-checking conflicts",
                        request.provider_id,
                        attempt + 1
                    );
                    continue;
                }
                Err(StoreError::VersionConflict(_)) => {
                    return Err(SchedulingError::Conflict {
                        conflicts_with: None,
                    })
                }
                Err(other) => return Err(map_store_error(other)),
            }
        }

        Err(SchedulingError::Conflict {
            conflicts_with: None,
        })
    }

    /// Expand a recurrence spec and persist every non-conflicting
    /// instance under one recurrence group. Conflict classification is
    /// per occurrence (partial success), but persistence of the accepted
    /// subset is all-or-nothing.
    pub async fn create_recurring(
        &self,
        request: CreateRecurringRequest,
    ) -> Result<RecurringCreateResult, SchedulingError> {
        let template = &request.template;
        self.validate_create_request(template)?;

        let anchor = template.start_time.date_naive();
        let candidates: Vec<_> = self.expander.expand(anchor, &request.recurrence)?.collect();
        if candidates.is_empty() {
            return Ok(RecurringCreateResult {
                created: vec![],
                skipped: vec![],
            });
        }

        let duration = chrono::Duration::minutes(template.duration_minutes as i64);
        let range_start = candidates[0].start_time();
        let range_end = candidates[candidates.len() - 1].start_time() + duration;
        let group_id = Uuid::new_v4();

        info!(
            "Creating recurring series {} for provider {}: {} candidate(s) from {} to {}",
            group_id,
            template.provider_id,
            candidates.len(),
            range_start,
            range_end
        );

        for attempt in 0..=self.retry_attempts {
            let commitments = self
                .store_call(self.store.commitments_in_range(
                    template.provider_id,
                    range_start,
                    range_end,
                ))
                .await
                .map_err(map_store_error)?;

            let mut created: Vec<Appointment> = Vec::new();
            let mut skipped: Vec<SkippedOccurrence> = Vec::new();

            for candidate in &candidates {
                let start = candidate.start_time();
                let end = start + duration;

                // Check against the store, then against the occurrences
                // already accepted in this batch: duplicate slot
                // configurations self-conflict here instead of
                // double-booking the provider.
                let outcome = match self.conflict.check(
                    template.provider_id,
                    start,
                    end,
                    None,
                    &commitments.appointments,
                ) {
                    ConflictOutcome::Bookable => self.conflict.check(
                        template.provider_id,
                        start,
                        end,
                        None,
                        &created,
                    ),
                    conflicting => conflicting,
                };

                match outcome {
                    ConflictOutcome::Bookable => {
                        let mut appointment =
                            self.appointment_from_request(template, Some(group_id))?;
                        appointment.start_time = start;
                        created.push(appointment);
                    }
                    ConflictOutcome::ConflictsWith(id) => skipped.push(SkippedOccurrence {
                        start_time: start,
                        conflicts_with: id,
                    }),
                }
            }

            if created.is_empty() {
                return Ok(RecurringCreateResult {
                    created,
                    skipped,
                });
            }

            match self
                .store_call(self.store.insert_appointments(
                    template.provider_id,
                    commitments.version,
                    created.clone(),
                ))
                .await
            {
                Ok(inserted) => {
                    info!(
                        "Recurring series {}: created {}, skipped {}",
                        group_id,
                        inserted.len(),
                        skipped.len()
                    );
                    return Ok(RecurringCreateResult {
                        created: inserted,
                        skipped,
                    });
                }
                Err(StoreError::VersionConflict(_)) if attempt < self.retry_attempts => {
                    debug!(
                        "Version race on provider {} during recurring create (attempt {})",
                        template.provider_id,
                        attempt + 1
                    );
                    continue;
                }
                Err(StoreError::VersionConflict(_)) => {
                    return Err(SchedulingError::Conflict {
                        conflicts_with: None,
                    })
                }
                Err(other) => return Err(map_store_error(other)),
            }
        }

        Err(SchedulingError::Conflict {
            conflicts_with: None,
        })
    }

    // ==========================================================================
    // TRANSITIONS
    // ==========================================================================

    /// Apply a status transition. Cancellation frees the slot and runs
    /// the waitlist matcher over the freed window; the proposals come
    /// back to the caller, which owns notification and acceptance.
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        payload: TransitionPayload,
    ) -> Result<TransitionOutcome, SchedulingError> {
        for attempt in 0..=self.retry_attempts {
            let current = self
                .store_call(self.store.get_appointment(appointment_id))
                .await
                .map_err(map_store_error)?;

            let commitments = self
                .store_call(self.store.commitments_in_range(
                    current.provider_id,
                    current.start_time,
                    current.end_time(),
                ))
                .await
                .map_err(map_store_error)?;

            let mut updated = current.clone();
            let applied =
                self.lifecycle
                    .apply(&mut updated, new_status, &payload, Utc::now())?;

            if applied == TransitionApplied::NoOp {
                debug!(
                    "Transition to {} for appointment {} is a no-op",
                    new_status, appointment_id
                );
                return Ok(TransitionOutcome {
                    appointment: current,
                    waitlist_candidates: vec![],
                });
            }

            match self
                .store_call(self.store.update_appointment(commitments.version, updated))
                .await
            {
                Ok(persisted) => {
                    let waitlist_candidates = if new_status == AppointmentStatus::Cancelled {
                        self.propose_for_freed_window(&persisted).await?
                    } else {
                        vec![]
                    };
                    info!(
                        "Appointment {} transitioned to {}",
                        appointment_id, new_status
                    );
                    return Ok(TransitionOutcome {
                        appointment: persisted,
                        waitlist_candidates,
                    });
                }
                Err(StoreError::VersionConflict(_)) if attempt < self.retry_attempts => continue,
                Err(StoreError::VersionConflict(_)) => {
                    return Err(SchedulingError::Unavailable(
                        "provider schedule contention, retries exhausted".into(),
                    ))
                }
                Err(other) => return Err(map_store_error(other)),
            }
        }

        Err(SchedulingError::Unavailable(
            "provider schedule contention, retries exhausted".into(),
        ))
    }

    /// Move an appointment to a new slot, preserving its identity. The
    /// conflict check excludes the appointment's own prior slot.
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        request: RescheduleRequest,
    ) -> Result<Appointment, SchedulingError> {
        for attempt in 0..=self.retry_attempts {
            let current = self
                .store_call(self.store.get_appointment(appointment_id))
                .await
                .map_err(map_store_error)?;

            if current.status.is_terminal() {
                return Err(SchedulingError::Validation(format!(
                    "cannot reschedule an appointment in status {}",
                    current.status
                )));
            }

            let duration_minutes = request
                .new_duration_minutes
                .unwrap_or(current.duration_minutes);
            if duration_minutes <= 0 {
                return Err(SchedulingError::Validation(
                    "duration_minutes must be positive".into(),
                ));
            }

            let start = request.new_start_time;
            let end = start + chrono::Duration::minutes(duration_minutes as i64);

            let commitments = self
                .store_call(
                    self.store
                        .commitments_in_range(current.provider_id, start, end),
                )
                .await
                .map_err(map_store_error)?;

            if let ConflictOutcome::ConflictsWith(id) = self.conflict.check(
                current.provider_id,
                start,
                end,
                Some(appointment_id),
                &commitments.appointments,
            ) {
                return Err(SchedulingError::Conflict {
                    conflicts_with: Some(id),
                });
            }

            let mut updated = current;
            updated.start_time = start;
            updated.duration_minutes = duration_minutes;
            updated.updated_at = Utc::now();

            match self
                .store_call(self.store.update_appointment(commitments.version, updated))
                .await
            {
                Ok(persisted) => {
                    info!(
                        "Appointment {} rescheduled to {}",
                        appointment_id, persisted.start_time
                    );
                    return Ok(persisted);
                }
                Err(StoreError::VersionConflict(_)) if attempt < self.retry_attempts => continue,
                Err(StoreError::VersionConflict(_)) => {
                    return Err(SchedulingError::Conflict {
                        conflicts_with: None,
                    })
                }
                Err(other) => return Err(map_store_error(other)),
            }
        }

        Err(SchedulingError::Conflict {
            conflicts_with: None,
        })
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn get_appointment(&self, id: Uuid) -> Result<Appointment, SchedulingError> {
        self.store_call(self.store.get_appointment(id))
            .await
            .map_err(map_store_error)
    }

    pub async fn search_appointments(
        &self,
        query: AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.store_call(self.store.search_appointments(&query))
            .await
            .map_err(map_store_error)
    }

    // ==========================================================================
    // WAITLIST
    // ==========================================================================

    pub async fn create_waitlist_entry(
        &self,
        request: CreateWaitlistRequest,
    ) -> Result<WaitlistEntry, SchedulingError> {
        let priority = request.priority.unwrap_or(1);
        if !(1..=5).contains(&priority) {
            return Err(SchedulingError::Validation(
                "priority must be between 1 and 5".into(),
            ));
        }
        if let (Some(start), Some(end)) =
            (request.preferred_time_start, request.preferred_time_end)
        {
            if end < start {
                return Err(SchedulingError::Validation(
                    "preferred_time_end precedes preferred_time_start".into(),
                ));
            }
        }

        let entry = WaitlistEntry {
            id: Uuid::new_v4(),
            client_id: request.client_id,
            provider_id: request.provider_id,
            preferred_date: request.preferred_date,
            preferred_time_start: request.preferred_time_start,
            preferred_time_end: request.preferred_time_end,
            appointment_type: request.appointment_type,
            notes: request.notes,
            priority,
            created_at: Utc::now(),
            is_fulfilled: false,
        };

        self.store_call(self.store.insert_waitlist_entry(entry))
            .await
            .map_err(map_store_error)
    }

    /// Ranked candidates for an arbitrary freed window, as consumed by
    /// the external notification workflow.
    pub async fn waitlist_candidates(
        &self,
        provider_id: Uuid,
        freed: FreedWindow,
    ) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let entries = self
            .store_call(self.store.waitlist_for_provider(provider_id, freed.date))
            .await
            .map_err(map_store_error)?;
        Ok(self.matcher.find_candidates(provider_id, &freed, entries))
    }

    /// All unfulfilled entries, most urgent first.
    pub async fn unfulfilled_waitlist(&self) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let mut entries = self
            .store_call(self.store.unfulfilled_waitlist())
            .await
            .map_err(map_store_error)?;
        entries.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(entries)
    }

    /// Mark a waitlist entry fulfilled after the notification workflow
    /// booked the opening. The matcher owns the flag.
    pub async fn fulfill_waitlist_entry(&self, id: Uuid) -> Result<WaitlistEntry, SchedulingError> {
        let mut entry = self
            .store_call(self.store.get_waitlist_entry(id))
            .await
            .map_err(map_store_error)?;
        self.matcher.fulfill(&mut entry);
        self.store_call(self.store.update_waitlist_entry(entry))
            .await
            .map_err(map_store_error)
    }

    // ==========================================================================
    // PRIVATE HELPERS
    // ==========================================================================

    async fn propose_for_freed_window(
        &self,
        cancelled: &Appointment,
    ) -> Result<Vec<WaitlistEntry>, SchedulingError> {
        let freed = FreedWindow::from_appointment(cancelled);
        let entries = self
            .store_call(
                self.store
                    .waitlist_for_provider(cancelled.provider_id, freed.date),
            )
            .await
            .map_err(map_store_error)?;
        let candidates = self
            .matcher
            .find_candidates(cancelled.provider_id, &freed, entries);
        if !candidates.is_empty() {
            info!(
                "Freed window {} {} for provider {}: proposing {} waitlist candidate(s)",
                freed.date,
                freed.start_time,
                cancelled.provider_id,
                candidates.len()
            );
        }
        Ok(candidates)
    }

    fn validate_create_request(
        &self,
        request: &CreateAppointmentRequest,
    ) -> Result<(), SchedulingError> {
        if request.duration_minutes <= 0 {
            return Err(SchedulingError::Validation(
                "duration_minutes must be positive".into(),
            ));
        }
        if let Some(status) = &request.initial_status {
            self.lifecycle.validate_initial_status(status)?;
        }
        Ok(())
    }

    fn appointment_from_request(
        &self,
        request: &CreateAppointmentRequest,
        recurrence_group_id: Option<Uuid>,
    ) -> Result<Appointment, SchedulingError> {
        let now = Utc::now();
        Ok(Appointment {
            id: Uuid::new_v4(),
            client_id: request.client_id,
            provider_id: request.provider_id,
            appointment_type: request.appointment_type.clone(),
            cpt_code: request.cpt_code.clone(),
            title: request.title.clone(),
            description: request.description.clone(),
            start_time: request.start_time,
            duration_minutes: request.duration_minutes,
            status: request.initial_status.unwrap_or(AppointmentStatus::Pending),
            location: request.location.clone(),
            room_number: request.room_number.clone(),
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            no_show_reason: None,
            checked_in_at: None,
            completed_at: None,
            recurrence_group_id,
            created_by: request.created_by,
            created_at: now,
            updated_at: now,
        })
    }
}

fn map_store_error(err: StoreError) -> SchedulingError {
    match err {
        StoreError::NotFound(id) => SchedulingError::NotFound(id),
        StoreError::Unavailable(msg) => SchedulingError::Unavailable(msg),
        StoreError::VersionConflict(_) => SchedulingError::Conflict {
            conflicts_with: None,
        },
    }
}
