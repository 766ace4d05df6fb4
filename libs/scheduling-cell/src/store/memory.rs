// libs/scheduling-cell/src/store/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentSearchQuery, WaitlistEntry};
use crate::store::{CommitmentStore, ProviderCommitments, StoreError};

/// In-memory commitment store. A single `RwLock` guards all state, and
/// writes bump a per-provider version counter, giving the optimistic
/// concurrency semantics the trait demands without an external database.
#[derive(Default)]
pub struct InMemoryCommitmentStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    appointments: HashMap<Uuid, Appointment>,
    provider_versions: HashMap<Uuid, u64>,
    waitlist: HashMap<Uuid, WaitlistEntry>,
}

impl InMemoryCommitmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn provider_version(&self, provider_id: Uuid) -> u64 {
        self.provider_versions.get(&provider_id).copied().unwrap_or(0)
    }

    fn bump_provider_version(&mut self, provider_id: Uuid) {
        *self.provider_versions.entry(provider_id).or_insert(0) += 1;
    }
}

#[async_trait]
impl CommitmentStore for InMemoryCommitmentStore {
    async fn commitments_in_range(
        &self,
        provider_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ProviderCommitments, StoreError> {
        let inner = self.inner.read().await;
        let mut appointments: Vec<Appointment> = inner
            .appointments
            .values()
            .filter(|a| a.provider_id == provider_id)
            .filter(|a| a.start_time < to && from < a.end_time())
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.start_time);

        Ok(ProviderCommitments {
            version: inner.provider_version(provider_id),
            appointments,
        })
    }

    async fn insert_appointments(
        &self,
        provider_id: Uuid,
        expected_version: u64,
        batch: Vec<Appointment>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.provider_version(provider_id) != expected_version {
            return Err(StoreError::VersionConflict(provider_id));
        }

        for appointment in &batch {
            inner.appointments.insert(appointment.id, appointment.clone());
        }
        inner.bump_provider_version(provider_id);

        Ok(batch)
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Appointment, StoreError> {
        let inner = self.inner.read().await;
        inner
            .appointments
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn update_appointment(
        &self,
        expected_version: u64,
        appointment: Appointment,
    ) -> Result<Appointment, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.appointments.contains_key(&appointment.id) {
            return Err(StoreError::NotFound(appointment.id));
        }
        if inner.provider_version(appointment.provider_id) != expected_version {
            return Err(StoreError::VersionConflict(appointment.provider_id));
        }

        inner.appointments.insert(appointment.id, appointment.clone());
        inner.bump_provider_version(appointment.provider_id);

        Ok(appointment)
    }

    async fn search_appointments(
        &self,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, StoreError> {
        let inner = self.inner.read().await;
        let mut results: Vec<Appointment> = inner
            .appointments
            .values()
            .filter(|a| query.client_id.is_none_or(|id| a.client_id == id))
            .filter(|a| query.provider_id.is_none_or(|id| a.provider_id == id))
            .filter(|a| query.status.is_none_or(|s| a.status == s))
            .filter(|a| {
                query
                    .appointment_type
                    .as_ref()
                    .is_none_or(|t| a.appointment_type == *t)
            })
            .filter(|a| query.from_date.is_none_or(|d| a.start_time >= d))
            .filter(|a| query.to_date.is_none_or(|d| a.start_time <= d))
            .cloned()
            .collect();
        results.sort_by_key(|a| a.start_time);

        Ok(results)
    }

    async fn waitlist_for_provider(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<WaitlistEntry>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .waitlist
            .values()
            .filter(|e| e.provider_id == provider_id && e.preferred_date == date)
            .cloned()
            .collect())
    }

    async fn unfulfilled_waitlist(&self) -> Result<Vec<WaitlistEntry>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .waitlist
            .values()
            .filter(|e| !e.is_fulfilled)
            .cloned()
            .collect())
    }

    async fn get_waitlist_entry(&self, id: Uuid) -> Result<WaitlistEntry, StoreError> {
        let inner = self.inner.read().await;
        inner
            .waitlist
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert_waitlist_entry(
        &self,
        entry: WaitlistEntry,
    ) -> Result<WaitlistEntry, StoreError> {
        let mut inner = self.inner.write().await;
        inner.waitlist.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn update_waitlist_entry(
        &self,
        entry: WaitlistEntry,
    ) -> Result<WaitlistEntry, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.waitlist.contains_key(&entry.id) {
            return Err(StoreError::NotFound(entry.id));
        }
        inner.waitlist.insert(entry.id, entry.clone());
        Ok(entry)
    }
}
