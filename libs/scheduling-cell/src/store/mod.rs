// libs/scheduling-cell/src/store/mod.rs
//
// The commitment store is the single shared resource of the scheduling
// core. Every write is version-checked per provider so that the
// read-check-write sequence behaves like a serializable transaction:
// two concurrent requests cannot both pass a conflict check against a
// stale view and double-book the slot.
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentSearchQuery, WaitlistEntry};

pub use memory::InMemoryCommitmentStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stale provider version for {0}")]
    VersionConflict(Uuid),

    #[error("record {0} not found")]
    NotFound(Uuid),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A provider's commitments in a range, tagged with the version token
/// that must accompany any subsequent write for that provider.
#[derive(Debug, Clone)]
pub struct ProviderCommitments {
    pub version: u64,
    pub appointments: Vec<Appointment>,
}

#[async_trait]
pub trait CommitmentStore: Send + Sync {
    /// Appointments of one provider whose `[start, end)` interval
    /// overlaps `[from, to)`, ordered by start time, plus the provider's
    /// current version.
    async fn commitments_in_range(
        &self,
        provider_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ProviderCommitments, StoreError>;

    /// Atomically insert a batch for one provider. Fails with
    /// `VersionConflict` when the provider's schedule changed since
    /// `expected_version` was read; nothing is written in that case.
    async fn insert_appointments(
        &self,
        provider_id: Uuid,
        expected_version: u64,
        batch: Vec<Appointment>,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn get_appointment(&self, id: Uuid) -> Result<Appointment, StoreError>;

    /// Version-checked replacement of a single appointment.
    async fn update_appointment(
        &self,
        expected_version: u64,
        appointment: Appointment,
    ) -> Result<Appointment, StoreError>;

    async fn search_appointments(
        &self,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn waitlist_for_provider(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<WaitlistEntry>, StoreError>;

    async fn unfulfilled_waitlist(&self) -> Result<Vec<WaitlistEntry>, StoreError>;

    async fn get_waitlist_entry(&self, id: Uuid) -> Result<WaitlistEntry, StoreError>;

    async fn insert_waitlist_entry(&self, entry: WaitlistEntry)
        -> Result<WaitlistEntry, StoreError>;

    async fn update_waitlist_entry(
        &self,
        entry: WaitlistEntry,
    ) -> Result<WaitlistEntry, StoreError>;
}
