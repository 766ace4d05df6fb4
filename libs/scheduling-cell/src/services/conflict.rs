// libs/scheduling-cell/src/services/conflict.rs
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::models::Appointment;

/// Classification of one candidate slot against existing commitments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictOutcome {
    Bookable,
    ConflictsWith(Uuid),
}

impl ConflictOutcome {
    pub fn is_bookable(&self) -> bool {
        matches!(self, ConflictOutcome::Bookable)
    }
}

/// Pure overlap detection. Operates only on the commitments handed in,
/// no I/O of its own.
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn new() -> Self {
        Self
    }

    /// Check a candidate `[start, end)` window for the given provider
    /// against existing commitments. Cancelled and no-show appointments
    /// free their slot; appointments of other providers never conflict
    /// (cross-provider double booking of a client is legitimate); and
    /// back-to-back appointments touch without overlapping because the
    /// intervals are half-open.
    pub fn check(
        &self,
        provider_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
        commitments: &[Appointment],
    ) -> ConflictOutcome {
        for existing in commitments {
            if existing.provider_id != provider_id {
                continue;
            }
            if exclude_appointment_id == Some(existing.id) {
                continue;
            }
            if !existing.status.occupies_slot() {
                continue;
            }
            if intervals_overlap(start, end, existing.start_time, existing.end_time()) {
                debug!(
                    "Candidate {}..{} conflicts with appointment {} for provider {}",
                    start, end, existing.id, provider_id
                );
                return ConflictOutcome::ConflictsWith(existing.id);
            }
        }

        ConflictOutcome::Bookable
    }
}

/// Half-open interval overlap: `[s1, e1)` and `[s2, e2)` overlap iff
/// s1 < e2 and s2 < e1.
fn intervals_overlap(
    start1: DateTime<Utc>,
    end1: DateTime<Utc>,
    start2: DateTime<Utc>,
    end2: DateTime<Utc>,
) -> bool {
    start1 < end2 && start2 < end1
}
