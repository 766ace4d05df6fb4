// libs/scheduling-cell/src/services/waitlist.rs
use tracing::debug;
use uuid::Uuid;

use crate::models::{FreedWindow, WaitlistEntry};

/// Matches waitlist entries against freed provider time. Matching only
/// proposes candidates; acceptance and booking belong to the caller's
/// notification workflow, which calls back through `fulfill`.
pub struct WaitlistMatcher;

impl WaitlistMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Rank the entries that could take the freed window: same provider,
    /// unfulfilled, preferred date matching the freed date, and the
    /// window start inside the entry's preferred time range when one is
    /// given. Ordering is priority descending, then created_at ascending,
    /// then id — a strict total order, so the output is reproducible.
    pub fn find_candidates(
        &self,
        provider_id: Uuid,
        freed: &FreedWindow,
        entries: Vec<WaitlistEntry>,
    ) -> Vec<WaitlistEntry> {
        let mut matched: Vec<WaitlistEntry> = entries
            .into_iter()
            .filter(|entry| {
                entry.provider_id == provider_id
                    && !entry.is_fulfilled
                    && entry.preferred_date == freed.date
                    && Self::time_matches(entry, freed)
            })
            .collect();

        matched.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });

        debug!(
            "Waitlist match for provider {} on {}: {} candidate(s)",
            provider_id,
            freed.date,
            matched.len()
        );

        matched
    }

    fn time_matches(entry: &WaitlistEntry, freed: &FreedWindow) -> bool {
        match (entry.preferred_time_start, entry.preferred_time_end) {
            (Some(start), Some(end)) => freed.start_time >= start && freed.start_time <= end,
            (Some(start), None) => freed.start_time >= start,
            (None, Some(end)) => freed.start_time <= end,
            // No preference means any time that day qualifies.
            (None, None) => true,
        }
    }

    /// Mark an entry fulfilled. The matcher is the only owner of this
    /// flag; the appointment lifecycle never touches it.
    pub fn fulfill(&self, entry: &mut WaitlistEntry) {
        entry.is_fulfilled = true;
    }
}
