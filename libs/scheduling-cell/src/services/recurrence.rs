// libs/scheduling-cell/src/services/recurrence.rs
//
// Expansion of a recurrence spec into concrete candidate instants.
// Pure calendar arithmetic, no I/O. Month and year stepping works on
// (year, month, day) triples rather than day counts so that months of
// different lengths never cause drift; a month that lacks the requested
// day-of-month is skipped outright, never clamped.
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use tracing::debug;

use crate::models::{RecurrencePattern, RecurrenceSpec, SchedulingError};

/// One concrete date+time produced by expansion, not yet conflict-checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateInstant {
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// Declaration index of the slot that produced this candidate; the
    /// final tie-break key, so expansion order is reproducible.
    pub slot_index: usize,
}

impl CandidateInstant {
    pub fn start_time(&self) -> DateTime<Utc> {
        self.date.and_time(self.time).and_utc()
    }
}

pub struct RecurrenceExpander;

impl RecurrenceExpander {
    pub fn new() -> Self {
        Self
    }

    /// Expand `spec` into a lazy, finite, restartable candidate sequence
    /// anchored at `anchor_date`. The sequence is strictly increasing by
    /// (date, time, slot declaration order) and bounded by the spec's
    /// inclusive end date. Duplicate slot configurations intentionally
    /// produce duplicate candidates; deduplication belongs to the caller.
    pub fn expand(
        &self,
        anchor_date: NaiveDate,
        spec: &RecurrenceSpec,
    ) -> Result<CandidateSequence, SchedulingError> {
        spec.validate()?;
        let end_date = spec
            .end_date
            .ok_or_else(|| SchedulingError::Validation("recurrence requires an end_date".into()))?;

        let mut cursors = Vec::with_capacity(spec.time_slots.len());
        for (slot_index, slot) in spec.time_slots.iter().enumerate() {
            let step = match spec.pattern {
                RecurrencePattern::Daily => PatternStep::Daily,
                RecurrencePattern::Weekly => PatternStep::Weekly {
                    // Validated: 0 = Sunday .. 6 = Saturday.
                    day_of_week: u32::from(slot.day_of_week.unwrap_or(0)),
                },
                RecurrencePattern::Monthly => PatternStep::Monthly {
                    day_of_month: u32::from(slot.day_of_month.unwrap_or(1)),
                },
                RecurrencePattern::Yearly => PatternStep::Yearly {
                    month: u32::from(slot.month.unwrap_or(1)),
                    day_of_month: u32::from(slot.day_of_month.unwrap_or(1)),
                },
            };
            cursors.push(SlotCursor::new(slot_index, slot.time, step, anchor_date, end_date));
        }

        debug!(
            "Expanding {} recurrence with {} slot(s) from {} through {}",
            spec.pattern,
            cursors.len(),
            anchor_date,
            end_date
        );

        Ok(CandidateSequence {
            cursors,
            business_day_only: spec.is_business_day_only,
        })
    }
}

/// Lazy merge of the per-slot calendar cursors. `Clone` restarts the
/// sequence from its current position, so callers can iterate twice.
#[derive(Debug, Clone)]
pub struct CandidateSequence {
    cursors: Vec<SlotCursor>,
    business_day_only: bool,
}

impl Iterator for CandidateSequence {
    type Item = CandidateInstant;

    fn next(&mut self) -> Option<CandidateInstant> {
        loop {
            // Pick the earliest pending (date, time, slot_index) across cursors.
            let next_idx = self
                .cursors
                .iter()
                .enumerate()
                .filter_map(|(i, c)| c.next_date.map(|d| (i, d, c.time, c.slot_index)))
                .min_by_key(|&(_, date, time, slot_index)| (date, time, slot_index))
                .map(|(i, _, _, _)| i)?;

            let cursor = &mut self.cursors[next_idx];
            let candidate = CandidateInstant {
                date: cursor.next_date?,
                time: cursor.time,
                slot_index: cursor.slot_index,
            };
            cursor.advance();

            if self.business_day_only && is_weekend(candidate.date) {
                // Weekend instances are dropped, never shifted to a weekday.
                continue;
            }

            return Some(candidate);
        }
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[derive(Debug, Clone)]
enum PatternStep {
    Daily,
    Weekly { day_of_week: u32 },
    Monthly { day_of_month: u32 },
    Yearly { month: u32, day_of_month: u32 },
}

#[derive(Debug, Clone)]
struct SlotCursor {
    slot_index: usize,
    time: NaiveTime,
    step: PatternStep,
    end_date: NaiveDate,
    next_date: Option<NaiveDate>,
}

impl SlotCursor {
    fn new(
        slot_index: usize,
        time: NaiveTime,
        step: PatternStep,
        anchor: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        let first = if anchor > end_date {
            None
        } else {
            match step {
                PatternStep::Daily => Some(anchor),
                PatternStep::Weekly { day_of_week } => {
                    let offset =
                        (day_of_week + 7 - anchor.weekday().num_days_from_sunday()) % 7;
                    Some(anchor + Duration::days(i64::from(offset)))
                }
                PatternStep::Monthly { day_of_month } => {
                    first_monthly_occurrence(anchor, end_date, day_of_month)
                }
                PatternStep::Yearly { month, day_of_month } => {
                    first_yearly_occurrence(anchor, end_date, month, day_of_month)
                }
            }
        };

        let mut cursor = Self {
            slot_index,
            time,
            step,
            end_date,
            next_date: first,
        };
        cursor.clamp_to_end();
        cursor
    }

    fn advance(&mut self) {
        let Some(current) = self.next_date else {
            return;
        };

        self.next_date = match self.step {
            PatternStep::Daily => current.succ_opt(),
            PatternStep::Weekly { .. } => current.checked_add_days(chrono::Days::new(7)),
            PatternStep::Monthly { day_of_month } => {
                next_month_with_day(current.year(), current.month(), day_of_month, self.end_date)
            }
            PatternStep::Yearly { month, day_of_month } => {
                next_year_with_date(current.year(), month, day_of_month, self.end_date)
            }
        };
        self.clamp_to_end();
    }

    fn clamp_to_end(&mut self) {
        if matches!(self.next_date, Some(d) if d > self.end_date) {
            self.next_date = None;
        }
    }
}

/// First month on/after `anchor` that contains `day_of_month`, as a date
/// on/after the anchor. Months missing the day (31st in February) are
/// skipped.
fn first_monthly_occurrence(
    anchor: NaiveDate,
    end_date: NaiveDate,
    day_of_month: u32,
) -> Option<NaiveDate> {
    let (mut year, mut month) = (anchor.year(), anchor.month());
    loop {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day_of_month) {
            if date >= anchor {
                return Some(date);
            }
            if date > end_date {
                return None;
            }
        }
        (year, month) = add_month(year, month);
        // Stepping past the bound means no month in range carries the day.
        if NaiveDate::from_ymd_opt(year, month, 1)? > end_date {
            return None;
        }
    }
}

/// Next calendar month after (year, month) containing `day_of_month`.
fn next_month_with_day(
    year: i32,
    month: u32,
    day_of_month: u32,
    end_date: NaiveDate,
) -> Option<NaiveDate> {
    let (mut year, mut month) = add_month(year, month);
    loop {
        if NaiveDate::from_ymd_opt(year, month, 1)? > end_date {
            return None;
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day_of_month) {
            return Some(date);
        }
        (year, month) = add_month(year, month);
    }
}

/// First (month, day) occurrence on/after `anchor`. Invalid dates in a
/// given year (Feb 29 off leap years) skip that year.
fn first_yearly_occurrence(
    anchor: NaiveDate,
    end_date: NaiveDate,
    month: u32,
    day_of_month: u32,
) -> Option<NaiveDate> {
    let mut year = anchor.year();
    loop {
        if year > end_date.year() {
            return None;
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day_of_month) {
            if date >= anchor {
                return Some(date);
            }
        }
        year += 1;
    }
}

fn next_year_with_date(
    year: i32,
    month: u32,
    day_of_month: u32,
    end_date: NaiveDate,
) -> Option<NaiveDate> {
    let mut year = year + 1;
    loop {
        if year > end_date.year() {
            return None;
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day_of_month) {
            return Some(date);
        }
        year += 1;
    }
}

fn add_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}
