pub mod conflict;
pub mod lifecycle;
pub mod recurrence;
pub mod scheduling;
pub mod waitlist;
