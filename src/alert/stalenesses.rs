/// Observation staleness detection.
///
/// The dashboard shows the most recent stored observation when it is fresh
/// enough and triggers a new fetch otherwise. This module answers the
/// "fresh enough" question.
///
/// # Clock injection
/// `is_stale_at` accepts a `now: DateTime<Utc>` parameter rather than calling
/// `Utc::now()` internally, so tests stay deterministic without mocking.

use chrono::{DateTime, Utc};

use crate::model::Observation;

// ---------------------------------------------------------------------------
// Staleness check
// ---------------------------------------------------------------------------

/// Returns `true` if the observation was fetched more than `max_age_minutes`
/// before `now`.
///
/// Staleness is strictly greater than the threshold:
///   age > max_age_minutes  →  stale
///   age == max_age_minutes →  not stale
///
/// An observation timestamped after `now` (clock skew between hosts) is
/// treated as fresh.
pub fn is_stale_at(observation: &Observation, max_age_minutes: u64, now: DateTime<Utc>) -> bool {
    let age_minutes = (now - observation.fetched_at).num_minutes();
    age_minutes > 0 && age_minutes as u64 > max_age_minutes
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
