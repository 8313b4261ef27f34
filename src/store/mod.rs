//! Persistence for preferences, observations and alerts.
//!
//! Every operation takes the caller's `Identity` and only sees rows that
//! identity owns. A preference belonging to someone else behaves exactly like
//! a preference that does not exist.
//!
//! - `pg`: `PgStore`. The production backend.
//! - `memory`: `MemoryStore`. Same semantics without a database.

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use thiserror::Error;

use crate::model::{
    Alert, AlertDescriptor, Identity, Observation, Preference, PreferenceDraft, StoredObservation,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] postgres::Error),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid row: {0}")]
    InvalidRow(String),
    #[error("Schema check failed: missing {0}")]
    MissingSchema(String),
}

/// Which alerts to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertFilter {
    pub unread_only: bool,
    pub limit: usize,
}

impl Default for AlertFilter {
    fn default() -> Self {
        Self {
            unread_only: false,
            limit: 50,
        }
    }
}

/// The rows written by one check cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRecord {
    pub observation: StoredObservation,
    pub alerts: Vec<Alert>,
}

pub trait WeatherStore {
    /// The preference that drives evaluation for `owner`, if any.
    fn active_preference(&mut self, owner: &Identity) -> Result<Option<Preference>, StoreError>;

    /// Create the owner's preference, or update it in place if one exists.
    fn save_preference(
        &mut self,
        owner: &Identity,
        draft: &PreferenceDraft,
    ) -> Result<Preference, StoreError>;

    /// Remove a preference together with its observations and alerts.
    /// Returns `false` if the owner has no such preference.
    fn delete_preference(
        &mut self,
        owner: &Identity,
        preference_id: i64,
    ) -> Result<bool, StoreError>;

    /// Persist one observation and the alerts it raised as a single unit.
    /// Either everything is written or nothing is.
    fn record_check(
        &mut self,
        owner: &Identity,
        preference_id: i64,
        observation: &Observation,
        alerts: &[AlertDescriptor],
    ) -> Result<CheckRecord, StoreError>;

    /// Most recently fetched observation for a preference.
    fn latest_observation(
        &mut self,
        owner: &Identity,
        preference_id: i64,
    ) -> Result<Option<StoredObservation>, StoreError>;

    /// Delete one observation. Alerts it raised are kept with their
    /// observation reference cleared.
    fn delete_observation(
        &mut self,
        owner: &Identity,
        observation_id: i64,
    ) -> Result<bool, StoreError>;

    /// Alerts for all of the owner's preferences, newest first.
    fn alerts(&mut self, owner: &Identity, filter: AlertFilter) -> Result<Vec<Alert>, StoreError>;

    /// Returns `false` if the owner has no such alert.
    fn mark_alert_read(&mut self, owner: &Identity, alert_id: i64) -> Result<bool, StoreError>;

    /// Returns the number of alerts that changed from unread to read.
    fn mark_all_read(&mut self, owner: &Identity) -> Result<u64, StoreError>;
}
