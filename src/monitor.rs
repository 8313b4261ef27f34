//! The check cycle: the request flow around the alert evaluator.
//!
//! One cycle is one unit of work: resolve the caller, load their preference,
//! fetch the current weather, evaluate it, and persist the observation with
//! its alerts. Any failure aborts the cycle before anything is written. There
//! are no retries; watch mode simply tries again on the next tick.

use chrono::{DateTime, Utc};
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::alert::stalenesses::is_stale_at;
use crate::alert::thresholds::evaluate;
use crate::analysis::{summarize, AlertSummary};
use crate::config::ConfigError;
use crate::ingest::WeatherProvider;
use crate::logging::{self, DataSource};
use crate::model::{Alert, Identity, Preference, StoredObservation, WeatherError};
use crate::store::{AlertFilter, StoreError, WeatherStore};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("missing or invalid credentials")]
    Unauthorized,
    #[error("no weather preference has been set up for this user")]
    PreferenceNotFound,
    #[error("preference '{0}' has no coordinates")]
    MissingCoordinates(String),
    #[error("weather provider request failed: {0}")]
    Provider(#[from] WeatherError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// What one successful cycle wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub preference: Preference,
    pub observation: StoredObservation,
    pub alerts: Vec<Alert>,
}

/// Resolve the caller, rejecting a missing identity.
fn require_identity(identity: Option<&Identity>) -> Result<&Identity, MonitorError> {
    identity.ok_or(MonitorError::Unauthorized)
}

fn require_preference<S: WeatherStore>(
    store: &mut S,
    owner: &Identity,
) -> Result<Preference, MonitorError> {
    store
        .active_preference(owner)?
        .ok_or(MonitorError::PreferenceNotFound)
}

/// Run one check cycle for the caller.
///
/// When the preference has alerts disabled the observation is still
/// recorded, but no alerts are raised.
pub fn run_check<S, P>(
    store: &mut S,
    provider: &P,
    identity: Option<&Identity>,
) -> Result<CheckOutcome, MonitorError>
where
    S: WeatherStore,
    P: WeatherProvider,
{
    let owner = require_identity(identity)?;
    let preference = require_preference(store, owner)?;
    let location = preference.location.name.clone();

    let (latitude, longitude) = preference
        .location
        .coordinates()
        .ok_or_else(|| MonitorError::MissingCoordinates(location.clone()))?;

    let observation = provider
        .current_weather(latitude, longitude)
        .map_err(|e| {
            logging::log_provider_failure(&location, "current weather", &e);
            e
        })?;

    let descriptors = if preference.alerts_enabled {
        evaluate(&observation, &preference.thresholds)
    } else {
        logging::debug(
            DataSource::Evaluator,
            Some(&location),
            "Alerts disabled, skipping evaluation",
        );
        Vec::new()
    };

    let record = store
        .record_check(owner, preference.id, &observation, &descriptors)
        .map_err(|e| {
            let message = format!("record check failed: {}", e);
            logging::error(DataSource::Database, Some(&location), &message);
            e
        })?;

    logging::log_check_summary(&location, observation.temperature, record.alerts.len());

    Ok(CheckOutcome {
        preference,
        observation: record.observation,
        alerts: record.alerts,
    })
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Everything the dashboard shows.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub preference: Preference,
    pub observation: StoredObservation,
    /// Whether `observation` was fetched for this snapshot.
    pub refreshed: bool,
    pub unread_alerts: Vec<Alert>,
    pub summary: AlertSummary,
}

/// Build a dashboard snapshot, fetching new weather only when there is no
/// stored observation or the latest one is older than `max_age_minutes`.
/// `connect` is called only when a fetch is needed.
pub fn dashboard<S, P, C>(
    store: &mut S,
    connect: C,
    identity: Option<&Identity>,
    max_age_minutes: u64,
    now: DateTime<Utc>,
) -> Result<Dashboard, MonitorError>
where
    S: WeatherStore,
    P: WeatherProvider,
    C: FnOnce() -> Result<P, MonitorError>,
{
    let owner = require_identity(identity)?;
    let preference = require_preference(store, owner)?;

    let cached = store
        .latest_observation(owner, preference.id)?
        .filter(|stored| !is_stale_at(&stored.observation, max_age_minutes, now));

    let (preference, observation, refreshed) = match cached {
        Some(stored) => (preference, stored, false),
        None => {
            let provider = connect()?;
            let outcome = run_check(store, &provider, Some(owner))?;
            (outcome.preference, outcome.observation, true)
        }
    };

    let alerts = store.alerts(
        owner,
        AlertFilter {
            unread_only: false,
            limit: usize::MAX,
        },
    )?;
    let summary = summarize(&alerts);
    let unread_alerts = alerts.into_iter().filter(|a| !a.is_read).collect();

    Ok(Dashboard {
        preference,
        observation,
        refreshed,
        unread_alerts,
        summary,
    })
}

// ---------------------------------------------------------------------------
// Watch mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WatchStats {
    pub cycles: usize,
    pub successful: usize,
    pub failed: usize,
    pub alerts_raised: usize,
}

/// Run check cycles every `interval`. A failed cycle is logged and the loop
/// moves on. Stops after `max_cycles` cycles when given, otherwise runs until
/// the process is stopped. `on_cycle` sees every outcome as it happens.
pub fn watch<S, P, F>(
    store: &mut S,
    provider: &P,
    identity: &Identity,
    interval: Duration,
    max_cycles: Option<usize>,
    mut on_cycle: F,
) -> WatchStats
where
    S: WeatherStore,
    P: WeatherProvider,
    F: FnMut(&Result<CheckOutcome, MonitorError>),
{
    let mut stats = WatchStats::default();

    loop {
        if max_cycles.is_some_and(|max| stats.cycles >= max) {
            break;
        }
        if stats.cycles > 0 {
            thread::sleep(interval);
        }

        let result = run_check(store, provider, Some(identity));
        stats.cycles += 1;
        match &result {
            Ok(outcome) => {
                stats.successful += 1;
                stats.alerts_raised += outcome.alerts.len();
            }
            Err(e) => {
                stats.failed += 1;
                logging::warn(DataSource::System, None, &format!("check cycle failed: {}", e));
            }
        }
        on_cycle(&result);
    }

    logging::log_watch_summary(stats.cycles, stats.successful, stats.failed);
    stats
}
