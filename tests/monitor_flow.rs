/// Check-cycle tests against the in-memory store and a canned provider.
///
/// Tests verify:
/// 1. Rejections: missing identity, missing preference, missing coordinates
/// 2. Provider failures abort the cycle with nothing persisted
/// 3. A successful cycle persists the observation and its alerts
/// 4. Dashboard snapshots reuse fresh observations and refetch stale ones,
///    and count every stored alert
/// 5. Watch mode keeps going after a failed cycle and honors its cycle bound
///
/// No network or database access. Run with: cargo test --test monitor_flow

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use wxmon_service::config::ConfigError;
use wxmon_service::ingest::WeatherProvider;
use wxmon_service::model::{
    AlertThresholds, AlertType, Identity, Location, Observation, PreferenceDraft, Severity,
    WeatherError,
};
use wxmon_service::monitor::{self, MonitorError};
use wxmon_service::store::{AlertFilter, MemoryStore, WeatherStore};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// Hands out queued responses in order and counts calls.
struct CannedProvider {
    responses: RefCell<VecDeque<Result<Observation, WeatherError>>>,
    calls: Cell<usize>,
}

impl CannedProvider {
    fn new(responses: Vec<Result<Observation, WeatherError>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            calls: Cell::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl WeatherProvider for CannedProvider {
    fn current_weather(
        &self,
        _latitude: f64,
        _longitude: f64,
    ) -> Result<Observation, WeatherError> {
        self.calls.set(self.calls.get() + 1);
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(WeatherError::Request("no canned response left".to_string())))
    }
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap()
}

fn reading(temperature: f64, fetched_at: DateTime<Utc>) -> Observation {
    Observation {
        location_name: "Seoul".to_string(),
        temperature,
        feels_like: temperature,
        humidity: 55.0,
        wind_speed: 3.0,
        wind_direction: 200.0,
        pressure: 1004.0,
        condition: "Clear".to_string(),
        icon: "01d".to_string(),
        fetched_at,
    }
}

fn user() -> Identity {
    Identity::parse("user-1").unwrap()
}

fn seoul(alerts_enabled: bool) -> PreferenceDraft {
    PreferenceDraft {
        location: Location {
            name: "Home".to_string(),
            latitude: Some(37.5665),
            longitude: Some(126.978),
        },
        thresholds: AlertThresholds::default(),
        alerts_enabled,
    }
}

fn store_with_preference(draft: &PreferenceDraft) -> MemoryStore {
    let mut store = MemoryStore::new();
    store.save_preference(&user(), draft).unwrap();
    store
}

// ---------------------------------------------------------------------------
// 1. Rejections
// ---------------------------------------------------------------------------

#[test]
fn test_missing_identity_is_rejected_before_any_fetch() {
    let mut store = store_with_preference(&seoul(true));
    let provider = CannedProvider::new(vec![Ok(reading(40.0, noon()))]);

    let err = monitor::run_check(&mut store, &provider, None).unwrap_err();

    assert!(matches!(err, MonitorError::Unauthorized));
    assert_eq!(provider.calls(), 0);
}

#[test]
fn test_user_without_preference_is_rejected() {
    let mut store = MemoryStore::new();
    let provider = CannedProvider::new(vec![]);

    let err = monitor::run_check(&mut store, &provider, Some(&user())).unwrap_err();
    assert!(matches!(err, MonitorError::PreferenceNotFound));
}

#[test]
fn test_preference_without_coordinates_is_rejected() {
    let mut draft = seoul(true);
    draft.location.longitude = None;
    let mut store = store_with_preference(&draft);
    let provider = CannedProvider::new(vec![Ok(reading(20.0, noon()))]);

    let err = monitor::run_check(&mut store, &provider, Some(&user())).unwrap_err();

    assert!(matches!(err, MonitorError::MissingCoordinates(ref name) if name == "Home"));
    assert_eq!(provider.calls(), 0);
}

// ---------------------------------------------------------------------------
// 2. Provider failures
// ---------------------------------------------------------------------------

#[test]
fn test_provider_failure_persists_nothing() {
    let mut store = store_with_preference(&seoul(true));
    let provider = CannedProvider::new(vec![Err(WeatherError::HttpStatus(503))]);

    let err = monitor::run_check(&mut store, &provider, Some(&user())).unwrap_err();

    assert!(matches!(err, MonitorError::Provider(WeatherError::HttpStatus(503))));
    assert_eq!(store.observation_count(), 0);
    assert_eq!(store.alert_count(), 0);
}

// ---------------------------------------------------------------------------
// 3. Successful cycles
// ---------------------------------------------------------------------------

#[test]
fn test_hot_reading_persists_observation_and_extreme_alert() {
    let mut store = store_with_preference(&seoul(true));
    let provider = CannedProvider::new(vec![Ok(reading(40.0, noon()))]);

    let outcome = monitor::run_check(&mut store, &provider, Some(&user())).unwrap();

    assert_eq!(outcome.alerts.len(), 1);
    assert_eq!(outcome.alerts[0].alert_type, AlertType::HighTemp);
    assert_eq!(outcome.alerts[0].severity, Severity::Extreme);
    assert_eq!(outcome.alerts[0].weather_data_id, Some(outcome.observation.id));
    assert_eq!(outcome.observation.preference_id, outcome.preference.id);

    let stored = store
        .alerts(&user(), AlertFilter::default())
        .unwrap();
    assert_eq!(stored, outcome.alerts);
}

#[test]
fn test_mild_reading_persists_observation_without_alerts() {
    let mut store = store_with_preference(&seoul(true));
    let provider = CannedProvider::new(vec![Ok(reading(22.0, noon()))]);

    let outcome = monitor::run_check(&mut store, &provider, Some(&user())).unwrap();

    assert!(outcome.alerts.is_empty());
    assert_eq!(store.observation_count(), 1);
}

#[test]
fn test_disabled_preference_records_weather_but_raises_no_alerts() {
    let mut store = store_with_preference(&seoul(false));
    let provider = CannedProvider::new(vec![Ok(reading(45.0, noon()))]);

    let outcome = monitor::run_check(&mut store, &provider, Some(&user())).unwrap();

    assert!(outcome.alerts.is_empty());
    assert_eq!(store.observation_count(), 1);
    assert_eq!(store.alert_count(), 0);
}

#[test]
fn test_other_users_cannot_see_alerts() {
    let mut store = store_with_preference(&seoul(true));
    let provider = CannedProvider::new(vec![Ok(reading(40.0, noon()))]);
    monitor::run_check(&mut store, &provider, Some(&user())).unwrap();

    let stranger = Identity::parse("user-2").unwrap();
    assert!(store.alerts(&stranger, AlertFilter::default()).unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// 4. Dashboard
// ---------------------------------------------------------------------------

#[test]
fn test_dashboard_fetches_when_nothing_is_stored() {
    let mut store = store_with_preference(&seoul(true));
    let provider = CannedProvider::new(vec![Ok(reading(36.0, noon()))]);

    let snapshot =
        monitor::dashboard(&mut store, || Ok(&provider), Some(&user()), 60, noon()).unwrap();

    assert!(snapshot.refreshed);
    assert_eq!(provider.calls(), 1);
    assert_eq!(snapshot.unread_alerts.len(), 1);
    assert_eq!(snapshot.summary.highest_unread, Some(Severity::High));
}

#[test]
fn test_dashboard_reuses_fresh_observation() {
    let mut store = store_with_preference(&seoul(true));
    let provider = CannedProvider::new(vec![Ok(reading(22.0, noon()))]);
    monitor::run_check(&mut store, &provider, Some(&user())).unwrap();

    let later = noon() + ChronoDuration::minutes(30);
    let snapshot =
        monitor::dashboard(&mut store, || Ok(&provider), Some(&user()), 60, later).unwrap();

    assert!(!snapshot.refreshed);
    assert_eq!(provider.calls(), 1);
    assert_eq!(snapshot.observation.observation.temperature, 22.0);
}

#[test]
fn test_dashboard_refetches_stale_observation() {
    let mut store = store_with_preference(&seoul(true));
    let later = noon() + ChronoDuration::minutes(90);
    let provider = CannedProvider::new(vec![
        Ok(reading(22.0, noon())),
        Ok(reading(24.0, later)),
    ]);
    monitor::run_check(&mut store, &provider, Some(&user())).unwrap();

    let snapshot =
        monitor::dashboard(&mut store, || Ok(&provider), Some(&user()), 60, later).unwrap();

    assert!(snapshot.refreshed);
    assert_eq!(provider.calls(), 2);
    assert_eq!(snapshot.observation.observation.temperature, 24.0);
    assert_eq!(store.observation_count(), 2);
}

#[test]
fn test_dashboard_hides_read_alerts_but_counts_them() {
    let mut store = store_with_preference(&seoul(true));
    let provider = CannedProvider::new(vec![Ok(reading(40.0, noon()))]);
    monitor::run_check(&mut store, &provider, Some(&user())).unwrap();
    store.mark_all_read(&user()).unwrap();

    let snapshot =
        monitor::dashboard(&mut store, || Ok(&provider), Some(&user()), 60, noon()).unwrap();

    assert!(snapshot.unread_alerts.is_empty());
    assert_eq!(snapshot.summary.total, 1);
    assert_eq!(snapshot.summary.highest_unread, None);
}

#[test]
fn test_dashboard_with_fresh_observation_never_builds_a_provider() {
    let mut store = store_with_preference(&seoul(true));
    let provider = CannedProvider::new(vec![Ok(reading(22.0, noon()))]);
    monitor::run_check(&mut store, &provider, Some(&user())).unwrap();

    let snapshot = monitor::dashboard(
        &mut store,
        || -> Result<CannedProvider, MonitorError> {
            Err(ConfigError::MissingEnv("OPENWEATHER_API_KEY").into())
        },
        Some(&user()),
        60,
        noon() + ChronoDuration::minutes(10),
    )
    .unwrap();

    assert!(!snapshot.refreshed);
    assert_eq!(snapshot.observation.observation.temperature, 22.0);
}

#[test]
fn test_dashboard_reports_missing_api_key_when_a_fetch_is_needed() {
    let mut store = store_with_preference(&seoul(true));

    let err = monitor::dashboard(
        &mut store,
        || -> Result<CannedProvider, MonitorError> {
            Err(ConfigError::MissingEnv("OPENWEATHER_API_KEY").into())
        },
        Some(&user()),
        60,
        noon(),
    )
    .unwrap_err();

    assert!(matches!(err, MonitorError::Config(ConfigError::MissingEnv(_))));
    assert_eq!(store.observation_count(), 0);
}

#[test]
fn test_dashboard_counts_every_alert_beyond_the_default_page() {
    let mut store = store_with_preference(&seoul(true));
    let readings = (0..60)
        .map(|i| Ok(reading(40.0, noon() + ChronoDuration::minutes(i))))
        .collect();
    let provider = CannedProvider::new(readings);
    for _ in 0..60 {
        monitor::run_check(&mut store, &provider, Some(&user())).unwrap();
    }
    assert_eq!(store.alert_count(), 60);

    let now = noon() + ChronoDuration::minutes(60);
    let snapshot =
        monitor::dashboard(&mut store, || Ok(&provider), Some(&user()), 60, now).unwrap();

    assert!(!snapshot.refreshed);
    assert_eq!(snapshot.summary.total, 60);
    assert_eq!(snapshot.summary.unread, 60);
    assert_eq!(snapshot.summary.by_severity.get(&Severity::Extreme), Some(&60));
    assert_eq!(snapshot.unread_alerts.len(), 60);
}

// ---------------------------------------------------------------------------
// 5. Watch mode
// ---------------------------------------------------------------------------

#[test]
fn test_watch_continues_after_failed_cycle() {
    let mut store = store_with_preference(&seoul(true));
    let provider = CannedProvider::new(vec![
        Ok(reading(40.0, noon())),
        Err(WeatherError::Request("operation timed out".to_string())),
        Ok(reading(-7.0, noon() + ChronoDuration::minutes(30))),
    ]);

    let mut seen = Vec::new();
    let stats = monitor::watch(
        &mut store,
        &provider,
        &user(),
        Duration::ZERO,
        Some(3),
        |result| seen.push(result.is_ok()),
    );

    assert_eq!(seen, vec![true, false, true]);
    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.successful, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.alerts_raised, 2);
    assert_eq!(store.observation_count(), 2);
}

#[test]
fn test_watch_with_zero_cycles_does_nothing() {
    let mut store = store_with_preference(&seoul(true));
    let provider = CannedProvider::new(vec![Ok(reading(40.0, noon()))]);

    let mut seen = 0;
    let stats = monitor::watch(
        &mut store,
        &provider,
        &user(),
        Duration::ZERO,
        Some(0),
        |_| seen += 1,
    );

    assert_eq!(stats.cycles, 0);
    assert_eq!(seen, 0);
    assert_eq!(provider.calls(), 0);
    assert_eq!(store.observation_count(), 0);
}
