//! PostgreSQL store.
//!
//! Expects the schema from `sql/001_weather_schema.sql`. Foreign keys do the
//! cascading: deleting a preference removes its observations and alerts,
//! deleting an observation nulls `alerts.weather_data_id`.
//!
//! Ownership is enforced in every statement by joining back to
//! `user_preferences.user_id`.

use chrono::{DateTime, Utc};
use postgres::{Client, NoTls, Row};

use super::{AlertFilter, CheckRecord, StoreError, WeatherStore};
use crate::logging::{self, DataSource};
use crate::model::{
    Alert, AlertDescriptor, AlertThresholds, AlertType, Identity, Location, Observation, Preference,
    PreferenceDraft, Severity, StoredObservation,
};

/// Tables the store reads and writes.
pub const REQUIRED_TABLES: &[&str] = &["user_preferences", "weather_data", "alerts"];

const PREFERENCE_COLUMNS: &str = "id, user_id, location_name, latitude, longitude,
     temp_threshold_high, temp_threshold_low, wind_speed_threshold, humidity_threshold,
     alerts_enabled, created_at, updated_at";

const OBSERVATION_COLUMNS: &str = "w.id, w.user_preference_id, w.location_name, w.temperature,
     w.feels_like, w.humidity, w.wind_speed, w.wind_direction, w.pressure,
     w.weather_condition, w.weather_icon, w.fetched_at";

const ALERT_COLUMNS: &str = "a.id, a.user_preference_id, a.weather_data_id, a.alert_type,
     a.severity, a.title, a.message, a.is_read, a.created_at";

pub struct PgStore {
    client: Client,
}

impl PgStore {
    /// Connect and check that the schema has been applied.
    pub fn connect(database_url: &str) -> Result<Self, StoreError> {
        let client = Client::connect(database_url, NoTls)?;
        let mut store = Self { client };
        store.verify_schema()?;
        logging::debug(DataSource::Database, None, "Connected and schema verified");
        Ok(store)
    }

    /// Wrap an existing connection without checking the schema.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Fails with `MissingSchema` naming the first absent table.
    pub fn verify_schema(&mut self) -> Result<(), StoreError> {
        for table in REQUIRED_TABLES {
            let row = self.client.query_one(
                "SELECT EXISTS (
                     SELECT 1 FROM information_schema.tables
                     WHERE table_schema = current_schema() AND table_name = $1
                 )",
                &[table],
            )?;
            let exists: bool = row.try_get(0)?;
            if !exists {
                return Err(StoreError::MissingSchema(format!(
                    "table '{}' (apply sql/001_weather_schema.sql)",
                    table
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn preference_from_row(row: &Row) -> Result<Preference, StoreError> {
    Ok(Preference {
        id: row.try_get(0)?,
        user_id: row.try_get(1)?,
        location: Location {
            name: row.try_get(2)?,
            latitude: row.try_get(3)?,
            longitude: row.try_get(4)?,
        },
        thresholds: AlertThresholds {
            temp_threshold_high: row.try_get(5)?,
            temp_threshold_low: row.try_get(6)?,
            wind_speed_threshold: row.try_get(7)?,
            humidity_threshold: row.try_get(8)?,
        },
        alerts_enabled: row.try_get(9)?,
        created_at: row.try_get(10)?,
        updated_at: row.try_get(11)?,
    })
}

fn observation_from_row(row: &Row) -> Result<StoredObservation, StoreError> {
    Ok(StoredObservation {
        id: row.try_get(0)?,
        preference_id: row.try_get(1)?,
        observation: Observation {
            location_name: row.try_get(2)?,
            temperature: row.try_get(3)?,
            feels_like: row.try_get(4)?,
            humidity: row.try_get(5)?,
            wind_speed: row.try_get(6)?,
            wind_direction: row.try_get(7)?,
            pressure: row.try_get(8)?,
            condition: row.try_get(9)?,
            icon: row.try_get(10)?,
            fetched_at: row.try_get(11)?,
        },
    })
}

fn alert_from_row(row: &Row) -> Result<Alert, StoreError> {
    let alert_type: String = row.try_get(3)?;
    let severity: String = row.try_get(4)?;

    Ok(Alert {
        id: row.try_get(0)?,
        user_preference_id: row.try_get(1)?,
        weather_data_id: row.try_get(2)?,
        alert_type: alert_type
            .parse::<AlertType>()
            .map_err(|e| StoreError::InvalidRow(e.to_string()))?,
        severity: severity
            .parse::<Severity>()
            .map_err(|e| StoreError::InvalidRow(e.to_string()))?,
        title: row.try_get(5)?,
        message: row.try_get(6)?,
        is_read: row.try_get(7)?,
        created_at: row.try_get(8)?,
    })
}

// ---------------------------------------------------------------------------
// WeatherStore
// ---------------------------------------------------------------------------

impl WeatherStore for PgStore {
    fn active_preference(&mut self, owner: &Identity) -> Result<Option<Preference>, StoreError> {
        let query = format!(
            "SELECT {} FROM user_preferences WHERE user_id = $1",
            PREFERENCE_COLUMNS
        );
        self.client
            .query_opt(query.as_str(), &[&owner.user_id()])?
            .map(|row| preference_from_row(&row))
            .transpose()
    }

    fn save_preference(
        &mut self,
        owner: &Identity,
        draft: &PreferenceDraft,
    ) -> Result<Preference, StoreError> {
        let query = format!(
            "INSERT INTO user_preferences
                 (user_id, location_name, latitude, longitude,
                  temp_threshold_high, temp_threshold_low, wind_speed_threshold,
                  humidity_threshold, alerts_enabled)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (user_id) DO UPDATE SET
                 location_name = EXCLUDED.location_name,
                 latitude = EXCLUDED.latitude,
                 longitude = EXCLUDED.longitude,
                 temp_threshold_high = EXCLUDED.temp_threshold_high,
                 temp_threshold_low = EXCLUDED.temp_threshold_low,
                 wind_speed_threshold = EXCLUDED.wind_speed_threshold,
                 humidity_threshold = EXCLUDED.humidity_threshold,
                 alerts_enabled = EXCLUDED.alerts_enabled,
                 updated_at = now()
             RETURNING {}",
            PREFERENCE_COLUMNS
        );
        let t = &draft.thresholds;
        let row = self.client.query_one(
            query.as_str(),
            &[
                &owner.user_id(),
                &draft.location.name,
                &draft.location.latitude,
                &draft.location.longitude,
                &t.temp_threshold_high,
                &t.temp_threshold_low,
                &t.wind_speed_threshold,
                &t.humidity_threshold,
                &draft.alerts_enabled,
            ],
        )?;
        preference_from_row(&row)
    }

    fn delete_preference(
        &mut self,
        owner: &Identity,
        preference_id: i64,
    ) -> Result<bool, StoreError> {
        let deleted = self.client.execute(
            "DELETE FROM user_preferences WHERE id = $1 AND user_id = $2",
            &[&preference_id, &owner.user_id()],
        )?;
        Ok(deleted > 0)
    }

    fn record_check(
        &mut self,
        owner: &Identity,
        preference_id: i64,
        observation: &Observation,
        alerts: &[AlertDescriptor],
    ) -> Result<CheckRecord, StoreError> {
        let mut tx = self.client.transaction()?;

        // Lock the preference row so a concurrent delete cannot slip between
        // the ownership check and the inserts.
        let owned = tx.query_opt(
            "SELECT id FROM user_preferences WHERE id = $1 AND user_id = $2 FOR UPDATE",
            &[&preference_id, &owner.user_id()],
        )?;
        if owned.is_none() {
            return Err(StoreError::NotFound(format!("preference {}", preference_id)));
        }

        let row = tx.query_one(
            "INSERT INTO weather_data
                 (user_preference_id, location_name, temperature, feels_like, humidity,
                  wind_speed, wind_direction, pressure, weather_condition, weather_icon,
                  fetched_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING id",
            &[
                &preference_id,
                &observation.location_name,
                &observation.temperature,
                &observation.feels_like,
                &observation.humidity,
                &observation.wind_speed,
                &observation.wind_direction,
                &observation.pressure,
                &observation.condition,
                &observation.icon,
                &observation.fetched_at,
            ],
        )?;
        let weather_data_id: i64 = row.try_get(0)?;

        let mut written = Vec::with_capacity(alerts.len());
        for descriptor in alerts {
            let row = tx.query_one(
                "INSERT INTO alerts
                     (user_preference_id, weather_data_id, alert_type, severity, title, message)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING id, created_at",
                &[
                    &preference_id,
                    &weather_data_id,
                    &descriptor.alert_type.as_str(),
                    &descriptor.severity.as_str(),
                    &descriptor.title,
                    &descriptor.message,
                ],
            )?;
            let created_at: DateTime<Utc> = row.try_get(1)?;
            written.push(Alert {
                id: row.try_get(0)?,
                user_preference_id: preference_id,
                weather_data_id: Some(weather_data_id),
                alert_type: descriptor.alert_type,
                severity: descriptor.severity,
                title: descriptor.title.clone(),
                message: descriptor.message.clone(),
                is_read: false,
                created_at,
            });
        }

        tx.commit()?;

        Ok(CheckRecord {
            observation: StoredObservation {
                id: weather_data_id,
                preference_id,
                observation: observation.clone(),
            },
            alerts: written,
        })
    }

    fn latest_observation(
        &mut self,
        owner: &Identity,
        preference_id: i64,
    ) -> Result<Option<StoredObservation>, StoreError> {
        let query = format!(
            "SELECT {}
             FROM weather_data w
             JOIN user_preferences p ON p.id = w.user_preference_id
             WHERE w.user_preference_id = $1 AND p.user_id = $2
             ORDER BY w.fetched_at DESC, w.id DESC
             LIMIT 1",
            OBSERVATION_COLUMNS
        );
        self.client
            .query_opt(query.as_str(), &[&preference_id, &owner.user_id()])?
            .map(|row| observation_from_row(&row))
            .transpose()
    }

    fn delete_observation(
        &mut self,
        owner: &Identity,
        observation_id: i64,
    ) -> Result<bool, StoreError> {
        let deleted = self.client.execute(
            "DELETE FROM weather_data w
             USING user_preferences p
             WHERE w.id = $1 AND p.id = w.user_preference_id AND p.user_id = $2",
            &[&observation_id, &owner.user_id()],
        )?;
        Ok(deleted > 0)
    }

    fn alerts(&mut self, owner: &Identity, filter: AlertFilter) -> Result<Vec<Alert>, StoreError> {
        let query = format!(
            "SELECT {}
             FROM alerts a
             JOIN user_preferences p ON p.id = a.user_preference_id
             WHERE p.user_id = $1 AND (NOT $2 OR NOT a.is_read)
             ORDER BY a.created_at DESC, a.id DESC
             LIMIT $3",
            ALERT_COLUMNS
        );
        let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);
        let rows = self
            .client
            .query(query.as_str(), &[&owner.user_id(), &filter.unread_only, &limit])?;

        rows.iter().map(alert_from_row).collect()
    }

    fn mark_alert_read(&mut self, owner: &Identity, alert_id: i64) -> Result<bool, StoreError> {
        let updated = self.client.execute(
            "UPDATE alerts a SET is_read = TRUE
             FROM user_preferences p
             WHERE a.id = $1 AND p.id = a.user_preference_id AND p.user_id = $2",
            &[&alert_id, &owner.user_id()],
        )?;
        Ok(updated > 0)
    }

    fn mark_all_read(&mut self, owner: &Identity) -> Result<u64, StoreError> {
        let updated = self.client.execute(
            "UPDATE alerts a SET is_read = TRUE
             FROM user_preferences p
             WHERE p.id = a.user_preference_id AND p.user_id = $1 AND NOT a.is_read",
            &[&owner.user_id()],
        )?;
        Ok(updated)
    }
}
