//! Core data types for the personal weather monitoring service.
//!
//! This module defines the shared domain model imported by all other modules:
//! preferences and their thresholds, weather observations, alerts, and the
//! caller identity that scopes every stored row. It contains no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The authenticated caller. Every store operation is scoped to one identity;
/// rows owned by another identity are never visible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    user_id: String,
}

impl Identity {
    /// Builds an identity from a raw user id. Blank ids are rejected, which is
    /// how a missing credential surfaces.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self {
                user_id: trimmed.to_string(),
            })
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_id)
    }
}

// ---------------------------------------------------------------------------
// Preference types
// ---------------------------------------------------------------------------

/// Alert thresholds for a monitored location.
///
/// Temperatures in °C, wind speed in m/s, humidity in percent. The low
/// temperature threshold is expected to sit below the high one, but this is
/// not enforced; inverted thresholds simply let both temperature rules fire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub temp_threshold_high: f64,
    pub temp_threshold_low: f64,
    pub wind_speed_threshold: f64,
    pub humidity_threshold: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            temp_threshold_high: 35.0,
            temp_threshold_low: 0.0,
            wind_speed_threshold: 15.0,
            humidity_threshold: 85.0,
        }
    }
}

/// A named location. Coordinates are optional until the user picks a place;
/// a check cycle refuses to run without both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Location {
    /// Returns `(latitude, longitude)` only when both are present.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// A user's monitored location plus alert configuration, as submitted by the
/// settings form. The store assigns `id` and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceDraft {
    pub location: Location,
    pub thresholds: AlertThresholds,
    pub alerts_enabled: bool,
}

/// A stored preference. One per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    pub id: i64,
    pub user_id: String,
    pub location: Location,
    pub thresholds: AlertThresholds,
    pub alerts_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Observation types
// ---------------------------------------------------------------------------

/// One fetched weather reading. Immutable once created.
///
/// Values are taken literally from the provider; out-of-range or non-finite
/// numbers are not rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub location_name: String,
    pub temperature: f64,      // °C
    pub feels_like: f64,       // °C
    pub humidity: f64,         // %
    pub wind_speed: f64,       // m/s
    pub wind_direction: f64,   // degrees
    pub pressure: f64,         // hPa
    pub condition: String,     // e.g. "Clear", "Rain"
    pub icon: String,          // provider icon code, e.g. "01d"
    pub fetched_at: DateTime<Utc>,
}

/// An observation after persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObservation {
    pub id: i64,
    pub preference_id: i64,
    pub observation: Observation,
}

// ---------------------------------------------------------------------------
// Alert types
// ---------------------------------------------------------------------------

/// Ordinal urgency label, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Extreme,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Extreme => "extreme",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "extreme" => Ok(Severity::Extreme),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

/// The kind of threshold crossing an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    HighTemp,
    LowTemp,
    StrongWind,
    HighHumidity,
    FeelsLikeDiff,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::HighTemp => "HIGH_TEMP",
            AlertType::LowTemp => "LOW_TEMP",
            AlertType::StrongWind => "STRONG_WIND",
            AlertType::HighHumidity => "HIGH_HUMIDITY",
            AlertType::FeelsLikeDiff => "FEELS_LIKE_DIFF",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HIGH_TEMP" => Ok(AlertType::HighTemp),
            "LOW_TEMP" => Ok(AlertType::LowTemp),
            "STRONG_WIND" => Ok(AlertType::StrongWind),
            "HIGH_HUMIDITY" => Ok(AlertType::HighHumidity),
            "FEELS_LIKE_DIFF" => Ok(AlertType::FeelsLikeDiff),
            other => Err(UnknownLabel(other.to_string())),
        }
    }
}

/// Evaluator output: what to alert about, before the caller attaches ids and
/// timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDescriptor {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

/// A persisted alert. `weather_data_id` becomes `None` if the triggering
/// observation is deleted; the alert itself stays valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub user_preference_id: i64,
    pub weather_data_id: Option<i64>,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A stored enum label that does not match any known variant.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("unknown label: {0}")]
pub struct UnknownLabel(pub String);

/// Errors that can arise when fetching current weather from the provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeatherError {
    /// Non-2xx HTTP response from the weather API.
    #[error("HTTP error: {0}")]
    HttpStatus(u16),
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("Request failed: {0}")]
    Request(String),
    /// The response body could not be deserialized.
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rejects_blank_user_ids() {
        assert!(Identity::parse("").is_none());
        assert!(Identity::parse("   ").is_none());
        assert_eq!(Identity::parse(" alice ").unwrap().user_id(), "alice");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Extreme);
    }

    #[test]
    fn test_labels_match_stored_values() {
        assert_eq!(AlertType::FeelsLikeDiff.as_str(), "FEELS_LIKE_DIFF");
        assert_eq!("STRONG_WIND".parse::<AlertType>(), Ok(AlertType::StrongWind));
        assert_eq!("extreme".parse::<Severity>(), Ok(Severity::Extreme));
        assert!("EXTREME".parse::<Severity>().is_err());
    }

    #[test]
    fn test_descriptor_serializes_type_field() {
        let descriptor = AlertDescriptor {
            alert_type: AlertType::HighTemp,
            severity: Severity::High,
            title: "High Temperature Alert".to_string(),
            message: "hot".to_string(),
        };
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["type"], "HIGH_TEMP");
        assert_eq!(json["severity"], "high");
    }

    #[test]
    fn test_location_coordinates_require_both_values() {
        let mut location = Location {
            name: "Seoul".to_string(),
            latitude: Some(37.57),
            longitude: None,
        };
        assert_eq!(location.coordinates(), None);
        location.longitude = Some(126.98);
        assert_eq!(location.coordinates(), Some((37.57, 126.98)));
    }
}
