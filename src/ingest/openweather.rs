/// OpenWeatherMap current-weather client
///
/// Retrieves the current conditions for a latitude/longitude pair from the
/// OpenWeatherMap "current weather data" endpoint, in metric units
/// (°C, m/s, hPa).
///
/// API Documentation: https://openweathermap.org/current

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::model::{Observation, WeatherError};

pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

/// Condition label used when the response carries no `weather` entries.
const UNKNOWN_CONDITION: &str = "Unknown";

// ============================================================================
// Provider seam
// ============================================================================

/// Anything that can answer "what is the weather at this point right now".
/// The check cycle depends on this trait, not on the HTTP client, so tests
/// can substitute a canned provider.
pub trait WeatherProvider {
    fn current_weather(&self, latitude: f64, longitude: f64) -> Result<Observation, WeatherError>;
}

impl<T: WeatherProvider + ?Sized> WeatherProvider for &T {
    fn current_weather(&self, latitude: f64, longitude: f64) -> Result<Observation, WeatherError> {
        (**self).current_weather(latitude, longitude)
    }
}

// ============================================================================
// OpenWeatherMap API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct OwmCurrentResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub weather: Vec<OwmCondition>,
    pub main: OwmMain,
    pub wind: OwmWind,
}

#[derive(Debug, Deserialize)]
pub struct OwmCondition {
    pub main: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Deserialize)]
pub struct OwmMain {
    pub temp: f64,
    pub feels_like: f64,
    pub pressure: f64,
    pub humidity: f64,
}

#[derive(Debug, Deserialize)]
pub struct OwmWind {
    pub speed: f64,
    #[serde(default)]
    pub deg: f64,
}

// ============================================================================
// API Client
// ============================================================================

/// Blocking OpenWeatherMap client.
pub struct OpenWeatherClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    /// Builds a client with its own connection pool and request timeout.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, WeatherError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WeatherError::Request(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// The request URL for a coordinate pair. The API key is appended
    /// separately so this is safe to log.
    pub fn current_url(&self, latitude: f64, longitude: f64) -> String {
        build_current_url(&self.base_url, latitude, longitude)
    }
}

impl WeatherProvider for OpenWeatherClient {
    fn current_weather(&self, latitude: f64, longitude: f64) -> Result<Observation, WeatherError> {
        let url = self.current_url(latitude, longitude);

        let response = self
            .http
            .get(&url)
            .query(&[("appid", self.api_key.as_str())])
            .header("Accept", "application/json")
            .send()
            .map_err(|e| WeatherError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::HttpStatus(status.as_u16()));
        }

        let body = response
            .text()
            .map_err(|e| WeatherError::Request(e.to_string()))?;

        parse_current_response(&body, Utc::now())
    }
}

/// Current-weather URL without credentials.
pub fn build_current_url(base_url: &str, latitude: f64, longitude: f64) -> String {
    format!(
        "{}/weather?lat={}&lon={}&units=metric",
        base_url.trim_end_matches('/'),
        latitude,
        longitude
    )
}

/// Parses a current-weather body into an observation stamped `fetched_at`.
pub fn parse_current_response(
    body: &str,
    fetched_at: DateTime<Utc>,
) -> Result<Observation, WeatherError> {
    let response: OwmCurrentResponse =
        serde_json::from_str(body).map_err(|e| WeatherError::Parse(e.to_string()))?;

    Ok(into_observation(response, fetched_at))
}

fn into_observation(response: OwmCurrentResponse, fetched_at: DateTime<Utc>) -> Observation {
    let (condition, icon) = response
        .weather
        .into_iter()
        .next()
        .map(|c| (c.main, c.icon))
        .unwrap_or_else(|| (UNKNOWN_CONDITION.to_string(), String::new()));

    Observation {
        location_name: response.name,
        temperature: response.main.temp,
        feels_like: response.main.feels_like,
        humidity: response.main.humidity,
        wind_speed: response.wind.speed,
        wind_direction: response.wind.deg,
        pressure: response.main.pressure,
        condition,
        icon,
        fetched_at,
    }
}

/// Full image URL for a provider icon code such as `"10d"`.
pub fn icon_url(icon: &str) -> String {
    format!("{}/{}@2x.png", ICON_BASE_URL, icon)
}

// ============================================================================
// Tests
// ============================================================================
