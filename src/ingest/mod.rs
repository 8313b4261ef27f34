//! Weather data ingestion from third-party providers.

pub mod openweather;

pub use openweather::{OpenWeatherClient, WeatherProvider};
