/// Structured logging for the weather monitoring service
///
/// Every event carries the data source it concerns and, where there is one,
/// the monitored location. Events go through `tracing`; `init_logger`
/// installs a subscriber that writes to stderr and optionally appends to a
/// log file for daemon operation.

use serde::Deserialize;
use std::fmt;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::fmt as tfmt;

use crate::model::WeatherError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    OpenWeather,
    Database,
    Evaluator,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::OpenWeather => write!(f, "OPENWEATHER"),
            DataSource::Database => write!(f, "DB"),
            DataSource::Evaluator => write!(f, "EVAL"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - e.g. the provider does not know the location
    Expected,
    /// Unexpected failure - bad credentials, provider outage, or an API change
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a weather provider failure.
pub fn classify_provider_failure(err: &WeatherError) -> FailureType {
    match err {
        // 404 is how OpenWeatherMap answers coordinates it has no station for
        WeatherError::HttpStatus(404) => FailureType::Expected,
        // 401 means the API key is missing or revoked; 429 means the plan's
        // quota is exhausted. Both need an operator.
        WeatherError::HttpStatus(401) | WeatherError::HttpStatus(429) => FailureType::Unexpected,
        WeatherError::HttpStatus(code) if *code >= 500 => FailureType::Unexpected,
        WeatherError::HttpStatus(_) => FailureType::Unknown,
        WeatherError::Request(msg) if msg.contains("timed out") || msg.contains("timeout") => {
            FailureType::Unexpected
        }
        WeatherError::Request(_) => FailureType::Unknown,
        // Parse errors suggest an API change
        WeatherError::Parse(_) => FailureType::Unexpected,
    }
}

// ---------------------------------------------------------------------------
// Logger Initialization
// ---------------------------------------------------------------------------

/// Install the global subscriber.
///
/// Console output goes to stderr. When `log_file` is given, the same events
/// are appended to that file without ANSI colors. Calling this a second time
/// is a no-op; any other install failure is reported on stderr.
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>) -> std::io::Result<()> {
    let console = tfmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tfmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    if let Err(e) = tracing_subscriber::registry()
        .with(LevelFilter::from(min_level))
        .with(console)
        .with(file_layer)
        .try_init()
    {
        eprintln!("⚠ could not install log subscriber: {}", e);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(source: DataSource, location: Option<&str>, message: &str) {
    tracing::info!(source = %source, location = location.unwrap_or("-"), "{}", message);
}

/// Log a warning message
pub fn warn(source: DataSource, location: Option<&str>, message: &str) {
    tracing::warn!(source = %source, location = location.unwrap_or("-"), "{}", message);
}

/// Log an error message
pub fn error(source: DataSource, location: Option<&str>, message: &str) {
    tracing::error!(source = %source, location = location.unwrap_or("-"), "{}", message);
}

/// Log a debug message
pub fn debug(source: DataSource, location: Option<&str>, message: &str) {
    tracing::debug!(source = %source, location = location.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a provider failure at the level its classification calls for.
pub fn log_provider_failure(location: &str, operation: &str, err: &WeatherError) {
    let failure_type = classify_provider_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(DataSource::OpenWeather, Some(location), &message),
        FailureType::Unexpected => error(DataSource::OpenWeather, Some(location), &message),
        FailureType::Unknown => warn(DataSource::OpenWeather, Some(location), &message),
    }
}

// ---------------------------------------------------------------------------
// Cycle Summary Logging
// ---------------------------------------------------------------------------

/// Log the outcome of one check cycle.
pub fn log_check_summary(location: &str, temperature: f64, alerts_raised: usize) {
    let message = format!(
        "Check complete: {:.1}°C, {} alert(s) raised",
        temperature, alerts_raised
    );

    if alerts_raised == 0 {
        info(DataSource::Evaluator, Some(location), &message);
    } else {
        warn(DataSource::Evaluator, Some(location), &message);
    }
}

/// Log a summary of a watch run.
pub fn log_watch_summary(total: usize, successful: usize, failed: usize) {
    let message = format!(
        "Watch finished: {}/{} cycles successful, {} failed",
        successful, total, failed
    );

    if failed == 0 {
        info(DataSource::System, None, &message);
    } else if successful == 0 {
        error(DataSource::System, None, &message);
    } else {
        warn(DataSource::System, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_level_maps_to_filter() {
        assert_eq!(LevelFilter::from(LogLevel::Warning), LevelFilter::WARN);
        assert_eq!(LevelFilter::from(LogLevel::Debug), LevelFilter::DEBUG);
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(
            classify_provider_failure(&WeatherError::HttpStatus(404)),
            FailureType::Expected
        );
        assert_eq!(
            classify_provider_failure(&WeatherError::HttpStatus(401)),
            FailureType::Unexpected
        );
        assert_eq!(
            classify_provider_failure(&WeatherError::HttpStatus(503)),
            FailureType::Unexpected
        );
        assert_eq!(
            classify_provider_failure(&WeatherError::HttpStatus(418)),
            FailureType::Unknown
        );
        assert_eq!(
            classify_provider_failure(&WeatherError::Request("operation timed out".into())),
            FailureType::Unexpected
        );
        assert_eq!(
            classify_provider_failure(&WeatherError::Parse("missing field `main`".into())),
            FailureType::Unexpected
        );
    }

    #[test]
    fn test_init_logger_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wxmon.log");
        init_logger(LogLevel::Info, path.to_str()).expect("log file should open");
        assert!(path.exists());
        assert!(tracing::dispatcher::has_been_set());
    }

    #[test]
    fn test_init_logger_second_call_is_a_no_op() {
        init_logger(LogLevel::Warning, None).expect("first call should succeed");
        init_logger(LogLevel::Debug, None).expect("second call should be a no-op");
        assert!(tracing::dispatcher::has_been_set());
    }
}
