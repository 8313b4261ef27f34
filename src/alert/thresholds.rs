//! Threshold checking: turns one observation and one set of user thresholds
//! into the alerts that reading should raise.
//!
//! Each rule is independent. A reading may trigger any subset of them,
//! including none or all five, and the output always follows `RULES` order.
//! Comparisons are inclusive at the threshold. Non-finite readings fail every
//! comparison and so raise nothing for that rule.

use crate::model::{AlertDescriptor, AlertThresholds, AlertType, Observation, Severity};

/// Margin above the high threshold (or below the low one) that escalates a
/// temperature alert to `Extreme`, in °C.
pub const TEMP_EXTREME_MARGIN: f64 = 5.0;

/// Margin above the wind threshold that escalates to `Extreme`, in m/s.
pub const WIND_EXTREME_MARGIN: f64 = 10.0;

/// Margin above the humidity threshold that escalates to `High`, in percent.
pub const HUMIDITY_HIGH_MARGIN: f64 = 10.0;

/// Gap between actual and perceived temperature, in °C, above which a
/// feels-like alert is raised. Strictly greater than.
pub const FEELS_LIKE_GAP: f64 = 5.0;

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// One row of the rule table: a predicate that yields a severity when the
/// rule fires, and the text to attach when it does.
pub struct Rule {
    pub alert_type: AlertType,
    pub title: &'static str,
    check: fn(&Observation, &AlertThresholds) -> Option<Severity>,
    message: fn(&Observation, &AlertThresholds) -> String,
}

impl Rule {
    fn apply(&self, obs: &Observation, thresholds: &AlertThresholds) -> Option<AlertDescriptor> {
        let severity = (self.check)(obs, thresholds)?;
        Some(AlertDescriptor {
            alert_type: self.alert_type,
            severity,
            title: self.title.to_string(),
            message: (self.message)(obs, thresholds),
        })
    }
}

pub static RULES: &[Rule] = &[
    Rule {
        alert_type: AlertType::HighTemp,
        title: "High Temperature Alert",
        check: |obs, t| {
            if obs.temperature >= t.temp_threshold_high + TEMP_EXTREME_MARGIN {
                Some(Severity::Extreme)
            } else if obs.temperature >= t.temp_threshold_high {
                Some(Severity::High)
            } else {
                None
            }
        },
        message: |obs, t| {
            format!(
                "Current temperature {:.1}°C has reached your threshold of {:.1}°C. \
                 Limit time in direct sun and stay hydrated.",
                obs.temperature, t.temp_threshold_high
            )
        },
    },
    Rule {
        alert_type: AlertType::LowTemp,
        title: "Low Temperature Alert",
        check: |obs, t| {
            if obs.temperature <= t.temp_threshold_low - TEMP_EXTREME_MARGIN {
                Some(Severity::Extreme)
            } else if obs.temperature <= t.temp_threshold_low {
                Some(Severity::High)
            } else {
                None
            }
        },
        message: |obs, t| {
            format!(
                "Current temperature {:.1}°C has dropped to your threshold of {:.1}°C. \
                 Dress warmly and watch for cold exposure.",
                obs.temperature, t.temp_threshold_low
            )
        },
    },
    Rule {
        alert_type: AlertType::StrongWind,
        title: "Strong Wind Alert",
        check: |obs, t| {
            if obs.wind_speed >= t.wind_speed_threshold + WIND_EXTREME_MARGIN {
                Some(Severity::Extreme)
            } else if obs.wind_speed >= t.wind_speed_threshold {
                Some(Severity::High)
            } else {
                None
            }
        },
        message: |obs, t| {
            format!(
                "Wind speed {:.1} m/s has reached your threshold of {:.1} m/s. \
                 Take care with outdoor activities.",
                obs.wind_speed, t.wind_speed_threshold
            )
        },
    },
    Rule {
        alert_type: AlertType::HighHumidity,
        title: "High Humidity Alert",
        check: |obs, t| {
            if obs.humidity >= t.humidity_threshold + HUMIDITY_HIGH_MARGIN {
                Some(Severity::High)
            } else if obs.humidity >= t.humidity_threshold {
                Some(Severity::Medium)
            } else {
                None
            }
        },
        message: |obs, t| {
            format!(
                "Humidity {:.1}% has reached your threshold of {:.1}%. \
                 Expect muggy, uncomfortable conditions.",
                obs.humidity, t.humidity_threshold
            )
        },
    },
    Rule {
        alert_type: AlertType::FeelsLikeDiff,
        title: "Feels-Like Temperature Alert",
        check: |obs, _| {
            if (obs.temperature - obs.feels_like).abs() > FEELS_LIKE_GAP {
                Some(Severity::Medium)
            } else {
                None
            }
        },
        message: |obs, _| {
            format!(
                "Actual temperature is {:.1}°C but it feels like {:.1}°C.",
                obs.temperature, obs.feels_like
            )
        },
    },
];

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Runs every rule against the reading and returns the alerts that fired, in
/// rule order. Pure and total: no I/O, no shared state, never fails.
pub fn evaluate(obs: &Observation, thresholds: &AlertThresholds) -> Vec<AlertDescriptor> {
    RULES
        .iter()
        .filter_map(|rule| rule.apply(obs, thresholds))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
