//! Alert generation and freshness checks.
//!
//! - `thresholds`: the rule table that turns a reading into alerts.
//! - `stalenesses`: whether a stored reading is too old to display.

pub mod stalenesses;
pub mod thresholds;

pub use thresholds::evaluate;
