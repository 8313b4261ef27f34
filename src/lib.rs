//! Personal weather monitoring: fetch current conditions for a user's
//! location, compare them against the user's thresholds, and keep a record of
//! the alerts that fire.

pub mod alert;
pub mod analysis;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod monitor;
pub mod store;
