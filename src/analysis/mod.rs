/// Data organization utilities for the weather monitoring service.
///
/// Submodules:
/// - `summary`: rolls a list of alerts up into dashboard counts.

pub mod summary;

pub use summary::{summarize, AlertSummary};
