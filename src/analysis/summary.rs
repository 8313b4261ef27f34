//! Alert roll-ups for the dashboard header.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::{Alert, AlertType, Severity};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertSummary {
    pub total: usize,
    pub unread: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_type: BTreeMap<AlertType, usize>,
    /// Most urgent severity among unread alerts.
    pub highest_unread: Option<Severity>,
}

pub fn summarize(alerts: &[Alert]) -> AlertSummary {
    let mut summary = AlertSummary::default();

    for alert in alerts {
        summary.total += 1;
        *summary.by_severity.entry(alert.severity).or_insert(0) += 1;
        *summary.by_type.entry(alert.alert_type).or_insert(0) += 1;

        if !alert.is_read {
            summary.unread += 1;
            summary.highest_unread = summary.highest_unread.max(Some(alert.severity));
        }
    }

    summary
}
