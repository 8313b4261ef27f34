//! In-memory store.
//!
//! Backs the `--memory` dry-run mode and the check-cycle tests. Mirrors the
//! foreign-key behavior of the SQL schema: deleting a preference cascades,
//! deleting an observation orphans its alerts.

use chrono::Utc;

use super::{AlertFilter, CheckRecord, StoreError, WeatherStore};
use crate::model::{
    Alert, AlertDescriptor, Identity, Observation, Preference, PreferenceDraft, StoredObservation,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    preferences: Vec<Preference>,
    observations: Vec<StoredObservation>,
    alerts: Vec<Alert>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn owned_preference_ids(&self, owner: &Identity) -> Vec<i64> {
        self.preferences
            .iter()
            .filter(|p| p.user_id == owner.user_id())
            .map(|p| p.id)
            .collect()
    }

    fn owns_preference(&self, owner: &Identity, preference_id: i64) -> bool {
        self.owned_preference_ids(owner).contains(&preference_id)
    }

    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }
}

impl WeatherStore for MemoryStore {
    fn active_preference(&mut self, owner: &Identity) -> Result<Option<Preference>, StoreError> {
        Ok(self
            .preferences
            .iter()
            .find(|p| p.user_id == owner.user_id())
            .cloned())
    }

    fn save_preference(
        &mut self,
        owner: &Identity,
        draft: &PreferenceDraft,
    ) -> Result<Preference, StoreError> {
        let now = Utc::now();

        if let Some(existing) = self
            .preferences
            .iter_mut()
            .find(|p| p.user_id == owner.user_id())
        {
            existing.location = draft.location.clone();
            existing.thresholds = draft.thresholds;
            existing.alerts_enabled = draft.alerts_enabled;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let preference = Preference {
            id: self.allocate_id(),
            user_id: owner.user_id().to_string(),
            location: draft.location.clone(),
            thresholds: draft.thresholds,
            alerts_enabled: draft.alerts_enabled,
            created_at: now,
            updated_at: now,
        };
        self.preferences.push(preference.clone());
        Ok(preference)
    }

    fn delete_preference(
        &mut self,
        owner: &Identity,
        preference_id: i64,
    ) -> Result<bool, StoreError> {
        if !self.owns_preference(owner, preference_id) {
            return Ok(false);
        }
        self.preferences.retain(|p| p.id != preference_id);
        self.observations.retain(|o| o.preference_id != preference_id);
        self.alerts.retain(|a| a.user_preference_id != preference_id);
        Ok(true)
    }

    fn record_check(
        &mut self,
        owner: &Identity,
        preference_id: i64,
        observation: &Observation,
        alerts: &[AlertDescriptor],
    ) -> Result<CheckRecord, StoreError> {
        if !self.owns_preference(owner, preference_id) {
            return Err(StoreError::NotFound(format!("preference {}", preference_id)));
        }

        let stored = StoredObservation {
            id: self.allocate_id(),
            preference_id,
            observation: observation.clone(),
        };

        let created_at = Utc::now();
        let mut written = Vec::with_capacity(alerts.len());
        for descriptor in alerts {
            written.push(Alert {
                id: self.allocate_id(),
                user_preference_id: preference_id,
                weather_data_id: Some(stored.id),
                alert_type: descriptor.alert_type,
                severity: descriptor.severity,
                title: descriptor.title.clone(),
                message: descriptor.message.clone(),
                is_read: false,
                created_at,
            });
        }

        self.observations.push(stored.clone());
        self.alerts.extend(written.iter().cloned());

        Ok(CheckRecord {
            observation: stored,
            alerts: written,
        })
    }

    fn latest_observation(
        &mut self,
        owner: &Identity,
        preference_id: i64,
    ) -> Result<Option<StoredObservation>, StoreError> {
        if !self.owns_preference(owner, preference_id) {
            return Ok(None);
        }
        // Ties on fetched_at go to the later insert.
        Ok(self
            .observations
            .iter()
            .filter(|o| o.preference_id == preference_id)
            .max_by(|a, b| {
                a.observation
                    .fetched_at
                    .cmp(&b.observation.fetched_at)
                    .then(a.id.cmp(&b.id))
            })
            .cloned())
    }

    fn delete_observation(
        &mut self,
        owner: &Identity,
        observation_id: i64,
    ) -> Result<bool, StoreError> {
        let owned = self.owned_preference_ids(owner);
        let before = self.observations.len();
        self.observations
            .retain(|o| !(o.id == observation_id && owned.contains(&o.preference_id)));

        if self.observations.len() == before {
            return Ok(false);
        }
        for alert in self
            .alerts
            .iter_mut()
            .filter(|a| a.weather_data_id == Some(observation_id))
        {
            alert.weather_data_id = None;
        }
        Ok(true)
    }

    fn alerts(&mut self, owner: &Identity, filter: AlertFilter) -> Result<Vec<Alert>, StoreError> {
        let owned = self.owned_preference_ids(owner);
        let mut alerts: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| owned.contains(&a.user_preference_id))
            .filter(|a| !filter.unread_only || !a.is_read)
            .cloned()
            .collect();

        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        alerts.truncate(filter.limit);
        Ok(alerts)
    }

    fn mark_alert_read(&mut self, owner: &Identity, alert_id: i64) -> Result<bool, StoreError> {
        let owned = self.owned_preference_ids(owner);
        match self
            .alerts
            .iter_mut()
            .find(|a| a.id == alert_id && owned.contains(&a.user_preference_id))
        {
            Some(alert) => {
                alert.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn mark_all_read(&mut self, owner: &Identity) -> Result<u64, StoreError> {
        let owned = self.owned_preference_ids(owner);
        let mut changed = 0;
        for alert in self
            .alerts
            .iter_mut()
            .filter(|a| owned.contains(&a.user_preference_id) && !a.is_read)
        {
            alert.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertThresholds, AlertType, Location, Severity};
    use chrono::TimeZone;

    fn alice() -> Identity {
        Identity::parse("alice").unwrap()
    }

    fn bob() -> Identity {
        Identity::parse("bob").unwrap()
    }

    fn draft(name: &str) -> PreferenceDraft {
        PreferenceDraft {
            location: Location {
                name: name.to_string(),
                latitude: Some(37.5683),
                longitude: Some(126.9778),
            },
            thresholds: AlertThresholds::default(),
            alerts_enabled: true,
        }
    }

    fn observation(hour: u32) -> Observation {
        Observation {
            location_name: "Seoul".to_string(),
            temperature: 36.0,
            feels_like: 36.0,
            humidity: 50.0,
            wind_speed: 2.0,
            wind_direction: 0.0,
            pressure: 1010.0,
            condition: "Clear".to_string(),
            icon: "01d".to_string(),
            fetched_at: Utc.with_ymd_and_hms(2024, 7, 1, hour, 0, 0).unwrap(),
        }
    }

    fn heat_alert() -> AlertDescriptor {
        AlertDescriptor {
            alert_type: AlertType::HighTemp,
            severity: Severity::High,
            title: "High Temperature Alert".to_string(),
            message: "hot".to_string(),
        }
    }

    #[test]
    fn test_save_preference_updates_in_place() {
        let mut store = MemoryStore::new();
        let first = store.save_preference(&alice(), &draft("Seoul")).unwrap();
        let second = store.save_preference(&alice(), &draft("Busan")).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.location.name, "Busan");
        assert_eq!(
            store.active_preference(&alice()).unwrap().unwrap().location.name,
            "Busan"
        );
    }

    #[test]
    fn test_preferences_are_scoped_by_owner() {
        let mut store = MemoryStore::new();
        let pref = store.save_preference(&alice(), &draft("Seoul")).unwrap();

        assert!(store.active_preference(&bob()).unwrap().is_none());
        assert!(!store.delete_preference(&bob(), pref.id).unwrap());
        let err = store
            .record_check(&bob(), pref.id, &observation(9), &[heat_alert()])
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.observation_count(), 0);
    }

    #[test]
    fn test_record_check_links_alerts_to_observation() {
        let mut store = MemoryStore::new();
        let pref = store.save_preference(&alice(), &draft("Seoul")).unwrap();
        let record = store
            .record_check(&alice(), pref.id, &observation(9), &[heat_alert()])
            .unwrap();

        assert_eq!(record.alerts.len(), 1);
        assert_eq!(record.alerts[0].weather_data_id, Some(record.observation.id));
        assert_eq!(record.alerts[0].user_preference_id, pref.id);
        assert!(!record.alerts[0].is_read);
    }

    #[test]
    fn test_latest_observation_is_most_recently_fetched() {
        let mut store = MemoryStore::new();
        let pref = store.save_preference(&alice(), &draft("Seoul")).unwrap();
        store.record_check(&alice(), pref.id, &observation(11), &[]).unwrap();
        store.record_check(&alice(), pref.id, &observation(9), &[]).unwrap();

        let latest = store.latest_observation(&alice(), pref.id).unwrap().unwrap();
        assert_eq!(latest.observation.fetched_at, observation(11).fetched_at);
        assert!(store.latest_observation(&bob(), pref.id).unwrap().is_none());
    }

    #[test]
    fn test_deleting_observation_orphans_its_alerts() {
        let mut store = MemoryStore::new();
        let pref = store.save_preference(&alice(), &draft("Seoul")).unwrap();
        let record = store
            .record_check(&alice(), pref.id, &observation(9), &[heat_alert()])
            .unwrap();

        assert!(!store.delete_observation(&bob(), record.observation.id).unwrap());
        assert!(store.delete_observation(&alice(), record.observation.id).unwrap());

        let alerts = store.alerts(&alice(), AlertFilter::default()).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].weather_data_id, None);
    }

    #[test]
    fn test_deleting_preference_cascades() {
        let mut store = MemoryStore::new();
        let pref = store.save_preference(&alice(), &draft("Seoul")).unwrap();
        store
            .record_check(&alice(), pref.id, &observation(9), &[heat_alert()])
            .unwrap();

        assert!(store.delete_preference(&alice(), pref.id).unwrap());
        assert_eq!(store.observation_count(), 0);
        assert_eq!(store.alert_count(), 0);
    }

    #[test]
    fn test_mark_read_and_unread_filter() {
        let mut store = MemoryStore::new();
        let pref = store.save_preference(&alice(), &draft("Seoul")).unwrap();
        let first = store
            .record_check(&alice(), pref.id, &observation(9), &[heat_alert()])
            .unwrap();
        store
            .record_check(&alice(), pref.id, &observation(10), &[heat_alert(), heat_alert()])
            .unwrap();

        let alert_id = first.alerts[0].id;
        assert!(!store.mark_alert_read(&bob(), alert_id).unwrap());
        assert!(store.mark_alert_read(&alice(), alert_id).unwrap());

        let unread = AlertFilter {
            unread_only: true,
            limit: 10,
        };
        assert_eq!(store.alerts(&alice(), unread).unwrap().len(), 2);
        assert_eq!(store.mark_all_read(&alice()).unwrap(), 2);
        assert!(store.alerts(&alice(), unread).unwrap().is_empty());
        assert_eq!(store.mark_all_read(&alice()).unwrap(), 0);
    }

    #[test]
    fn test_alerts_are_newest_first_and_limited() {
        let mut store = MemoryStore::new();
        let pref = store.save_preference(&alice(), &draft("Seoul")).unwrap();
        for hour in 8..12 {
            store
                .record_check(&alice(), pref.id, &observation(hour), &[heat_alert()])
                .unwrap();
        }

        let alerts = store
            .alerts(
                &alice(),
                AlertFilter {
                    unread_only: false,
                    limit: 2,
                },
            )
            .unwrap();
        assert_eq!(alerts.len(), 2);
        assert!(alerts[0].id > alerts[1].id);
        assert!(store.alerts(&bob(), AlertFilter::default()).unwrap().is_empty());
    }
}
