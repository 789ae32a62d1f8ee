use crate::error::SettingsError;
use crate::settings::{Settings, SettingsPatch};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

pub type SettingsListener = Box<dyn Fn(&SettingsPatch) + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Key/value view over the persisted configuration with change
/// notifications. How values are persisted and how notifications travel is
/// up to the implementation.
pub trait ConfigStore {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, SettingsError>;

    /// Validates and stores `values` as a single update. Nothing is stored
    /// when any value is rejected.
    fn set(&mut self, values: Map<String, Value>) -> Result<(), SettingsError>;

    fn subscribe(&mut self, listener: SettingsListener) -> SubscriptionId;

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool;
}

pub struct MemoryConfigStore {
    settings: Settings,
    listeners: Vec<(SubscriptionId, SettingsListener)>,
    next_id: u64,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, SettingsError> {
        let mut all = self.settings.to_map()?;
        Ok(keys
            .iter()
            .filter_map(|&key| all.remove(key).map(|value| (key.to_string(), value)))
            .collect())
    }

    fn set(&mut self, values: Map<String, Value>) -> Result<(), SettingsError> {
        let patch = SettingsPatch::from_map(&values)?;
        let next = patch.apply_to(&self.settings).inspect_err(|err| {
            log::warn!("settings update rejected: {err}");
        })?;
        self.settings = next;

        for (_, listener) in &self.listeners {
            listener(&patch);
        }
        Ok(())
    }

    fn subscribe(&mut self, listener: SettingsListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }
}

/// Mailbox between a settings listener and the frame loop. Listeners push
/// from any thread; the drive loop drains once per frame.
#[derive(Debug, Clone, Default)]
pub struct SettingsInbox {
    pending: Arc<Mutex<Vec<SettingsPatch>>>,
}

impl SettingsInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, patch: SettingsPatch) {
        match self.pending.lock() {
            Ok(mut pending) => pending.push(patch),
            Err(poisoned) => poisoned.into_inner().push(patch),
        }
    }

    /// Listener that forwards every accepted store update into this inbox.
    pub fn listener(&self) -> SettingsListener {
        let inbox = self.clone();
        Box::new(move |patch: &SettingsPatch| inbox.push(patch.clone()))
    }

    /// Takes every queued patch folded into one, oldest first.
    pub fn take(&self) -> Option<SettingsPatch> {
        let drained = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        drained.into_iter().reduce(|mut merged, later| {
            merged.merge(later);
            merged
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::VehicleId;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn values(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn get_returns_requested_keys_only() {
        let store = MemoryConfigStore::new();
        let got = store.get(&["maxSpeed", "vehicleId", "nonsense"]).unwrap();

        assert_eq!(got.len(), 2);
        assert_eq!(got["maxSpeed"], json!(25.0));
        assert_eq!(got["vehicleId"], json!("car-sedan"));
    }

    #[test]
    fn set_validates_then_notifies() {
        let mut store = MemoryConfigStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        store.subscribe(Box::new(move |patch: &SettingsPatch| {
            assert_eq!(patch.max_speed, Some(30.0));
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        store.set(values(json!({ "maxSpeed": 30 }))).unwrap();
        assert_eq!(store.settings().max_speed, 30.0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejected_set_keeps_previous_settings_and_stays_quiet() {
        let mut store = MemoryConfigStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        store.subscribe(Box::new(move |_: &SettingsPatch| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let result = store.set(values(json!({ "maxSpeed": 40, "dragCoefficient": -1 })));
        assert!(matches!(
            result,
            Err(SettingsError::InvalidValue { key: "dragCoefficient", .. })
        ));
        assert_eq!(store.settings(), &Settings::default());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let mut store = MemoryConfigStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = store.subscribe(Box::new(move |_: &SettingsPatch| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.set(values(json!({ "volume": 0.1 }))).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn inbox_folds_queued_patches() {
        let mut store = MemoryConfigStore::new();
        let inbox = SettingsInbox::new();
        store.subscribe(inbox.listener());

        store.set(values(json!({ "volume": 0.1, "vehicleId": "car-sport" }))).unwrap();
        store.set(values(json!({ "volume": 0.3 }))).unwrap();

        let merged = inbox.take().unwrap();
        assert_eq!(merged.volume, Some(0.3));
        assert_eq!(merged.vehicle_id, Some(VehicleId::CarSport));
        assert!(inbox.take().is_none());
    }
}
