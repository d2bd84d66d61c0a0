//! Persisted configuration store.
//!
//! A [`Settings`] instance holds typed values for the keys of one [`Schema`],
//! notifies subscribers when a value changes, and loads/saves itself as JSON.
//! It lives on the host event loop and is shared by reference (`Rc`); nodes
//! never own it.

mod json_storage;
pub mod schema;

pub use schema::{keys, limiter_schema, Schema, SettingKind, SettingSpec};

use autolimit_types::{PropertyValue, ValueType};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Error type for settings operations.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Unknown key: {0}")]
    UnknownKey(String),

    #[error("Key {key} expects {expected:?}, got {found:?}")]
    TypeMismatch {
        key: String,
        expected: ValueType,
        found: ValueType,
    },

    #[error("Value {value} is out of range for key {key}")]
    OutOfRange { key: String, value: PropertyValue },

    #[error("Cannot parse '{text}' as a value for key {key}")]
    Parse { key: String, text: String },

    #[error("Settings file belongs to schema '{found}', expected '{expected}'")]
    SchemaMismatch { expected: String, found: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Handle of a change subscription, see [`Settings::connect_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SettingsHandlerId(u64);

type ChangeHandler = dyn Fn(&str, &PropertyValue);

struct Subscription {
    id: SettingsHandlerId,
    key: Option<String>,
    handler: Rc<ChangeHandler>,
    active: Rc<Cell<bool>>,
}

/// Typed key/value store with change notification.
pub struct Settings {
    schema: Schema,
    values: RefCell<HashMap<&'static str, PropertyValue>>,
    subscriptions: RefCell<Vec<Subscription>>,
    next_id: Cell<u64>,
}

impl Settings {
    /// Create a store with every key at its default.
    pub fn new(schema: Schema) -> Self {
        let values = schema.iter().map(|spec| (spec.key, spec.default)).collect();
        Self {
            schema,
            values: RefCell::new(values),
            subscriptions: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    /// Create a store and apply the values persisted at `path`.
    ///
    /// Unknown keys and invalid values in the file are skipped with a warning.
    pub fn load(schema: Schema, path: impl AsRef<Path>) -> Result<Self> {
        let settings = Self::new(schema);
        let Some(stored) = json_storage::read(path.as_ref())? else {
            return Ok(settings);
        };

        if stored.schema != settings.schema.id() {
            return Err(SettingsError::SchemaMismatch {
                expected: settings.schema.id().to_string(),
                found: stored.schema,
            });
        }

        let mut applied = 0;
        for (key, value) in &stored.values {
            match settings.checked(key, value) {
                Ok((key, value)) => {
                    settings.values.borrow_mut().insert(key, value);
                    applied += 1;
                }
                Err(e) => warn!("Skipping stored setting {}: {}", key, e),
            }
        }
        info!("Loaded {} settings from {:?}", applied, path.as_ref());

        Ok(settings)
    }

    /// Persist every key that differs from its default.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let values: BTreeMap<String, PropertyValue> = self
            .schema
            .iter()
            .filter(|spec| !self.is_default(spec.key))
            .map(|spec| (spec.key.to_string(), self.value_of(spec.key)))
            .collect();

        json_storage::write(
            path.as_ref(),
            &json_storage::StorageFormat::new(self.schema.id(), values),
        )?;
        info!("Saved settings to {:?}", path.as_ref());
        Ok(())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn spec(&self, key: &str) -> Result<&SettingSpec> {
        self.schema
            .get(key)
            .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))
    }

    pub fn get(&self, key: &str) -> Result<PropertyValue> {
        let spec = self.spec(key)?;
        Ok(self.value_of(spec.key))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get(key)?;
        value.as_bool().ok_or_else(|| SettingsError::TypeMismatch {
            key: key.to_string(),
            expected: ValueType::Bool,
            found: value.value_type(),
        })
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        let value = self.get(key)?;
        match value {
            PropertyValue::Int(i) => Ok(i),
            other => Err(SettingsError::TypeMismatch {
                key: key.to_string(),
                expected: ValueType::Int,
                found: other.value_type(),
            }),
        }
    }

    pub fn get_double(&self, key: &str) -> Result<f64> {
        let value = self.get(key)?;
        value.as_f64().ok_or_else(|| SettingsError::TypeMismatch {
            key: key.to_string(),
            expected: ValueType::Float,
            found: value.value_type(),
        })
    }

    /// Write a key. Subscribers are notified only when the value changes.
    pub fn set(&self, key: &str, value: impl Into<PropertyValue>) -> Result<()> {
        let (key, value) = self.checked(key, &value.into())?;

        let previous = self.values.borrow_mut().insert(key, value);
        if previous == Some(value) {
            return Ok(());
        }
        debug!("Setting {} = {}", key, value);
        self.emit_changed(key, &value);
        Ok(())
    }

    /// Restore a key to its schema default.
    pub fn reset(&self, key: &str) -> Result<()> {
        let default = self.spec(key)?.default;
        self.set(key, default)
    }

    /// Restore every key to its default.
    pub fn reset_all(&self) {
        let keys: Vec<&'static str> = self.schema.iter().map(|spec| spec.key).collect();
        for key in keys {
            if let Err(e) = self.reset(key) {
                warn!("Failed to reset {}: {}", key, e);
            }
        }
    }

    pub fn is_default(&self, key: &str) -> bool {
        self.schema
            .get(key)
            .is_some_and(|spec| self.value_of(spec.key) == spec.default)
    }

    /// Every key with its current value, in schema order.
    pub fn entries(&self) -> Vec<(&'static str, PropertyValue)> {
        self.schema
            .iter()
            .map(|spec| (spec.key, self.value_of(spec.key)))
            .collect()
    }

    /// Subscribe to changes of one key, or of every key when `key` is `None`.
    pub fn connect_changed<F>(&self, key: Option<&str>, handler: F) -> SettingsHandlerId
    where
        F: Fn(&str, &PropertyValue) + 'static,
    {
        let id = SettingsHandlerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscriptions.borrow_mut().push(Subscription {
            id,
            key: key.map(str::to_string),
            handler: Rc::new(handler),
            active: Rc::new(Cell::new(true)),
        });
        id
    }

    /// Remove a subscription. Its handler is never called again, even by a
    /// change that is already being dispatched.
    pub fn disconnect(&self, id: SettingsHandlerId) -> bool {
        let mut subscriptions = self.subscriptions.borrow_mut();
        let Some(index) = subscriptions.iter().position(|s| s.id == id) else {
            return false;
        };
        let subscription = subscriptions.remove(index);
        subscription.active.set(false);
        true
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    fn value_of(&self, key: &str) -> PropertyValue {
        self.values
            .borrow()
            .get(key)
            .copied()
            .or_else(|| self.schema.get(key).map(|spec| spec.default))
            .unwrap_or(PropertyValue::Bool(false))
    }

    fn checked(&self, key: &str, value: &PropertyValue) -> Result<(&'static str, PropertyValue)> {
        let spec = self.spec(key)?;
        Ok((spec.key, spec.kind.check(spec.key, value)?))
    }

    fn emit_changed(&self, key: &str, value: &PropertyValue) {
        let targets: Vec<(Rc<ChangeHandler>, Rc<Cell<bool>>)> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|s| s.key.as_deref().is_none_or(|k| k == key))
            .map(|s| (s.handler.clone(), s.active.clone()))
            .collect();

        for (handler, active) in targets {
            if active.get() {
                handler(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings() -> Settings {
        Settings::new(limiter_schema())
    }

    #[test]
    fn test_starts_at_defaults() {
        let settings = settings();
        assert_eq!(settings.get_double(keys::INPUT_GAIN).unwrap(), 0.0);
        assert_eq!(settings.get_int(keys::AUTOVOLUME_TARGET).unwrap(), -12);
        assert!(!settings.get_bool(keys::POST_MESSAGES).unwrap());
        assert!(settings.is_default(keys::LIMIT));
    }

    #[test]
    fn test_unknown_key() {
        let settings = settings();
        assert!(matches!(
            settings.get("no-such-key"),
            Err(SettingsError::UnknownKey(_))
        ));
        assert!(settings.set("no-such-key", 1.0).is_err());
    }

    #[test]
    fn test_set_rejects_out_of_range_and_keeps_value() {
        let settings = settings();
        assert!(settings.set(keys::INPUT_GAIN, 50.0).is_err());
        assert_eq!(settings.get_double(keys::INPUT_GAIN).unwrap(), 0.0);
    }

    #[test]
    fn test_change_notification_only_on_change() {
        let settings = settings();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        settings.connect_changed(Some(keys::LIMIT), move |key, value| {
            sink.borrow_mut().push((key.to_string(), *value));
        });

        settings.set(keys::LIMIT, -3.0).unwrap();
        settings.set(keys::LIMIT, -3.0).unwrap();
        settings.set(keys::RELEASE, 80.0).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![(keys::LIMIT.to_string(), PropertyValue::Float(-3.0))]
        );
    }

    #[test]
    fn test_wildcard_subscription_and_disconnect() {
        let settings = settings();
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        let id = settings.connect_changed(None, move |_, _| counter.set(counter.get() + 1));

        settings.set(keys::ASC, true).unwrap();
        settings.set(keys::OVERSAMPLING, 2_i64).unwrap();
        assert_eq!(count.get(), 2);

        assert!(settings.disconnect(id));
        assert!(!settings.disconnect(id));
        settings.set(keys::ASC, false).unwrap();
        assert_eq!(count.get(), 2);
        assert_eq!(settings.subscription_count(), 0);
    }

    #[test]
    fn test_handler_may_write_other_keys() {
        let settings = Rc::new(settings());
        let inner = Rc::downgrade(&settings);
        settings.connect_changed(Some(keys::LIMIT), move |_, value| {
            if let Some(settings) = inner.upgrade() {
                settings.set(keys::INPUT_GAIN, value.as_f64().unwrap()).unwrap();
            }
        });

        settings.set(keys::LIMIT, -6.0).unwrap();
        assert_eq!(settings.get_double(keys::INPUT_GAIN).unwrap(), -6.0);
    }

    #[test]
    fn test_reset() {
        let settings = settings();
        settings.set(keys::AUTOVOLUME_TARGET, -23_i64).unwrap();
        settings.reset(keys::AUTOVOLUME_TARGET).unwrap();
        assert!(settings.is_default(keys::AUTOVOLUME_TARGET));

        settings.set(keys::ASC, true).unwrap();
        settings.set(keys::LIMIT, -1.0).unwrap();
        settings.reset_all();
        assert!(settings.entries().iter().all(|(key, _)| settings.is_default(key)));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("limiter.json");

        let settings = settings();
        settings.set(keys::INPUT_GAIN, -4.5).unwrap();
        settings.set(keys::AUTOVOLUME_TARGET, -23_i64).unwrap();
        settings.set(keys::POST_MESSAGES, true).unwrap();
        settings.save(&path).unwrap();

        let loaded = Settings::load(limiter_schema(), &path).unwrap();
        assert_eq!(loaded.get_double(keys::INPUT_GAIN).unwrap(), -4.5);
        assert_eq!(loaded.get_int(keys::AUTOVOLUME_TARGET).unwrap(), -23);
        assert!(loaded.get_bool(keys::POST_MESSAGES).unwrap());
        assert!(loaded.is_default(keys::RELEASE));
    }

    #[test]
    fn test_only_non_default_values_are_written() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("limiter.json");

        let settings = settings();
        settings.set(keys::RELEASE, 120.0).unwrap();
        settings.save(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let values = json["values"].as_object().unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values["release"], serde_json::json!(120.0));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = Settings::load(limiter_schema(), temp_dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_default(keys::INPUT_GAIN));
    }

    #[test]
    fn test_load_skips_invalid_entries() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("limiter.json");
        std::fs::write(
            &path,
            r#"{"version":1,"schema":"limiter","values":{"input-gain":99.0,"bogus":1,"limit":-2.0}}"#,
        )
        .unwrap();

        let loaded = Settings::load(limiter_schema(), &path).unwrap();
        assert!(loaded.is_default(keys::INPUT_GAIN));
        assert_eq!(loaded.get_double(keys::LIMIT).unwrap(), -2.0);
    }

    #[test]
    fn test_load_rejects_other_schema() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("limiter.json");
        std::fs::write(&path, r#"{"version":1,"schema":"compressor","values":{}}"#).unwrap();

        assert!(matches!(
            Settings::load(limiter_schema(), &path),
            Err(SettingsError::SchemaMismatch { .. })
        ));
    }
}
