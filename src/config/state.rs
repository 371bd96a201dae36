//! Live state tree shared between the front-end and the device loops
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::watch;

use super::{Config, LoadError};

/// Recursively merge `delta` into `base`. Objects merge key by key, anything
/// else replaces the old value. A `null` in the delta removes the key.
pub fn deep_merge(base: &mut Value, delta: &Value) {
    match (base, delta) {
        (Value::Object(base), Value::Object(delta)) => {
            for (key, value) in delta {
                if value.is_null() {
                    base.remove(key);
                    continue;
                }
                match base.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, delta) => *base = delta.clone(),
    }
}

/// The live configuration. Updates are validated against [Config] before
/// they are accepted and published to every subscriber.
#[derive(Debug, Clone)]
pub struct State {
    config: Arc<Mutex<Config>>,
    tx: watch::Sender<u64>,
}

impl State {
    pub fn new(config: Config) -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            config: Arc::new(Mutex::new(config)),
            tx,
        }
    }

    /// Snapshot of the current config
    pub fn config(&self) -> Config {
        match self.config.lock() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn value(&self) -> Result<Value, LoadError> {
        self.config().to_value()
    }

    /// Merge a partial tree into the state. Returns the new config.
    pub fn merge(&self, delta: &Value) -> Result<Config, LoadError> {
        let mut value = self.value()?;
        deep_merge(&mut value, delta);
        let config = Config::from_value(value)?;
        self.replace(config.clone());
        Ok(config)
    }

    /// Replace the state, notifying subscribers if anything changed
    pub fn replace(&self, config: Config) {
        let changed = {
            let mut current = match self.config.lock() {
                Ok(current) => current,
                Err(poisoned) => poisoned.into_inner(),
            };
            let changed = *current != config;
            *current = config;
            changed
        };
        if changed {
            self.tx.send_modify(|rev| *rev = rev.wrapping_add(1));
        }
    }

    /// Receiver that is notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::Emulation;

    #[test]
    fn merge_nested() {
        let mut base = json!({"a": {"b": 1, "c": 2}, "d": [1, 2]});
        deep_merge(&mut base, &json!({"a": {"c": 3, "e": 4}, "d": [3]}));
        assert_eq!(base, json!({"a": {"b": 1, "c": 3, "e": 4}, "d": [3]}));

        deep_merge(&mut base, &json!({"a": null}));
        assert_eq!(base, json!({"d": [3]}));
    }

    #[test]
    fn state_merge_notifies() -> Result<(), Box<dyn std::error::Error>> {
        let state = State::new(Config::default());
        let mut rx = state.subscribe();

        let config = state.merge(&json!({"controller": {"emulation": "xbox"}}))?;
        assert_eq!(config.controller.emulation, Emulation::Xbox);
        assert!(rx.has_changed()?);
        rx.mark_unchanged();

        // Same value again does not notify
        state.merge(&json!({"controller": {"emulation": "xbox"}}))?;
        assert!(!rx.has_changed()?);

        // Invalid values are rejected and leave the state untouched
        assert!(state.merge(&json!({"http": {"port": "abc"}})).is_err());
        assert_eq!(state.config().http.port, 5335);
        Ok(())
    }
}
