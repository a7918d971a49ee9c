//! Specialist key to remote handler lookup.

use scholar_common::{Result, ScholarError};
use std::collections::BTreeMap;
use tracing::warn;

use crate::config::AssistantsConfig;

/// Read-only map from specialist key (`"mat-ass"`) to remote handler id.
#[derive(Debug, Clone, Default)]
pub struct SpecialistRegistry {
    handlers: BTreeMap<String, String>,
}

impl SpecialistRegistry {
    pub fn new(handlers: BTreeMap<String, String>) -> Self {
        let registry = Self { handlers };
        for (handler, keys) in registry.shared_handlers() {
            warn!(
                handler = %handler,
                keys = ?keys,
                "Several specialist keys resolve to the same handler"
            );
        }
        registry
    }

    pub fn from_config(config: &AssistantsConfig) -> Self {
        Self::new(config.specialists.clone())
    }

    /// Handler id for `key`, or a validation error naming the known keys.
    pub fn resolve(&self, key: &str) -> Result<&str> {
        self.handlers.get(key).map(String::as_str).ok_or_else(|| {
            ScholarError::Validation(format!(
                "Unknown specialist '{key}'. Known specialists: {}",
                self.keys().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler ids claimed by more than one key, with the keys claiming them.
    pub fn shared_handlers(&self) -> Vec<(String, Vec<String>)> {
        let mut by_handler: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (key, handler) in &self.handlers {
            by_handler.entry(handler.as_str()).or_default().push(key.clone());
        }
        by_handler
            .into_iter()
            .filter(|(_, keys)| keys.len() > 1)
            .map(|(handler, keys)| (handler.to_string(), keys))
            .collect()
    }
}
