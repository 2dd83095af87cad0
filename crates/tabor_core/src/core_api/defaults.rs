use std::collections::BTreeMap;

use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::property::PropertyValue;

use super::error::{CoreError, CoreErrorCode};

/// Values a save implies for settings that have no record on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefaultSettings {
    values: BTreeMap<String, PropertyValue>,
}

impl DefaultSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults for the Ghosts of Tabor `PlayerSettings` save.
    pub fn ghosts_of_tabor() -> Self {
        let mut defaults = Self::new();
        defaults.insert("bFullBodyIK", PropertyValue::Bool(true));
        defaults.insert("bHoldCrouchToOpenMenu", PropertyValue::Bool(true));
        defaults.insert("bUsingPhysicalGunstock", PropertyValue::Bool(false));
        defaults
    }

    /// Parse a JSON object of `name -> default value`.
    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        let object: JsonMap<String, JsonValue> = serde_json::from_str(text).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Parse,
                format!("defaults must be a JSON object of name to value: {e}"),
            )
        })?;

        let mut defaults = Self::new();
        for (name, value) in &object {
            let value = PropertyValue::from_json(value).map_err(|e| {
                CoreError::new(e.code, format!("default for {name:?}: {}", e.message))
            })?;
            defaults.insert(name.clone(), value);
        }
        Ok(defaults)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
