use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::property::PropertyValue;

use super::error::{CoreError, CoreErrorCode};

/// Desired type tag and value for one setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedSetting {
    pub type_tag: String,
    pub value: PropertyValue,
}

impl RequestedSetting {
    pub fn new(type_tag: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            type_tag: type_tag.into(),
            value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSetting {
    #[serde(rename = "type")]
    type_tag: String,
    value: JsonValue,
}

/// Settings to apply, in the order they were requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsRequest {
    entries: Vec<(String, RequestedSetting)>,
}

impl SettingsRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `PlayerSettings.json` document:
    /// `{"name": {"type": "BoolProperty", "value": true}, ...}`.
    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        let object: JsonMap<String, JsonValue> = serde_json::from_str(text).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Parse,
                format!("settings must be a JSON object keyed by setting name: {e}"),
            )
        })?;

        let mut request = Self::new();
        for (name, raw) in object {
            let raw: RawSetting = serde_json::from_value(raw).map_err(|e| {
                CoreError::new(CoreErrorCode::Parse, format!("setting {name:?}: {e}"))
            })?;
            let value = PropertyValue::from_json(&raw.value).map_err(|e| {
                CoreError::new(e.code, format!("setting {name:?}: {}", e.message))
            })?;
            request.push(name, RequestedSetting::new(raw.type_tag, value));
        }
        Ok(request)
    }

    /// Append a setting. A repeated name replaces the earlier entry in place.
    pub fn push(&mut self, name: impl Into<String>, setting: RequestedSetting) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = setting,
            None => self.entries.push((name, setting)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RequestedSetting)> {
        self.entries
            .iter()
            .map(|(name, setting)| (name.as_str(), setting))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
