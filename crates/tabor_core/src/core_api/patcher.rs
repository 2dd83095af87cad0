use log::{debug, info};

use crate::layout::ByteRange;
use crate::property::{self, ExistingRecord, PropertyRecord, PropertyValue};
use crate::scan;

use super::defaults::DefaultSettings;
use super::error::{CoreError, CoreErrorCode};
use super::request::{RequestedSetting, SettingsRequest};
use super::types::{InsertionOrder, PatchPlan, SettingAction, SettingOutcome};

/// Class name that precedes the settings records in a `PlayerSettings` save.
pub const SAVE_ANCHOR: &str = "BP_Ghosts_SettingsSave_C";

/// Inserts non-default setting records after the save's anchor marker.
///
/// Records already on disk are never edited, and settings that are absent and
/// requested at their default value are left implicit.
#[derive(Debug, Clone)]
pub struct SavePatcher {
    defaults: DefaultSettings,
    anchor: String,
    order: InsertionOrder,
}

impl Default for SavePatcher {
    fn default() -> Self {
        Self::new(DefaultSettings::ghosts_of_tabor())
    }
}

impl SavePatcher {
    pub fn new(defaults: DefaultSettings) -> Self {
        Self {
            defaults,
            anchor: SAVE_ANCHOR.to_string(),
            order: InsertionOrder::default(),
        }
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = anchor.into();
        self
    }

    pub fn with_order(mut self, order: InsertionOrder) -> Self {
        self.order = order;
        self
    }

    pub fn defaults(&self) -> &DefaultSettings {
        &self.defaults
    }

    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    pub fn order(&self) -> InsertionOrder {
        self.order
    }

    /// Span of the first null-terminated anchor in `buffer`.
    pub fn locate_anchor(&self, buffer: &[u8]) -> Result<ByteRange, CoreError> {
        let needle = scan::null_terminated(&self.anchor);
        scan::find(buffer, &needle)
            .map(|start| ByteRange::at(start, needle.len()))
            .ok_or_else(|| {
                CoreError::new(
                    CoreErrorCode::AnchorNotFound,
                    format!("anchor {:?} not found in save data", self.anchor),
                )
            })
    }

    /// Decide what to do with each requested setting without touching `buffer`.
    pub fn plan(&self, buffer: &[u8], request: &SettingsRequest) -> Result<PatchPlan, CoreError> {
        let resolved = request
            .iter()
            .map(|(name, setting)| {
                self.defaults
                    .get(name)
                    .map(|default| (name, setting, default))
                    .ok_or_else(|| {
                        CoreError::new(
                            CoreErrorCode::UnknownSettingName,
                            format!("no default is known for setting {name:?}"),
                        )
                    })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        let anchor = self.locate_anchor(buffer)?;
        debug!(
            "anchor {:?} at {}..{}",
            self.anchor, anchor.start, anchor.end
        );

        let mut outcomes = Vec::with_capacity(resolved.len());
        for (name, setting, default) in resolved {
            let action = plan_setting(buffer, name, setting, default)?;
            debug!("{name}: {}", action.as_str());
            outcomes.push(SettingOutcome {
                name: name.to_string(),
                requested: setting.clone(),
                action,
            });
        }

        Ok(PatchPlan {
            anchor,
            insertion_offset: anchor.end,
            outcomes,
        })
    }

    /// Patched copy of `buffer`, or `None` when no record had to be inserted.
    pub fn patch(
        &self,
        buffer: &[u8],
        request: &SettingsRequest,
    ) -> Result<Option<Vec<u8>>, CoreError> {
        let plan = self.plan(buffer, request)?;
        let patched = plan.apply(buffer, self.order)?;
        match &patched {
            Some(bytes) => info!(
                "inserted {} record(s), {} -> {} bytes",
                plan.insertions().count(),
                buffer.len(),
                bytes.len()
            ),
            None => info!("save already matches requested settings"),
        }
        Ok(patched)
    }
}

fn plan_setting(
    buffer: &[u8],
    name: &str,
    setting: &RequestedSetting,
    default: &PropertyValue,
) -> Result<SettingAction, CoreError> {
    property::validate_name("key", name)?;
    let needle = scan::null_terminated(name);
    if let Some(key_offset) = scan::find(buffer, &needle) {
        let record = match ExistingRecord::read_at(buffer, key_offset) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("{name}: could not describe existing record: {e}");
                None
            }
        };
        return Ok(SettingAction::KeepExisting { key_offset, record });
    }

    if setting.value.matches_default(default) {
        return Ok(SettingAction::AlreadyDefault);
    }

    PropertyRecord::new(name, setting.type_tag.as_str(), setting.value.clone())
        .map(SettingAction::Insert)
        .map_err(|e| CoreError::new(e.code, format!("setting {name:?}: {}", e.message)))
}

/// Patch `buffer` with the default anchor and insertion order.
pub fn patch_settings(
    buffer: &[u8],
    request: &SettingsRequest,
    defaults: &DefaultSettings,
) -> Result<Option<Vec<u8>>, CoreError> {
    SavePatcher::new(defaults.clone()).patch(buffer, request)
}
