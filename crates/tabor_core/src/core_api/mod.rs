mod defaults;
mod error;
mod patcher;
mod request;
mod types;

pub use defaults::DefaultSettings;
pub use error::{CoreError, CoreErrorCode};
pub use patcher::{SAVE_ANCHOR, SavePatcher, patch_settings};
pub use request::{RequestedSetting, SettingsRequest};
pub use types::{InsertionOrder, PatchPlan, SettingAction, SettingOutcome};
