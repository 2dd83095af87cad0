use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDateTime;

use crate::core_api::{CoreError, CoreErrorCode};

pub const SAVE_FILE_PREFIX: &str = "PlayerSettings";
pub const SAVE_FILE_EXTENSION: &str = "sav";
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

const SAVE_DIR_COMPONENTS: [&str; 3] = ["GhostsOfTabor", "Saved", "SaveGames"];

/// `%LOCALAPPDATA%\GhostsOfTabor\Saved\SaveGames`, when `LOCALAPPDATA` is set.
pub fn default_save_dir() -> Option<PathBuf> {
    let base = env::var_os("LOCALAPPDATA")?;
    Some(save_dir_under(Path::new(&base)))
}

pub fn save_dir_under(local_app_data: &Path) -> PathBuf {
    SAVE_DIR_COMPONENTS
        .iter()
        .fold(local_app_data.to_path_buf(), |path, part| path.join(part))
}

/// Whether `path` names a `PlayerSettings*.sav` file.
pub fn is_settings_save(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let has_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SAVE_FILE_EXTENSION));
    name.starts_with(SAVE_FILE_PREFIX) && has_extension
}

/// Most recently modified `PlayerSettings*.sav` in `dir`.
pub fn find_newest_settings_file(dir: &Path) -> Result<Option<PathBuf>, CoreError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        CoreError::new(
            CoreErrorCode::Io,
            format!("failed to list {}: {e}", dir.display()),
        )
    })?;

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("failed to list {}: {e}", dir.display()),
            )
        })?;
        let path = entry.path();
        if !path.is_file() || !is_settings_save(&path) {
            continue;
        }
        let modified = entry.metadata().and_then(|m| m.modified()).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("failed to read modification time of {}: {e}", path.display()),
            )
        })?;
        if newest.as_ref().is_none_or(|(best, _)| modified >= *best) {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

/// `{save_file_name}_{YYYYmmddHHMMSS}.bak`
pub fn backup_file_name(save_file_name: &str, at: NaiveDateTime) -> String {
    format!(
        "{save_file_name}_{}.bak",
        at.format(BACKUP_TIMESTAMP_FORMAT)
    )
}

/// Backup path next to `save_path`.
pub fn backup_path(save_path: &Path, at: NaiveDateTime) -> Result<PathBuf, CoreError> {
    let name = save_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("save path {} has no usable file name", save_path.display()),
            )
        })?;
    Ok(save_path.with_file_name(backup_file_name(name, at)))
}
