use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

const ANCHOR: &[u8] = b"BP_Ghosts_SettingsSave_C\0";
const GUNSTOCK_RECORD: &[u8] = b"\x17\x00\x00\x00bUsingPhysicalGunstock\x00\r\x00\x00\x00BoolProperty\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\x00";
const ENABLE_GUNSTOCK: &str =
    r#"{"bUsingPhysicalGunstock": {"type": "BoolProperty", "value": true}}"#;

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_tabor-settings"))
        .args(args)
        .env_remove("LOCALAPPDATA")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run tabor-settings CLI")
}

fn temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}_{}_{}", std::process::id(), nanos));
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

fn sample_save() -> Vec<u8> {
    let mut bytes = b"GVAS".to_vec();
    bytes.extend_from_slice(&[0x11; 96]);
    bytes.extend_from_slice(ANCHOR);
    bytes.extend_from_slice(b"\x05\x00\x00\x00None\x00");
    bytes
}

fn write_fixture(dir: &Path, settings: &str) -> (PathBuf, PathBuf) {
    let save = dir.join("PlayerSettings.sav");
    let json = dir.join("PlayerSettings.json");
    fs::write(&save, sample_save()).expect("write save fixture");
    fs::write(&json, settings).expect("write settings fixture");
    (save, json)
}

fn backups_in(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .expect("list temp dir")
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "bak"))
        .collect()
}

fn as_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[test]
fn cli_patches_in_place_and_keeps_backup() {
    let dir = temp_dir("tabor_cli_in_place");
    let (save, json) = write_fixture(&dir, ENABLE_GUNSTOCK);

    let output = run_cli(&["--save", &as_str(&save), "--settings", &as_str(&json)]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("bUsingPhysicalGunstock: insert BoolProperty = true"));
    assert!(stdout.contains("Modified file saved to"));

    let original = sample_save();
    let patched = fs::read(&save).expect("read patched save");
    let insert_at = 100 + ANCHOR.len();
    assert_eq!(patched.len(), original.len() + GUNSTOCK_RECORD.len());
    assert_eq!(
        &patched[insert_at..insert_at + GUNSTOCK_RECORD.len()],
        GUNSTOCK_RECORD
    );

    let backups = backups_in(&dir);
    assert_eq!(backups.len(), 1);
    assert_eq!(fs::read(&backups[0]).expect("read backup"), original);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn cli_reports_no_change_without_writing() {
    let dir = temp_dir("tabor_cli_unchanged");
    let (save, json) = write_fixture(
        &dir,
        r#"{"bUsingPhysicalGunstock": {"type": "BoolProperty", "value": false}}"#,
    );

    let output = run_cli(&["--save", &as_str(&save), "--settings", &as_str(&json)]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("bUsingPhysicalGunstock: already default (false)"));
    assert!(stdout.contains("No changes needed"));

    assert_eq!(fs::read(&save).expect("read save"), sample_save());
    assert!(backups_in(&dir).is_empty());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn cli_dry_run_json_leaves_file_untouched() {
    let dir = temp_dir("tabor_cli_dry_run");
    let (save, json) = write_fixture(&dir, ENABLE_GUNSTOCK);

    let output = run_cli(&[
        "--save",
        &as_str(&save),
        "--settings",
        &as_str(&json),
        "--dry-run",
        "--json",
    ]);
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(report["changed"], Value::Bool(true));
    assert_eq!(report["dry_run"], Value::Bool(true));
    assert_eq!(report["anchor_offset"], Value::from(100));
    assert_eq!(report["inserted_bytes"], Value::from(GUNSTOCK_RECORD.len()));
    assert_eq!(report["settings"][0]["action"], "insert");
    assert_eq!(report["settings"][0]["value"], Value::Bool(true));

    assert_eq!(fs::read(&save).expect("read save"), sample_save());
    assert!(backups_in(&dir).is_empty());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn cli_writes_to_output_path_without_backup() {
    let dir = temp_dir("tabor_cli_output");
    let (save, json) = write_fixture(&dir, ENABLE_GUNSTOCK);
    let out = dir.join("patched.out");

    let output = run_cli(&[
        "--save",
        &as_str(&save),
        "--settings",
        &as_str(&json),
        "--output",
        &as_str(&out),
    ]);
    assert!(output.status.success());

    assert_eq!(fs::read(&save).expect("read save"), sample_save());
    assert_eq!(
        fs::read(&out).expect("read output").len(),
        sample_save().len() + GUNSTOCK_RECORD.len()
    );
    assert!(backups_in(&dir).is_empty());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn cli_picks_save_from_directory() {
    let dir = temp_dir("tabor_cli_save_dir");
    let (save, json) = write_fixture(&dir, ENABLE_GUNSTOCK);

    let output = run_cli(&[
        "--save-dir",
        &as_str(&dir),
        "--settings",
        &as_str(&json),
        "--no-backup",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(fs::read(&save).expect("read save").len() > sample_save().len());
    assert!(backups_in(&dir).is_empty());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn cli_rejects_unknown_setting() {
    let dir = temp_dir("tabor_cli_unknown");
    let (save, json) = write_fixture(
        &dir,
        r#"{"bSnapTurn": {"type": "BoolProperty", "value": true}}"#,
    );

    let output = run_cli(&["--save", &as_str(&save), "--settings", &as_str(&json)]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("UnknownSettingName"));
    assert_eq!(fs::read(&save).expect("read save"), sample_save());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn cli_accepts_custom_defaults() {
    let dir = temp_dir("tabor_cli_defaults");
    let (save, json) = write_fixture(
        &dir,
        r#"{"bSnapTurn": {"type": "BoolProperty", "value": true}}"#,
    );
    let defaults = dir.join("defaults.json");
    fs::write(&defaults, r#"{"bSnapTurn": true}"#).expect("write defaults");

    let output = run_cli(&[
        "--save",
        &as_str(&save),
        "--settings",
        &as_str(&json),
        "--defaults",
        &as_str(&defaults),
    ]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No changes needed"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn cli_fails_without_anchor() {
    let dir = temp_dir("tabor_cli_no_anchor");
    let save = dir.join("PlayerSettings.sav");
    let json = dir.join("PlayerSettings.json");
    fs::write(&save, b"not a settings save").expect("write save");
    fs::write(&json, ENABLE_GUNSTOCK).expect("write settings");

    let output = run_cli(&["--save", &as_str(&save), "--settings", &as_str(&json)]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("AnchorNotFound"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn cli_requires_save_location_without_localappdata() {
    let dir = temp_dir("tabor_cli_no_location");
    let json = dir.join("PlayerSettings.json");
    fs::write(&json, ENABLE_GUNSTOCK).expect("write settings");

    let output = run_cli(&["--settings", &as_str(&json)]);
    assert_eq!(output.status.code(), Some(2));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn cli_json_reports_existing_record_span() {
    let dir = temp_dir("tabor_cli_existing");
    let save = dir.join("PlayerSettings.sav");
    let json = dir.join("PlayerSettings.json");
    let mut bytes = sample_save();
    let record_start = 100 + ANCHOR.len();
    bytes.splice(record_start..record_start, GUNSTOCK_RECORD.iter().copied());
    fs::write(&save, &bytes).expect("write save");
    fs::write(&json, ENABLE_GUNSTOCK).expect("write settings");

    let output = run_cli(&["--save", &as_str(&save), "--settings", &as_str(&json), "--json"]);
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    let setting = &report["settings"][0];
    assert_eq!(report["changed"], Value::Bool(false));
    assert_eq!(setting["action"], "keep_existing");
    assert_eq!(setting["current"], Value::Bool(true));
    assert_eq!(setting["record_len"], Value::from(GUNSTOCK_RECORD.len()));
    assert_eq!(setting["record_range"]["start"], Value::from(record_start));
    assert_eq!(
        setting["record_range"]["end"],
        Value::from(record_start + GUNSTOCK_RECORD.len())
    );
    assert_eq!(fs::read(&save).expect("read save"), bytes);

    let _ = fs::remove_dir_all(&dir);
}
