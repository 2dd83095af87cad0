use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use chrono::Local;
use clap::{Parser, ValueEnum};
use log::{LevelFilter, debug, info};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tabor_core::core_api::{
    DefaultSettings, InsertionOrder, PatchPlan, SavePatcher, SettingAction, SettingOutcome,
    SettingsRequest,
};
use tabor_core::discovery;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OrderArg {
    Reversed,
    Request,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Settings document: {"name": {"type": "BoolProperty", "value": true}}
    #[arg(long, value_name = "JSON", default_value = "PlayerSettings.json")]
    settings: PathBuf,
    /// Save file to patch. Defaults to the newest PlayerSettings*.sav in --save-dir.
    #[arg(long, value_name = "FILE", conflicts_with = "save_dir")]
    save: Option<PathBuf>,
    /// Directory searched for PlayerSettings*.sav. Defaults to
    /// %LOCALAPPDATA%\GhostsOfTabor\Saved\SaveGames.
    #[arg(long = "save-dir", value_name = "DIR")]
    save_dir: Option<PathBuf>,
    /// JSON object of setting name to default value, replacing the built-in table.
    #[arg(long, value_name = "JSON")]
    defaults: Option<PathBuf>,
    #[arg(long, value_enum, default_value = "reversed")]
    order: OrderArg,
    /// Write the patched save here instead of over the original.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    #[arg(long = "no-backup")]
    no_backup: bool,
    #[arg(long = "dry-run")]
    dry_run: bool,
    #[arg(long)]
    json: bool,
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let save_path = resolve_save_path(&cli);
    debug!("using save file {}", save_path.display());

    let data = fs::read(&save_path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", save_path.display());
        process::exit(1);
    });

    let settings_text = fs::read_to_string(&cli.settings).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", cli.settings.display());
        process::exit(1);
    });
    let request = SettingsRequest::from_json_str(&settings_text).unwrap_or_else(|e| {
        eprintln!("Error parsing settings file: {}", cli.settings.display());
        eprintln!("  {e}");
        process::exit(1);
    });

    let defaults = match &cli.defaults {
        Some(path) => load_defaults(path),
        None => DefaultSettings::ghosts_of_tabor(),
    };

    let patcher = SavePatcher::new(defaults).with_order(to_core_order(cli.order));
    let plan = patcher.plan(&data, &request).unwrap_or_else(|e| {
        eprintln!("Error planning changes to {}: {e}", save_path.display());
        process::exit(1);
    });

    let patched = plan.apply(&data, patcher.order()).unwrap_or_else(|e| {
        eprintln!("Error creating modified save bytes: {e}");
        process::exit(1);
    });

    if cli.json {
        let report = plan_to_json(&save_path, &plan, patcher.order(), cli.dry_run);
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error rendering JSON output: {e}");
                process::exit(1);
            }
        }
    } else {
        print_plan(&plan);
    }

    let Some(patched) = patched else {
        info!("no changes needed for {}", save_path.display());
        if !cli.json {
            println!("No changes needed");
        }
        return;
    };

    if cli.dry_run {
        if !cli.json {
            println!(
                "Dry run: would insert {} bytes into {}",
                plan.inserted_len(),
                save_path.display()
            );
        }
        return;
    }

    let out_path = cli.output.clone().unwrap_or_else(|| save_path.clone());
    if out_path == save_path && !cli.no_backup {
        let backup = discovery::backup_path(&save_path, Local::now().naive_local())
            .unwrap_or_else(|e| {
                eprintln!("Error naming backup for {}: {e}", save_path.display());
                process::exit(1);
            });
        fs::copy(&save_path, &backup).unwrap_or_else(|e| {
            eprintln!("Error backing up to {}: {e}", backup.display());
            process::exit(1);
        });
        info!("backed up {} to {}", save_path.display(), backup.display());
    }

    fs::write(&out_path, patched).unwrap_or_else(|e| {
        eprintln!("Error writing {}: {e}", out_path.display());
        process::exit(1);
    });
    if !cli.json {
        println!("Modified file saved to {}", out_path.display());
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();
}

fn resolve_save_path(cli: &Cli) -> PathBuf {
    if let Some(path) = &cli.save {
        return path.clone();
    }

    let Some(dir) = cli.save_dir.clone().or_else(discovery::default_save_dir) else {
        eprintln!("--save or --save-dir is required when LOCALAPPDATA is not set");
        process::exit(2);
    };

    match discovery::find_newest_settings_file(&dir) {
        Ok(Some(path)) => path,
        Ok(None) => {
            eprintln!(
                "No {}*.{} file found in {}",
                discovery::SAVE_FILE_PREFIX,
                discovery::SAVE_FILE_EXTENSION,
                dir.display()
            );
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error searching {}: {e}", dir.display());
            process::exit(1);
        }
    }
}

fn load_defaults(path: &Path) -> DefaultSettings {
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", path.display());
        process::exit(1);
    });
    DefaultSettings::from_json_str(&text).unwrap_or_else(|e| {
        eprintln!("Error parsing defaults file: {}", path.display());
        eprintln!("  {e}");
        process::exit(1);
    })
}

fn to_core_order(order: OrderArg) -> InsertionOrder {
    match order {
        OrderArg::Reversed => InsertionOrder::Reversed,
        OrderArg::Request => InsertionOrder::RequestOrder,
    }
}

fn print_plan(plan: &PatchPlan) {
    for outcome in &plan.outcomes {
        println!("{}", describe_outcome(outcome));
    }
}

fn describe_outcome(outcome: &SettingOutcome) -> String {
    let name = &outcome.name;
    let requested = &outcome.requested.value;
    match &outcome.action {
        SettingAction::KeepExisting {
            record: Some(record),
            ..
        } => match &record.value {
            Some(current) => format!("{name}: kept existing record ({current})"),
            None => format!("{name}: kept existing {} record", record.type_tag),
        },
        SettingAction::KeepExisting {
            key_offset,
            record: None,
        } => format!("{name}: kept existing record at offset {key_offset}"),
        SettingAction::AlreadyDefault => format!("{name}: already default ({requested})"),
        SettingAction::Insert(record) => format!(
            "{name}: insert {} = {requested} ({} bytes)",
            record.type_tag(),
            record.encoded_len()
        ),
    }
}

fn plan_to_json(
    save_path: &Path,
    plan: &PatchPlan,
    order: InsertionOrder,
    dry_run: bool,
) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert(
        "save".to_string(),
        JsonValue::String(save_path.display().to_string()),
    );
    out.insert(
        "anchor_offset".to_string(),
        JsonValue::from(plan.anchor.start),
    );
    out.insert(
        "insertion_offset".to_string(),
        JsonValue::from(plan.insertion_offset),
    );
    out.insert(
        "order".to_string(),
        JsonValue::String(order.as_str().to_string()),
    );
    out.insert("changed".to_string(), JsonValue::Bool(plan.has_changes()));
    out.insert("dry_run".to_string(), JsonValue::Bool(dry_run));
    out.insert(
        "inserted_bytes".to_string(),
        JsonValue::from(plan.inserted_len()),
    );
    out.insert(
        "settings".to_string(),
        JsonValue::Array(plan.outcomes.iter().map(outcome_to_json).collect()),
    );
    JsonValue::Object(out)
}

fn outcome_to_json(outcome: &SettingOutcome) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert("name".to_string(), JsonValue::String(outcome.name.clone()));
    out.insert(
        "type".to_string(),
        JsonValue::String(outcome.requested.type_tag.clone()),
    );
    out.insert(
        "value".to_string(),
        serde_json::to_value(&outcome.requested.value).unwrap_or(JsonValue::Null),
    );
    out.insert(
        "action".to_string(),
        JsonValue::String(outcome.action.as_str().to_string()),
    );
    match &outcome.action {
        SettingAction::KeepExisting { key_offset, record } => {
            out.insert("key_offset".to_string(), JsonValue::from(*key_offset));
            if let Some(record) = record {
                out.insert(
                    "current".to_string(),
                    serde_json::to_value(&record.value).unwrap_or(JsonValue::Null),
                );
                out.insert(
                    "record_range".to_string(),
                    serde_json::to_value(record.range).unwrap_or(JsonValue::Null),
                );
                out.insert(
                    "record_len".to_string(),
                    JsonValue::from(record.range.len()),
                );
            }
        }
        SettingAction::Insert(record) => {
            out.insert(
                "record_len".to_string(),
                JsonValue::from(record.encoded_len()),
            );
        }
        SettingAction::AlreadyDefault => {}
    }
    JsonValue::Object(out)
}
