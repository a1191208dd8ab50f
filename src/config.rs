use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "dashboard.toml";
pub const MAX_TREND_WINDOW_DAYS: u32 = 3660;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub data_path: PathBuf,
    pub trend_window_days: u32,
    pub report_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("uploads").join("latest_uploaded.xlsx"),
            trend_window_days: 7,
            report_path: PathBuf::from("report.md"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    data_path: Option<PathBuf>,
    trend_window_days: Option<u32>,
    report_path: Option<PathBuf>,
}

pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match config_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            apply_file(&mut settings, &raw)
                .with_context(|| format!("invalid config file {}", path.display()))?;
        }
        None => {
            if let Ok(raw) = fs::read_to_string(DEFAULT_CONFIG_FILE) {
                apply_file(&mut settings, &raw)
                    .with_context(|| format!("invalid config file {DEFAULT_CONFIG_FILE}"))?;
            }
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    validate(&settings)?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;

    if let Some(v) = file_cfg.data_path {
        settings.data_path = v;
    }
    if let Some(v) = file_cfg.trend_window_days {
        settings.trend_window_days = v;
    }
    if let Some(v) = file_cfg.report_path {
        settings.report_path = v;
    }
    Ok(())
}

fn apply_env<F>(settings: &mut Settings, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("ETA_DATA_PATH") {
        settings.data_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("ETA_TREND_WINDOW_DAYS") {
        settings.trend_window_days = v
            .trim()
            .parse()
            .with_context(|| format!("ETA_TREND_WINDOW_DAYS must be a positive integer, got '{v}'"))?;
    }
    if let Some(v) = lookup("ETA_REPORT_PATH") {
        settings.report_path = PathBuf::from(v);
    }
    Ok(())
}

fn validate(settings: &Settings) -> anyhow::Result<()> {
    if settings.trend_window_days == 0 {
        bail!("trend_window_days must be at least 1");
    }
    if settings.trend_window_days > MAX_TREND_WINDOW_DAYS {
        bail!("trend_window_days must be at most {MAX_TREND_WINDOW_DAYS}");
    }
    Ok(())
}
