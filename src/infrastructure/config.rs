use crate::domain::models::{MAX_BLOCK_MINUTES, MIN_BLOCK_MINUTES};
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const SUPPORTED_SCHEMA: u64 = 1;
const MIN_TICK_INTERVAL_MS: u64 = 10;
const MAX_TICK_INTERVAL_MS: u64 = 1_000;
const MAX_ADVANCE_DELAY_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSettings {
    pub tick_interval_ms: u64,
    pub advance_delay_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
            advance_delay_ms: 1_500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionSettings {
    pub default_block_minutes: u32,
}

impl Default for CompositionSettings {
    fn default() -> Self {
        Self {
            default_block_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub schema: u64,
    pub app_name: String,
    #[serde(default)]
    pub playback: PlaybackSettings,
    #[serde(default)]
    pub composition: CompositionSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            schema: SUPPORTED_SCHEMA,
            app_name: "StudyCycle".to_string(),
            playback: PlaybackSettings::default(),
            composition: CompositionSettings::default(),
        }
    }
}

impl AppSettings {
    pub fn validate(&self) -> Result<(), InfraError> {
        if !(MIN_TICK_INTERVAL_MS..=MAX_TICK_INTERVAL_MS).contains(&self.playback.tick_interval_ms) {
            return Err(InfraError::InvalidConfig(format!(
                "playback.tickIntervalMs must be between {MIN_TICK_INTERVAL_MS} and {MAX_TICK_INTERVAL_MS}"
            )));
        }
        if self.playback.advance_delay_ms > MAX_ADVANCE_DELAY_MS {
            return Err(InfraError::InvalidConfig(format!(
                "playback.advanceDelayMs must be <= {MAX_ADVANCE_DELAY_MS}"
            )));
        }
        let default_minutes = self.composition.default_block_minutes;
        if !(MIN_BLOCK_MINUTES..=MAX_BLOCK_MINUTES).contains(&default_minutes) {
            return Err(InfraError::InvalidConfig(format!(
                "composition.defaultBlockMinutes must be between {MIN_BLOCK_MINUTES} and {MAX_BLOCK_MINUTES}"
            )));
        }
        Ok(())
    }
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&AppSettings::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_settings(config_dir: &Path) -> Result<AppSettings, InfraError> {
    let value = read_config(&config_dir.join(APP_JSON))?;
    let settings: AppSettings = serde_json::from_value(value)?;
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(config_dir: &Path, settings: &AppSettings) -> Result<(), InfraError> {
    settings.validate()?;
    let formatted = serde_json::to_string_pretty(settings)?;
    fs::write(config_dir.join(APP_JSON), format!("{formatted}\n"))?;
    Ok(())
}
