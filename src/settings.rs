use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::metrics::MonitorMode;

/// User-facing configuration, persisted as pretty JSON next to the assets.
///
/// Every field has a default so a partial (or absent) file still yields a
/// working configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub assets_dir: PathBuf,
    /// City name handed verbatim to the weather provider; empty disables
    /// weather checks.
    pub weather_city: String,
    pub volume: f32,
    pub mute: bool,
    pub cpu_monitor_enabled: bool,
    pub cpu_monitor_mode: MonitorMode,
    pub time_morning: String,
    pub time_noon: String,
    pub time_sunset: String,
    pub time_night: String,
    pub time_bedtime: String,
    pub time_wake: String,
    pub idle_min_secs: u64,
    pub idle_max_secs: u64,
    pub weather_refresh_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("Assets"),
            weather_city: String::new(),
            volume: 0.8,
            mute: false,
            cpu_monitor_enabled: true,
            cpu_monitor_mode: MonitorMode::Temp,
            time_morning: "08:00".into(),
            time_noon: "12:00".into(),
            time_sunset: "18:00".into(),
            time_night: "22:00".into(),
            time_bedtime: "23:00".into(),
            time_wake: "07:00".into(),
            idle_min_secs: 900,
            idle_max_secs: 1800,
            weather_refresh_secs: 3600,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> Settings {
        self.data.read().unwrap().clone()
    }

    pub fn update(&self, apply: impl FnOnce(&mut Settings)) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        apply(&mut guard);
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: Settings = serde_json::from_str(&contents)?;
        let mut guard = self.data.write().unwrap();
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"weather_city": "上海", "volume": 0.5}"#).unwrap();
        assert_eq!(settings.weather_city, "上海");
        assert_eq!(settings.volume, 0.5);
        assert_eq!(settings.time_bedtime, "23:00");
        assert_eq!(settings.idle_min_secs, 900);
        assert_eq!(settings.cpu_monitor_mode, MonitorMode::Temp);
    }

    #[test]
    fn monitor_mode_uses_lowercase_names() {
        let settings: Settings =
            serde_json::from_str(r#"{"cpu_monitor_mode": "usage"}"#).unwrap();
        assert_eq!(settings.cpu_monitor_mode, MonitorMode::Usage);
    }

    #[test]
    fn store_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update(|settings| settings.weather_city = "杭州".into())
            .unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.get().weather_city, "杭州");
    }
}
