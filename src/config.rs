use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::MAX_ROUTINE_MINUTES;

pub const DISTANCE_MATRIX_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    pub maps_api_key: Option<String>,

    #[serde(default = "default_maps_api_url")]
    pub maps_api_url: String,

    #[serde(default = "default_estimator_timeout")]
    pub estimator_timeout_secs: u64,

    /// Offset of the zone schedules are written in. The sweeper derives
    /// "today" and the current minute from it.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Duration assumed for items without a recorded end time.
    #[serde(default = "default_fallback_minutes")]
    pub fallback_duration_minutes: i64,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dayplan");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("dayplan.db").to_string_lossy().to_string()
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_maps_api_url() -> String {
    DISTANCE_MATRIX_URL.to_string()
}

fn default_estimator_timeout() -> u64 {
    10
}

fn default_utc_offset() -> i32 {
    7
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_batch_size() -> usize {
    100
}

fn default_fallback_minutes() -> i64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            listen_addr: default_listen_addr(),
            maps_api_key: None,
            maps_api_url: default_maps_api_url(),
            estimator_timeout_secs: default_estimator_timeout(),
            utc_offset_hours: default_utc_offset(),
            sweep_interval_secs: default_sweep_interval(),
            batch_size: default_batch_size(),
            fallback_duration_minutes: default_fallback_minutes(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from an explicit path, writing the defaults there on first run.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            config
        };

        if config.maps_api_key.is_none() {
            config.maps_api_key = std::env::var("MAPS_API_KEY").ok();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dayplan")
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(AppError::Config("batch_size must be at least 1".to_string()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(AppError::Config(
                "sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(AppError::Config(format!(
                "utc_offset_hours out of range: {}",
                self.utc_offset_hours
            )));
        }
        if !(0..=MAX_ROUTINE_MINUTES).contains(&self.fallback_duration_minutes) {
            return Err(AppError::Config(format!(
                "fallback_duration_minutes must be between 0 and {MAX_ROUTINE_MINUTES}"
            )));
        }
        Ok(())
    }

    pub fn fallback_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.fallback_duration_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.sweep_interval_secs, 60);
        assert_eq!(config.fallback_duration(), chrono::Duration::minutes(5));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "listen_addr = \"0.0.0.0:8080\"\nbatch_size = 25\n").unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.utc_offset_hours, 7);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "batch_size = 0\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));
    }

    #[test]
    fn fallback_longer_than_a_day_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "fallback_duration_minutes = 100000000000000\n").unwrap();

        assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));
    }
}
