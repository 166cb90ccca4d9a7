use crate::collector::GeoPoint;
use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".ShineUp";
const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_TICK_SECONDS: u64 = 5;
pub const DEFAULT_BADGE_POLL_SECONDS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub daily_task_count: usize,
    pub comeback_task_count: usize,
    pub tick_seconds: u64,
    pub badge_poll_seconds: u64,
    pub fitness_enabled: bool,
    pub fitness_access_token: Option<String>,
    pub fitness_api_base_url: String,
    pub fitness_timeout_seconds: u64,
    pub location: Option<GeoPoint>,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            db_path: root.join("db").join("progress.db"),
            daily_task_count: 5,
            comeback_task_count: 3,
            tick_seconds: DEFAULT_TICK_SECONDS,
            badge_poll_seconds: DEFAULT_BADGE_POLL_SECONDS,
            fitness_enabled: true,
            fitness_access_token: None,
            fitness_api_base_url: "https://www.googleapis.com/fitness/v1".to_string(),
            fitness_timeout_seconds: 15,
            location: None,
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(&config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        Ok(())
    }

    /// Token from `SHINEUP_FITNESS_TOKEN` wins over the one stored in config.
    pub fn resolve_fitness_token(&self) -> Option<String> {
        std::env::var("SHINEUP_FITNESS_TOKEN")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| {
                self.fitness_access_token
                    .clone()
                    .filter(|value| !value.trim().is_empty())
            })
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "db_path" => {
                self.db_path = expand_home(value);
            }
            "daily_task_count" => {
                self.daily_task_count = parse_task_count(value, "daily_task_count")?;
            }
            "comeback_task_count" => {
                self.comeback_task_count = parse_task_count(value, "comeback_task_count")?;
            }
            "tick_seconds" => {
                self.tick_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("tick_seconds must be a number"))?
                    .max(1);
            }
            "badge_poll_seconds" => {
                self.badge_poll_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("badge_poll_seconds must be a number"))?
                    .max(5);
            }
            "fitness_enabled" => {
                self.fitness_enabled = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("fitness_enabled must be true/false"))?;
            }
            "fitness_access_token" => {
                self.fitness_access_token =
                    (!value.trim().is_empty()).then_some(value.trim().to_string());
            }
            "fitness_api_base_url" => {
                self.fitness_api_base_url = value.trim().trim_end_matches('/').to_string();
            }
            "fitness_timeout_seconds" => {
                self.fitness_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("fitness_timeout_seconds must be a number"))?
                    .max(3);
            }
            "location" => {
                self.location = if value.trim().is_empty() {
                    None
                } else {
                    Some(parse_location(value)?)
                };
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: db_path|db.path, daily_task_count|tasks.daily_count, comeback_task_count|tasks.comeback_count, tick_seconds|verify.tick_seconds, badge_poll_seconds|badges.poll_seconds, fitness_enabled|fitness.enabled, fitness_access_token|fitness.access_token, fitness_api_base_url|fitness.base_url, fitness_timeout_seconds|fitness.timeout_seconds, location|verify.location"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "db_path" => Some(self.db_path.display().to_string()),
            "daily_task_count" => Some(self.daily_task_count.to_string()),
            "comeback_task_count" => Some(self.comeback_task_count.to_string()),
            "tick_seconds" => Some(self.tick_seconds.to_string()),
            "badge_poll_seconds" => Some(self.badge_poll_seconds.to_string()),
            "fitness_enabled" => Some(self.fitness_enabled.to_string()),
            "fitness_access_token" => Some(
                self.fitness_access_token
                    .as_ref()
                    .map(|_| "***set***".to_string())
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "fitness_api_base_url" => Some(self.fitness_api_base_url.clone()),
            "fitness_timeout_seconds" => Some(self.fitness_timeout_seconds.to_string()),
            "location" => Some(
                self.location
                    .map(|point| format!("{},{}", point.lat, point.lng))
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "db_path" | "db.path" => "db_path",
        "daily_task_count" | "tasks.daily_count" => "daily_task_count",
        "comeback_task_count" | "tasks.comeback_count" => "comeback_task_count",
        "tick_seconds" | "verify.tick_seconds" => "tick_seconds",
        "badge_poll_seconds" | "badges.poll_seconds" => "badge_poll_seconds",
        "fitness_enabled" | "fitness.enabled" => "fitness_enabled",
        "fitness_access_token" | "fitness.access_token" => "fitness_access_token",
        "fitness_api_base_url" | "fitness.base_url" => "fitness_api_base_url",
        "fitness_timeout_seconds" | "fitness.timeout_seconds" => "fitness_timeout_seconds",
        "location" | "verify.location" => "location",
        _ => key,
    }
}

fn parse_task_count(value: &str, key: &str) -> Result<usize> {
    let parsed = value
        .parse::<usize>()
        .map_err(|_| anyhow!("{key} must be a number"))?;
    if !(1..=10).contains(&parsed) {
        bail!("{key} must be between 1 and 10");
    }
    Ok(parsed)
}

pub fn parse_location(value: &str) -> Result<GeoPoint> {
    let (lat, lng) = value
        .split_once(',')
        .with_context(|| format!("Invalid location: {value}. Example: 37.5665,126.9780"))?;

    let lat = lat
        .trim()
        .parse::<f64>()
        .with_context(|| format!("Invalid latitude: {lat}"))?;
    let lng = lng
        .trim()
        .parse::<f64>()
        .with_context(|| format!("Invalid longitude: {lng}"))?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        bail!("Location out of range: {value}");
    }

    Ok(GeoPoint { lat, lng })
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
