use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use tracing::info;

pub const APP_DIR: &str = "weekly-habits";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub today: Option<NaiveDate>,
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source; blank values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(dir) = var("HABIT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        } else if let Some(dir) = default_data_dir(var("XDG_DATA_HOME"), var("HOME")) {
            config.data_dir = dir;
        }
        if let Some(today) = var("HABIT_TODAY") {
            config.today = Some(parse_date(&today).context("HABIT_TODAY")?);
        }
        if let Some(filter) = var("HABIT_LOG") {
            config.log_filter = filter;
        }
        Ok(config)
    }

    pub fn set_data_dir(&mut self, dir: impl AsRef<Path>) {
        let dir = dir.as_ref().to_path_buf();
        if dir != self.data_dir {
            info!(path = %dir.display(), "using data directory");
            self.data_dir = dir;
        }
    }

    /// Logical current date: the override if present, else the local date.
    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(APP_DIR),
            today: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

fn default_data_dir(xdg_data_home: Option<String>, home: Option<String>) -> Option<PathBuf> {
    match (xdg_data_home, home) {
        (Some(base), _) => Some(Path::new(&base).join(APP_DIR)),
        (None, Some(home)) => Some(Path::new(&home).join(".local").join("share").join(APP_DIR)),
        (None, None) => None,
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("`{value}` is not a YYYY-MM-DD date"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn explicit_data_dir_wins() {
        let config = config_from(&[
            ("HABIT_DATA_DIR", "/srv/habits"),
            ("XDG_DATA_HOME", "/home/a/.data"),
        ])
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/habits"));
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.today, None);
    }

    #[test]
    fn falls_back_to_xdg_then_home() {
        let config = config_from(&[("XDG_DATA_HOME", "/data"), ("HOME", "/home/a")]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/data/weekly-habits"));

        let config = config_from(&[("XDG_DATA_HOME", "  "), ("HOME", "/home/a")]).unwrap();
        assert_eq!(
            config.data_dir,
            PathBuf::from("/home/a/.local/share/weekly-habits")
        );
    }

    #[test]
    fn today_override_is_parsed() {
        let config = config_from(&[("HABIT_TODAY", "2025-10-22"), ("HABIT_LOG", "debug")]).unwrap();
        assert_eq!(config.today(), NaiveDate::from_ymd_opt(2025, 10, 22).unwrap());
        assert_eq!(config.log_filter, "debug");

        assert!(config_from(&[("HABIT_TODAY", "22/10/2025")]).is_err());
    }
}
